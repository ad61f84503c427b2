// kernel/fs/src/name.rs
// Bounded File Names
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use core::fmt;

use crate::config::MAX_NAME_LEN;

/// Longest name that still leaves room for a NUL terminator.
pub const NAME_CAPACITY: usize = MAX_NAME_LEN - 1;

/// Fixed-capacity file name. Pushes past the capacity are dropped.
#[derive(Copy, Clone)]
pub struct Name {
    bytes: [u8; MAX_NAME_LEN],
    len: u16,
}

impl Name {
    pub const fn new() -> Self {
        Self {
            bytes: [0; MAX_NAME_LEN],
            len: 0,
        }
    }

    pub fn from_bytes(src: &[u8]) -> Self {
        let mut name = Self::new();
        name.extend(src);
        name
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one byte; returns false once the name is full.
    pub fn push(&mut self, b: u8) -> bool {
        if self.len() >= NAME_CAPACITY {
            return false;
        }
        self.bytes[self.len()] = b;
        self.len += 1;
        true
    }

    /// Append as much of `src` as fits.
    pub fn extend(&mut self, src: &[u8]) {
        for &b in src {
            if !self.push(b) {
                break;
            }
        }
    }

    /// Whether `extra` more bytes fit without truncation.
    pub fn fits(&self, extra: usize) -> bool {
        self.len() + extra <= NAME_CAPACITY
    }

    /// Drop the last byte, if any.
    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.bytes[self.len()])
    }

    pub fn make_ascii_lowercase(&mut self) {
        let len = self.len();
        self.bytes[..len].make_ascii_lowercase();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// Names are built from ASCII; anything else renders as `?`.
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("?")
    }

    pub fn eq_ignore_case(&self, other: &[u8]) -> bool {
        self.as_bytes().eq_ignore_ascii_case(other)
    }

    /// Copy into a C-style buffer: at most `out.len() - 1` bytes plus NUL.
    /// Returns the number of name bytes written.
    pub fn copy_to_c(&self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let n = self.len().min(out.len() - 1);
        out[..n].copy_from_slice(&self.bytes[..n]);
        out[n] = 0;
        n
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Name {}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
