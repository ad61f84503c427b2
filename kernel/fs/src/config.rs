// kernel/fs/src/config.rs
// Filesystem Tunables
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

/// Slots in the lookup node ring. A handle survives this many later lookups.
pub const NODE_RING_CAPACITY: usize = 64;

/// Registered filesystem drivers.
pub const MAX_FILESYSTEMS: usize = 8;

/// Concurrently mounted volumes.
pub const MAX_MOUNTS: usize = 4;

/// Name buffer size including the terminating NUL, so 255 usable bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Open-file table size for the syscall layer.
pub const MAX_OPEN_FILES: usize = 16;

/// Descriptors 0..=2 are reserved for the console.
pub const FIRST_FD: i32 = shared::FIRST_FILE_FD;

/// Logical sector size of optical media.
pub const ISO_SECTOR_SIZE: usize = 2048;

/// Sector holding the Primary Volume Descriptor.
pub const ISO_PVD_SECTOR: u32 = 16;

/// Descriptor sectors examined while looking for a Joliet SVD.
pub const JOLIET_SCAN_LIMIT: u32 = 32;

/// How path resolution treats a `..` component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum DotDotPolicy {
    /// `..` stays in the current directory. Shell callers build parent
    /// paths themselves.
    #[default]
    Ignore,
    /// `..` is looked up through the directory's own parent record.
    Lookup,
}

/// Runtime options for the VFS.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct VfsOptions {
    pub dotdot: DotDotPolicy,
}

impl VfsOptions {
    pub const fn new() -> Self {
        Self {
            dotdot: DotDotPolicy::Ignore,
        }
    }

    pub const fn with_dotdot(mut self, dotdot: DotDotPolicy) -> Self {
        self.dotdot = dotdot;
        self
    }
}
