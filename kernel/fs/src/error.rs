// kernel/fs/src/error.rs
// Filesystem / VFS Error Taxonomy
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use core::fmt;

use disk::DiskError;

/// Errors reported by the ISO9660 driver, the VFS and the open-file table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    NotDirectory,
    IsDirectory,
    NoSpace,
    InvalidArgument,
    /// A sector read failed; the device error is kept as-is.
    IoError(DiskError),
    OutOfMemory,
    NoEntry,
    Exists,
    NotMounted,
    /// The handle refers to a node slot that has since been reused.
    StaleHandle,
}

pub type Result<T> = core::result::Result<T, FsError>;

impl FsError {
    /// Integer code handed across the syscall boundary.
    pub const fn code(self) -> i32 {
        match self {
            FsError::NotFound => -1,
            FsError::NotDirectory => -2,
            FsError::IsDirectory => -3,
            FsError::NoSpace => -4,
            FsError::InvalidArgument => -5,
            FsError::IoError(_) => -6,
            FsError::OutOfMemory => -7,
            FsError::NoEntry => -8,
            FsError::Exists => -9,
            FsError::NotMounted => -10,
            FsError::StaleHandle => -11,
        }
    }

    /// Inverse of [`FsError::code`]. The device cause of an I/O error does
    /// not survive the integer round trip and comes back as `ReadError`.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(FsError::NotFound),
            -2 => Some(FsError::NotDirectory),
            -3 => Some(FsError::IsDirectory),
            -4 => Some(FsError::NoSpace),
            -5 => Some(FsError::InvalidArgument),
            -6 => Some(FsError::IoError(DiskError::ReadError)),
            -7 => Some(FsError::OutOfMemory),
            -8 => Some(FsError::NoEntry),
            -9 => Some(FsError::Exists),
            -10 => Some(FsError::NotMounted),
            -11 => Some(FsError::StaleHandle),
            _ => None,
        }
    }
}

impl From<DiskError> for FsError {
    fn from(e: DiskError) -> Self {
        FsError::IoError(e)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotFound => f.write_str("not found"),
            FsError::NotDirectory => f.write_str("not a directory"),
            FsError::IsDirectory => f.write_str("is a directory"),
            FsError::NoSpace => f.write_str("no space"),
            FsError::InvalidArgument => f.write_str("invalid argument"),
            FsError::IoError(e) => write!(f, "i/o error ({})", e),
            FsError::OutOfMemory => f.write_str("out of memory"),
            FsError::NoEntry => f.write_str("no such entry"),
            FsError::Exists => f.write_str("already exists"),
            FsError::NotMounted => f.write_str("not mounted"),
            FsError::StaleHandle => f.write_str("stale node handle"),
        }
    }
}
