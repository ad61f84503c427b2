// kernel/fs/src/lib.rs
// Kernel Filesystem Layer: ISO9660 driver, VFS and file syscalls
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

#![cfg_attr(not(test), no_std)]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

pub mod arena;
pub mod config;
pub mod error;
pub mod iso9660;
pub mod kfile;
pub mod name;
pub mod node;
pub mod storage;
pub mod syscall;
pub mod vfs;
pub mod volume;

#[cfg(any(test, feature = "sim"))]
pub mod testing;

pub use config::*;
pub use error::{FsError, Result};
pub use iso9660::IsoVolume;
pub use kfile::{read_dir_entry, read_file, KfOpenFlags, OpenFileTable};
pub use name::Name;
pub use node::{DirEntry, Extent, MountId, Node, NodeFlags, NodeHandle, NodeKind};
pub use storage::Storage;
pub use syscall::{FsCall, SYSCALL_ERROR};
pub use vfs::{Mount, MountTable, Vfs};
pub use volume::{FileSystem, FsDriver, Volume};
