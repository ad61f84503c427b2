// kernel/fs/src/kfile.rs
// Open-file table and path helpers for the syscall layer and the loader
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use disk::SectorSource;
use kernel_log::{klog_debug, klog_warn};

use crate::config::{FIRST_FD, MAX_OPEN_FILES};
use crate::error::{FsError, Result};
use crate::node::Node;
use crate::vfs::Vfs;

bitflags::bitflags! {
    /// Open flags. Volumes are read-only, so only READ is accepted.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct KfOpenFlags: u32 {
        const READ   = 0x1;
        const WRITE  = 0x2;
        const APPEND = 0x4;
        const CREATE = 0x8;
    }
}

/// An open file: a private copy of the node plus the read cursor.
#[derive(Copy, Clone, Debug)]
struct OpenFile {
    node: Node,
    cursor: u32,
}

/// Fixed descriptor table. Descriptors start at [`FIRST_FD`].
pub struct OpenFileTable {
    slots: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl OpenFileTable {
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_OPEN_FILES],
        }
    }

    fn slot(&mut self, fd: i32) -> Result<&mut OpenFile> {
        let index = fd.checked_sub(FIRST_FD).ok_or(FsError::InvalidArgument)?;
        usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::as_mut)
            .ok_or(FsError::InvalidArgument)
    }

    /// Open the regular file at `path` for reading.
    pub fn open(&mut self, vfs: &mut Vfs, dev: &mut dyn SectorSource, path: &str, flags: KfOpenFlags) -> Result<i32> {
        if flags != KfOpenFlags::READ {
            return Err(FsError::InvalidArgument);
        }
        let handle = vfs.namei(dev, path)?;
        let node = vfs.open(handle)?;
        if node.is_dir() {
            return Err(FsError::IsDirectory);
        }

        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.is_none())
            .ok_or_else(|| {
                klog_warn!("kfile", "open file table full, cannot open {}", path);
                FsError::NoSpace
            })?;
        *slot = Some(OpenFile { node, cursor: 0 });

        let fd = FIRST_FD + index as i32;
        klog_debug!("kfile", "fd {} -> {} ({} bytes)", fd, path, node.length);
        Ok(fd)
    }

    /// Read from the cursor; returns bytes read, 0 at end of file.
    pub fn read(&mut self, vfs: &mut Vfs, dev: &mut dyn SectorSource, fd: i32, buf: &mut [u8]) -> Result<usize> {
        let file = self.slot(fd)?;
        let n = vfs.read_node(dev, &file.node, file.cursor, buf)?;
        file.cursor += n as u32;
        Ok(n)
    }

    pub fn size(&mut self, fd: i32) -> Result<u32> {
        Ok(self.slot(fd)?.node.length)
    }

    pub fn close(&mut self, fd: i32) -> Result<()> {
        self.slot(fd)?;
        self.slots[(fd - FIRST_FD) as usize] = None;
        Ok(())
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy the name of the `index`-th entry of directory `path` into `out`
/// as a NUL-terminated string. Returns 1 when an entry was copied and 0
/// past the last one.
pub fn read_dir_entry(vfs: &mut Vfs, dev: &mut dyn SectorSource, path: &str, index: u32, out: &mut [u8]) -> Result<i32> {
    let handle = vfs.namei(dev, path)?;
    if !vfs.resolve(handle)?.is_dir() {
        return Err(FsError::NotDirectory);
    }
    match vfs.readdir(dev, handle, index)? {
        Some(entry) => {
            entry.name.copy_to_c(out);
            Ok(1)
        }
        None => Ok(0),
    }
}

/// Load a whole file into `out`, as the program loader does. Returns the
/// file length.
pub fn read_file(vfs: &mut Vfs, dev: &mut dyn SectorSource, path: &str, out: &mut [u8]) -> Result<usize> {
    let handle = vfs.namei(dev, path)?;
    let node = vfs.resolve(handle)?;
    if node.is_dir() {
        return Err(FsError::IsDirectory);
    }
    let len = node.length as usize;
    if len > out.len() {
        return Err(FsError::NoSpace);
    }
    let n = vfs.read_node(dev, &node, 0, &mut out[..len])?;
    if n != len {
        return Err(FsError::InvalidArgument);
    }
    Ok(n)
}
