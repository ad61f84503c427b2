// kernel/fs/src/node.rs
// VFS Nodes and Handles
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use crate::iso9660::RecordFlags;
use crate::name::Name;

/// Index into the mount table.
pub type MountId = u8;

bitflags::bitflags! {
    /// Node type bits as reported to callers.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        const FILE       = 0x01;
        const DIRECTORY  = 0x02;
        const MOUNTPOINT = 0x08;
    }
}

/// What a node is. Directory-only operations reject files and the other
/// way round.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// Contiguous on-media region backing a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Extent {
    pub lba: u32,
    pub size: u32,
    pub flags: RecordFlags,
}

impl Extent {
    pub const fn new(lba: u32, size: u32, flags: RecordFlags) -> Self {
        Self { lba, size, flags }
    }

    pub fn is_dir(&self) -> bool {
        self.flags.contains(RecordFlags::DIRECTORY)
    }
}

/// A resolved file or directory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub name: Name,
    pub kind: NodeKind,
    /// Starting sector, doubling as the inode number.
    pub inode: u32,
    pub length: u32,
    /// Volume the node lives on.
    pub mount: MountId,
    /// Set when another volume is mounted on this directory.
    pub redirect: Option<MountId>,
    pub extent: Extent,
}

impl Node {
    pub fn new(name: Name, extent: Extent, mount: MountId) -> Self {
        let kind = if extent.is_dir() {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        Self {
            name,
            kind,
            inode: extent.lba,
            length: extent.size,
            mount,
            redirect: None,
            extent,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn flags(&self) -> NodeFlags {
        let mut flags = match self.kind {
            NodeKind::File => NodeFlags::FILE,
            NodeKind::Directory => NodeFlags::DIRECTORY,
        };
        if self.redirect.is_some() {
            flags |= NodeFlags::MOUNTPOINT;
        }
        flags
    }
}

/// Reference to a node held by the VFS.
///
/// Mount roots never expire. Lookup results live in the node ring and go
/// stale once their slot has been handed out again.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeHandle {
    Root(MountId),
    Slot { index: u8, generation: u32 },
}

/// One `readdir` result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: Name,
    pub inode: u32,
}

/// A directory record matched by name, before it becomes a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Found {
    pub name: Name,
    pub extent: Extent,
}
