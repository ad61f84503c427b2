// kernel/fs/src/volume.rs
// Filesystem driver interface
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use disk::SectorSource;

use crate::error::Result;
use crate::iso9660::IsoVolume;
use crate::node::{DirEntry, Extent, Found};

/// Operations a mounted volume provides to the VFS.
///
/// Nodes are identified by their extent only, so every call recomputes
/// its position from the extent and stays valid however often the node
/// ring recycles.
pub trait FileSystem {
    fn drive(&self) -> u8;

    fn root(&self) -> Extent;

    /// Copy file bytes from `offset` into `buf`. Returns bytes copied, 0 at
    /// or past the end.
    fn read(&mut self, dev: &mut dyn SectorSource, file: &Extent, offset: u32, buf: &mut [u8]) -> Result<usize>;

    /// The `index`-th entry of `dir`, skipping `.` and `..`.
    fn readdir(&mut self, dev: &mut dyn SectorSource, dir: &Extent, index: u32) -> Result<Option<DirEntry>>;

    /// First entry of `dir` whose name matches `name` ignoring ASCII case.
    fn finddir(&mut self, dev: &mut dyn SectorSource, dir: &Extent, name: &[u8]) -> Result<Option<Found>>;

    fn unmount(&mut self) -> Result<()>;
}

/// A mounted volume of one of the supported filesystem types.
pub enum Volume {
    Iso9660(IsoVolume),
}

impl Volume {
    pub fn fs(&self) -> &dyn FileSystem {
        match self {
            Volume::Iso9660(v) => v,
        }
    }

    pub fn fs_mut(&mut self) -> &mut dyn FileSystem {
        match self {
            Volume::Iso9660(v) => v,
        }
    }

    pub fn as_iso9660(&self) -> Option<&IsoVolume> {
        match self {
            Volume::Iso9660(v) => Some(v),
        }
    }
}

/// Mount hook: probe `drive` and build a volume.
pub type MountFn = fn(&mut dyn SectorSource, u8) -> Result<Volume>;

/// Unmount hook.
pub type UnmountFn = fn(&mut Volume) -> Result<()>;

/// A registered filesystem type.
#[derive(Copy, Clone)]
pub struct FsDriver {
    pub name: &'static str,
    pub mount: MountFn,
    pub unmount: UnmountFn,
}

impl core::fmt::Debug for FsDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FsDriver").field("name", &self.name).finish()
    }
}
