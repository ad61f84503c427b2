// kernel/fs/src/iso9660/mod.rs
// Read-only ISO9660 driver with Rock Ridge and Joliet names
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

pub mod descriptor;
pub mod dir;
pub mod names;
pub mod record;
pub mod susp;

pub use descriptor::{DescriptorType, PrimaryDescriptor};
pub use record::{DirRecord, RecordFlags};
pub use susp::RockRidge;

use disk::SectorSource;
use kernel_log::{klog_debug, klog_info, klog_warn};

use crate::config::{ISO_PVD_SECTOR, ISO_SECTOR_SIZE, JOLIET_SCAN_LIMIT};
use crate::error::{FsError, Result};
use crate::name::Name;
use crate::node::{DirEntry, Extent, Found};
use crate::volume::{FileSystem, FsDriver, Volume};
use dir::{walk, Naming, Walk};

/// Name the driver registers under.
pub const FS_NAME: &str = "iso9660";

/// Mount state of one ISO9660 volume plus the sector buffers its
/// operations share.
pub struct IsoVolume {
    drive: u8,
    label: Name,
    block_size: u16,
    volume_space: u32,
    primary_root: Extent,
    joliet_root: Option<Extent>,
    rock_ridge: Option<RockRidge>,
    sector: [u8; ISO_SECTOR_SIZE],
    cont: [u8; ISO_SECTOR_SIZE],
}

impl IsoVolume {
    /// Read the volume descriptors on `drive` and probe for extensions.
    pub fn mount(dev: &mut dyn SectorSource, drive: u8) -> Result<Self> {
        if !dev.is_optical(drive) {
            return Err(FsError::InvalidArgument);
        }

        let mut sector = [0u8; ISO_SECTOR_SIZE];
        dev.read_blocks(drive, ISO_PVD_SECTOR, 1, &mut sector)?;
        let pvd = descriptor::parse_primary(&sector).map_err(|e| {
            klog_warn!("iso9660", "drive {}: no primary volume descriptor", drive);
            e
        })?;
        if pvd.block_size as usize != ISO_SECTOR_SIZE {
            klog_warn!("iso9660", "drive {}: unusual block size {}", drive, pvd.block_size);
        }

        let mut volume = IsoVolume {
            drive,
            label: pvd.label,
            block_size: pvd.block_size,
            volume_space: pvd.volume_space,
            primary_root: pvd.root,
            joliet_root: None,
            rock_ridge: None,
            sector,
            cont: [0; ISO_SECTOR_SIZE],
        };
        volume.joliet_root = volume.find_joliet(dev);

        // Rock Ridge lives in the tree names are resolved from
        let root = volume.root();
        if dev.read_blocks(drive, root.lba, 1, &mut volume.sector).is_ok() {
            volume.rock_ridge = susp::detect(&volume.sector);
        }

        klog_info!(
            "iso9660",
            "drive {}: mounted '{}' ({} sectors, rock ridge: {}, joliet: {})",
            drive,
            volume.label,
            volume.volume_space,
            volume.has_rock_ridge(),
            volume.has_joliet()
        );
        Ok(volume)
    }

    /// Scan the descriptor set for a Joliet SVD, up to the terminator.
    fn find_joliet(&mut self, dev: &mut dyn SectorSource) -> Option<Extent> {
        for lba in ISO_PVD_SECTOR..ISO_PVD_SECTOR + JOLIET_SCAN_LIMIT {
            if dev.read_blocks(self.drive, lba, 1, &mut self.sector).is_err() {
                return None;
            }
            if descriptor::descriptor_type(&self.sector) == Some(DescriptorType::Terminator) {
                return None;
            }
            if let Some(root) = descriptor::joliet_root(&self.sector) {
                klog_debug!("iso9660", "drive {}: joliet descriptor at sector {}", self.drive, lba);
                return Some(root);
            }
        }
        None
    }

    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    pub fn block_size(&self) -> u16 {
        self.block_size
    }

    pub fn volume_space(&self) -> u32 {
        self.volume_space
    }

    pub fn has_rock_ridge(&self) -> bool {
        self.rock_ridge.is_some()
    }

    pub fn rock_ridge_skip(&self) -> Option<u8> {
        self.rock_ridge.map(|rr| rr.skip)
    }

    pub fn has_joliet(&self) -> bool {
        self.joliet_root.is_some()
    }

    /// Root from the primary descriptor, regardless of Joliet.
    pub fn primary_root(&self) -> Extent {
        self.primary_root
    }

    fn naming(&self) -> Naming {
        Naming {
            rock_ridge: self.rock_ridge,
            joliet: self.has_joliet(),
        }
    }
}

impl FileSystem for IsoVolume {
    fn drive(&self) -> u8 {
        self.drive
    }

    /// Joliet root when present, else the primary root.
    fn root(&self) -> Extent {
        self.joliet_root.unwrap_or(self.primary_root)
    }

    fn read(&mut self, dev: &mut dyn SectorSource, file: &Extent, offset: u32, buf: &mut [u8]) -> Result<usize> {
        if offset >= file.size {
            return Ok(0);
        }
        let len = buf.len().min((file.size - offset) as usize);

        let first = file.lba.checked_add(offset / ISO_SECTOR_SIZE as u32);
        let mut in_sector = offset as usize % ISO_SECTOR_SIZE;
        let mut done = 0;
        let mut index = 0u32;

        while done < len {
            // Extents come off the disc; one running past the last LBA is bogus
            let lba = first
                .and_then(|lba| lba.checked_add(index))
                .ok_or(FsError::InvalidArgument)?;
            if let Err(e) = dev.read_blocks(self.drive, lba, 1, &mut self.sector) {
                klog_warn!("iso9660", "drive {}: read of sector {} failed: {}", self.drive, lba, e);
                return Err(e.into());
            }
            let n = (ISO_SECTOR_SIZE - in_sector).min(len - done);
            buf[done..done + n].copy_from_slice(&self.sector[in_sector..in_sector + n]);
            done += n;
            index += 1;
            in_sector = 0;
        }
        Ok(done)
    }

    fn readdir(&mut self, dev: &mut dyn SectorSource, dir: &Extent, index: u32) -> Result<Option<DirEntry>> {
        let naming = self.naming();
        let drive = self.drive;
        let IsoVolume { sector, cont, .. } = self;

        let mut seen = 0u32;
        let mut result = None;
        walk(dev, drive, dir, sector, |dev, record| {
            if record.is_dot() || record.is_dotdot() {
                return Walk::Next;
            }
            if seen != index {
                seen += 1;
                return Walk::Next;
            }
            let mut name = Name::new();
            naming.resolve(record, dev, drive, cont, &mut name);
            result = Some(DirEntry {
                name,
                inode: record.extent_lba(),
            });
            Walk::Stop
        })?;
        Ok(result)
    }

    fn finddir(&mut self, dev: &mut dyn SectorSource, dir: &Extent, name: &[u8]) -> Result<Option<Found>> {
        let naming = self.naming();
        let drive = self.drive;
        let IsoVolume { sector, cont, .. } = self;

        let mut result = None;
        let mut candidate = Name::new();
        walk(dev, drive, dir, sector, |dev, record| {
            naming.resolve(record, dev, drive, cont, &mut candidate);
            if !candidate.eq_ignore_case(name) {
                return Walk::Next;
            }
            result = Some(Found {
                name: candidate,
                extent: record.extent(),
            });
            Walk::Stop
        })?;
        Ok(result)
    }

    fn unmount(&mut self) -> Result<()> {
        klog_debug!("iso9660", "drive {}: unmount", self.drive);
        Ok(())
    }
}

fn mount_volume(dev: &mut dyn SectorSource, drive: u8) -> Result<Volume> {
    IsoVolume::mount(dev, drive).map(Volume::Iso9660)
}

fn unmount_volume(volume: &mut Volume) -> Result<()> {
    volume.fs_mut().unmount()
}

/// Registration record for the VFS.
pub fn driver() -> FsDriver {
    FsDriver {
        name: FS_NAME,
        mount: mount_volume,
        unmount: unmount_volume,
    }
}
