// kernel/fs/src/iso9660/dir.rs
// Directory extent walking and per-record name resolution
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use disk::SectorSource;

use super::names::{joliet_name, plain_name};
use super::record::DirRecord;
use super::susp::{alternate_name, RockRidge};
use crate::config::ISO_SECTOR_SIZE;
use crate::error::Result;
use crate::name::Name;
use crate::node::Extent;

/// Visitor verdict.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Walk {
    Next,
    Stop,
}

/// Feed every record of the directory at `dir` to `visit`, one sector at
/// a time through `sector`.
///
/// A zero-length (or malformed) record means the rest of the sector is
/// padding. Nothing is cached between calls, so every walk starts from
/// the directory's first sector.
pub fn walk<F>(
    dev: &mut dyn SectorSource,
    drive: u8,
    dir: &Extent,
    sector: &mut [u8; ISO_SECTOR_SIZE],
    mut visit: F,
) -> Result<()>
where
    F: FnMut(&mut dyn SectorSource, &DirRecord<'_>) -> Walk,
{
    let mut lba = dir.lba;
    let mut remaining = dir.size as usize;
    let mut offset = ISO_SECTOR_SIZE;

    while remaining > 0 {
        if offset >= ISO_SECTOR_SIZE {
            dev.read_blocks(drive, lba, 1, &mut sector[..])?;
            lba = lba.wrapping_add(1);
            offset = 0;
        }

        let Some(record) = DirRecord::parse(&sector[offset..]) else {
            let skip = ISO_SECTOR_SIZE - offset;
            if skip > remaining {
                break;
            }
            remaining -= skip;
            offset = ISO_SECTOR_SIZE;
            continue;
        };

        if visit(&mut *dev, &record) == Walk::Stop {
            return Ok(());
        }
        offset += record.length();
        remaining = remaining.saturating_sub(record.length());
    }
    Ok(())
}

/// Which naming schemes a volume carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Naming {
    pub rock_ridge: Option<RockRidge>,
    pub joliet: bool,
}

impl Naming {
    /// Display name of `record`: Rock Ridge NM first, then Joliet UCS-2,
    /// then the plain ISO name. `.` and `..` map to themselves.
    pub fn resolve(
        &self,
        record: &DirRecord<'_>,
        dev: &mut dyn SectorSource,
        drive: u8,
        cont: &mut [u8; ISO_SECTOR_SIZE],
        out: &mut Name,
    ) {
        if record.is_dot() {
            *out = Name::from_bytes(b".");
            return;
        }
        if record.is_dotdot() {
            *out = Name::from_bytes(b"..");
            return;
        }
        if let Some(rr) = self.rock_ridge {
            if alternate_name(record, rr, dev, drive, cont, out) {
                return;
            }
        }
        if self.joliet {
            joliet_name(record.name(), out);
        } else {
            plain_name(record.name(), out);
        }
    }
}
