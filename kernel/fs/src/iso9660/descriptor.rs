// kernel/fs/src/iso9660/descriptor.rs
// Volume Descriptors
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use super::record::{le_u16, le_u32, DirRecord};
use crate::error::{FsError, Result};
use crate::name::Name;
use crate::node::Extent;

pub const STANDARD_ID: &[u8; 5] = b"CD001";

const OFF_TYPE: usize = 0;
const OFF_ID: usize = 1;
const OFF_VOLUME_ID: usize = 40;
const VOLUME_ID_LEN: usize = 32;
const OFF_VOLUME_SPACE: usize = 80;
const OFF_ESCAPES: usize = 88;
const OFF_BLOCK_SIZE: usize = 128;
const OFF_ROOT_RECORD: usize = 156;
const ROOT_RECORD_LEN: usize = 34;

/// UCS-2 level 1, 2 and 3 escape sequences (`%/@`, `%/C`, `%/E`).
const JOLIET_ESCAPES: [[u8; 3]; 3] = [[0x25, 0x2F, 0x40], [0x25, 0x2F, 0x43], [0x25, 0x2F, 0x45]];

/// Volume descriptor type codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DescriptorType {
    BootRecord,
    Primary,
    Supplementary,
    Partition,
    Terminator,
    Other(u8),
}

impl From<u8> for DescriptorType {
    fn from(code: u8) -> Self {
        match code {
            0 => DescriptorType::BootRecord,
            1 => DescriptorType::Primary,
            2 => DescriptorType::Supplementary,
            3 => DescriptorType::Partition,
            255 => DescriptorType::Terminator,
            other => DescriptorType::Other(other),
        }
    }
}

/// Type of the descriptor in `sector`, or `None` without the CD001 tag.
pub fn descriptor_type(sector: &[u8]) -> Option<DescriptorType> {
    if sector.len() < OFF_ID + STANDARD_ID.len() || &sector[OFF_ID..OFF_ID + 5] != STANDARD_ID {
        return None;
    }
    Some(DescriptorType::from(sector[OFF_TYPE]))
}

/// Fields of the Primary Volume Descriptor the driver keeps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PrimaryDescriptor {
    pub label: Name,
    pub volume_space: u32,
    pub block_size: u16,
    pub root: Extent,
}

fn root_extent(sector: &[u8]) -> Option<Extent> {
    let raw = sector.get(OFF_ROOT_RECORD..OFF_ROOT_RECORD + ROOT_RECORD_LEN)?;
    DirRecord::parse(raw).map(|r| r.extent())
}

pub fn parse_primary(sector: &[u8]) -> Result<PrimaryDescriptor> {
    if descriptor_type(sector) != Some(DescriptorType::Primary) {
        return Err(FsError::InvalidArgument);
    }
    let root = root_extent(sector).ok_or(FsError::InvalidArgument)?;

    let raw_label = &sector[OFF_VOLUME_ID..OFF_VOLUME_ID + VOLUME_ID_LEN];
    let end = raw_label
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);

    Ok(PrimaryDescriptor {
        label: Name::from_bytes(&raw_label[..end]),
        volume_space: le_u32(sector, OFF_VOLUME_SPACE),
        block_size: le_u16(sector, OFF_BLOCK_SIZE),
        root,
    })
}

/// Root extent of a Joliet Supplementary Volume Descriptor, if `sector`
/// is one.
pub fn joliet_root(sector: &[u8]) -> Option<Extent> {
    if descriptor_type(sector)? != DescriptorType::Supplementary {
        return None;
    }
    let escapes = sector.get(OFF_ESCAPES..OFF_ESCAPES + 3)?;
    if !JOLIET_ESCAPES.iter().any(|e| e[..] == *escapes) {
        return None;
    }
    root_extent(sector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso9660::RecordFlags;

    fn descriptor(kind: u8) -> [u8; 2048] {
        let mut s = [0u8; 2048];
        s[0] = kind;
        s[1..6].copy_from_slice(STANDARD_ID);
        s[6] = 1;
        s[40..72].fill(b' ');
        s[40..46].copy_from_slice(b"MYDISC");
        s[80..84].copy_from_slice(&300u32.to_le_bytes());
        s[128..130].copy_from_slice(&2048u16.to_le_bytes());
        let root = &mut s[156..190];
        root[0] = 34;
        root[2..6].copy_from_slice(&18u32.to_le_bytes());
        root[10..14].copy_from_slice(&2048u32.to_le_bytes());
        root[25] = 0x02;
        root[32] = 1;
        s
    }

    #[test]
    fn test_parse_primary() {
        let pvd = parse_primary(&descriptor(1)).unwrap();
        assert_eq!(pvd.label.as_str(), "MYDISC");
        assert_eq!(pvd.volume_space, 300);
        assert_eq!(pvd.block_size, 2048);
        assert_eq!(pvd.root, Extent::new(18, 2048, RecordFlags::DIRECTORY));
    }

    #[test]
    fn test_primary_rejects_bad_tag() {
        let mut s = descriptor(1);
        s[3] = b'X';
        assert_eq!(parse_primary(&s), Err(FsError::InvalidArgument));
        assert_eq!(parse_primary(&descriptor(2)), Err(FsError::InvalidArgument));
    }

    #[test]
    fn test_joliet_escape_levels() {
        for level in [0x40, 0x43, 0x45] {
            let mut s = descriptor(2);
            s[88..91].copy_from_slice(&[0x25, 0x2F, level]);
            assert!(joliet_root(&s).is_some());
        }
        let mut s = descriptor(2);
        s[88..91].copy_from_slice(&[0x25, 0x2F, 0x41]);
        assert_eq!(joliet_root(&s), None);
        assert_eq!(joliet_root(&descriptor(1)), None);
        assert_eq!(descriptor_type(&descriptor(255)), Some(DescriptorType::Terminator));
    }
}
