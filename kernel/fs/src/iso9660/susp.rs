// kernel/fs/src/iso9660/susp.rs
// System Use Sharing Protocol / Rock Ridge
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use disk::SectorSource;

use super::record::{le_u32, DirRecord};
use crate::config::ISO_SECTOR_SIZE;
use crate::name::Name;

/// Entry signatures
pub mod signatures {
    pub const SHARING_PROTOCOL: &[u8; 2] = b"SP";
    pub const ROCK_RIDGE: &[u8; 2] = b"RR";
    pub const CONTINUATION: &[u8; 2] = b"CE";
    pub const ALTERNATE_NAME: &[u8; 2] = b"NM";
}

/// Check bytes of the SP indicator.
const SP_MAGIC: [u8; 2] = [0xBE, 0xEF];

const ENTRY_HEADER_LEN: usize = 4;

bitflags::bitflags! {
    /// NM entry flags.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct NmFlags: u8 {
        const CONTINUE = 0x01;
        const CURRENT  = 0x02;
        const PARENT   = 0x04;
    }
}

/// One SUSP entry: signature, version and payload after the 4-byte header.
#[derive(Copy, Clone, Debug)]
pub struct SuspEntry<'a> {
    pub signature: [u8; 2],
    pub version: u8,
    pub data: &'a [u8],
}

/// Walks the entries of a system use area. Stops at a zero or oversized
/// length byte.
pub struct SuspIter<'a> {
    area: &'a [u8],
}

impl<'a> SuspIter<'a> {
    pub fn new(area: &'a [u8]) -> Self {
        Self { area }
    }
}

impl<'a> Iterator for SuspIter<'a> {
    type Item = SuspEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.area.len() < ENTRY_HEADER_LEN {
            return None;
        }
        let len = self.area[2] as usize;
        if len < ENTRY_HEADER_LEN || len > self.area.len() {
            self.area = &[];
            return None;
        }
        let (entry, rest) = self.area.split_at(len);
        self.area = rest;
        Some(SuspEntry {
            signature: [entry[0], entry[1]],
            version: entry[3],
            data: &entry[ENTRY_HEADER_LEN..],
        })
    }
}

/// Rock Ridge state detected at mount.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RockRidge {
    /// Bytes to skip at the start of every later system use area.
    pub skip: u8,
}

/// Look for an SP indicator or an RR marker in the first record of a
/// root directory sector, which must be the `.` entry.
pub fn detect(root_sector: &[u8]) -> Option<RockRidge> {
    let dot = DirRecord::parse(root_sector)?;
    if !dot.is_dot() {
        return None;
    }
    for entry in SuspIter::new(dot.system_use(0)) {
        match &entry.signature {
            signatures::SHARING_PROTOCOL if entry.data.len() >= 3 && entry.data[..2] == SP_MAGIC => {
                return Some(RockRidge { skip: entry.data[2] });
            }
            signatures::ROCK_RIDGE => return Some(RockRidge { skip: 0 }),
            _ => {}
        }
    }
    None
}

/// Location of a continuation area.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Continuation {
    pub block: u32,
    pub offset: u32,
    pub length: u32,
}

impl Continuation {
    /// CE payload: block, offset and length, each both-endian.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 20 {
            return None;
        }
        Some(Self {
            block: le_u32(data, 0),
            offset: le_u32(data, 8),
            length: le_u32(data, 16),
        })
    }
}

enum NmStep {
    /// More NM entries follow.
    More,
    /// Name complete.
    Done,
}

/// Apply one NM payload to the accumulator.
fn apply_nm(data: &[u8], out: &mut Name, found: &mut bool) -> NmStep {
    let Some((&flags, part)) = data.split_first() else {
        return NmStep::Done;
    };
    let flags = NmFlags::from_bits_truncate(flags);

    if flags.contains(NmFlags::CURRENT) {
        out.clear();
        out.push(b'.');
        *found = true;
        return NmStep::Done;
    }
    if flags.contains(NmFlags::PARENT) {
        out.clear();
        out.extend(b"..");
        *found = true;
        return NmStep::Done;
    }

    if !part.is_empty() && out.fits(part.len()) {
        out.extend(part);
        *found = true;
    }
    if flags.contains(NmFlags::CONTINUE) {
        NmStep::More
    } else {
        NmStep::Done
    }
}

/// Resolve the Rock Ridge alternate name of `record` into `out`.
///
/// A CE entry moves parsing into `cont`, read from `drive`; the name
/// collected so far is kept across the hop. Returns false when the
/// record carries no usable NM entry.
pub fn alternate_name(
    record: &DirRecord<'_>,
    rr: RockRidge,
    dev: &mut dyn SectorSource,
    drive: u8,
    cont: &mut [u8; ISO_SECTOR_SIZE],
    out: &mut Name,
) -> bool {
    out.clear();
    let mut found = false;

    for entry in SuspIter::new(record.system_use(rr.skip)) {
        match &entry.signature {
            signatures::ALTERNATE_NAME => {
                if let NmStep::Done = apply_nm(entry.data, out, &mut found) {
                    break;
                }
            }
            signatures::CONTINUATION => {
                if let Some(ce) = Continuation::parse(entry.data) {
                    if dev.read_blocks(drive, ce.block, 1, &mut cont[..]).is_ok() {
                        let start = (ce.offset as usize).min(ISO_SECTOR_SIZE);
                        let end = start.saturating_add(ce.length as usize).min(ISO_SECTOR_SIZE);
                        for more in SuspIter::new(&cont[start..end]) {
                            if &more.signature == signatures::ALTERNATE_NAME {
                                if let NmStep::Done = apply_nm(more.data, out, &mut found) {
                                    break;
                                }
                            }
                        }
                    }
                }
                break;
            }
            _ => {}
        }
    }
    found
}
