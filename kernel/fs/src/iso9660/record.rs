// kernel/fs/src/iso9660/record.rs
// ISO9660 Directory Records
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use crate::node::Extent;

/// Fixed part of a directory record; the name starts here.
pub const RECORD_HEADER_LEN: usize = 33;

// Field offsets
const OFF_EXT_ATTR_LEN: usize = 1;
const OFF_EXTENT: usize = 2;
const OFF_DATA_LEN: usize = 10;
const OFF_RECORDED: usize = 18;
const OFF_FLAGS: usize = 25;
const OFF_UNIT_SIZE: usize = 26;
const OFF_GAP_SIZE: usize = 27;
const OFF_VOLUME_SEQ: usize = 28;
const OFF_NAME_LEN: usize = 32;

bitflags::bitflags! {
    /// File flags byte of a directory record.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct RecordFlags: u8 {
        const HIDDEN      = 0x01;
        const DIRECTORY   = 0x02;
        const ASSOCIATED  = 0x04;
        const EXTENDED    = 0x08;
        const PERMISSIONS = 0x10;
        const NOT_FINAL   = 0x80;
    }
}

pub(crate) fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

pub(crate) fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

/// A directory record borrowed from a sector buffer.
#[derive(Copy, Clone, Debug)]
pub struct DirRecord<'a> {
    raw: &'a [u8],
}

impl<'a> DirRecord<'a> {
    /// Parse the record at the start of `buf`.
    ///
    /// Returns `None` for the zero-length padding marker and for records
    /// that are too short or would run past the end of `buf`.
    pub fn parse(buf: &'a [u8]) -> Option<Self> {
        let len = *buf.first()? as usize;
        if len <= RECORD_HEADER_LEN || len > buf.len() {
            return None;
        }
        let name_len = buf[OFF_NAME_LEN] as usize;
        if name_len == 0 || RECORD_HEADER_LEN + name_len > len {
            return None;
        }
        Some(Self { raw: &buf[..len] })
    }

    pub fn length(&self) -> usize {
        self.raw.len()
    }

    pub fn ext_attr_len(&self) -> u8 {
        self.raw[OFF_EXT_ATTR_LEN]
    }

    pub fn extent_lba(&self) -> u32 {
        le_u32(self.raw, OFF_EXTENT)
    }

    pub fn data_length(&self) -> u32 {
        le_u32(self.raw, OFF_DATA_LEN)
    }

    /// Seven-byte recording timestamp, undecoded.
    pub fn recorded(&self) -> &'a [u8] {
        &self.raw[OFF_RECORDED..OFF_FLAGS]
    }

    pub fn flags(&self) -> RecordFlags {
        RecordFlags::from_bits_retain(self.raw[OFF_FLAGS])
    }

    pub fn interleave(&self) -> (u8, u8) {
        (self.raw[OFF_UNIT_SIZE], self.raw[OFF_GAP_SIZE])
    }

    pub fn volume_sequence(&self) -> u16 {
        le_u16(self.raw, OFF_VOLUME_SEQ)
    }

    pub fn name(&self) -> &'a [u8] {
        let name_len = self.raw[OFF_NAME_LEN] as usize;
        &self.raw[RECORD_HEADER_LEN..RECORD_HEADER_LEN + name_len]
    }

    pub fn is_dot(&self) -> bool {
        self.name() == [0]
    }

    pub fn is_dotdot(&self) -> bool {
        self.name() == [1]
    }

    pub fn is_dir(&self) -> bool {
        self.flags().contains(RecordFlags::DIRECTORY)
    }

    /// System use area after the name, its pad byte and `skip` bytes
    /// announced by the SUSP indicator.
    pub fn system_use(&self, skip: u8) -> &'a [u8] {
        let name_len = self.name().len();
        let pad = if name_len % 2 == 0 { 1 } else { 0 };
        let start = RECORD_HEADER_LEN + name_len + pad + skip as usize;
        self.raw.get(start..).unwrap_or(&[])
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.extent_lba(), self.data_length(), self.flags())
    }
}
