// kernel/disk/src/sim.rs
// Simulated Dual-Channel IDE Controller
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

//! Register-level model of two legacy IDE channels, used by host tests.
//!
//! Drives answer IDENTIFY / IDENTIFY PACKET, PIO sector transfers, CACHE
//! FLUSH and the READ(12) / READ CAPACITY / START STOP UNIT packets. Faults
//! can be injected per drive after enumeration.

use alloc::vec;
use alloc::vec::Vec;

use crate::ata::*;
use crate::atapi::{SCSI_READ_12, SCSI_READ_CAPACITY_10, SCSI_START_STOP_UNIT};
use crate::block_device::{Channel, DriveRole};
use crate::config::{ATAPI_SECTOR_SIZE, ATA_SECTOR_SIZE, IDENTIFY_WORDS};
use crate::port::PortIo;

const ERR_ABORT: u8 = 0x04;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimKind {
    Ata,
    Atapi,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    None,
    /// BSY never clears.
    StuckBusy,
    /// Every status read reports ERR.
    Error,
    /// Every status read reports DF.
    DriveFault,
}

pub struct SimDrive {
    pub kind: SimKind,
    /// Value left in LBA mid/high when IDENTIFY is aborted.
    pub signature: (u8, u8),
    pub identify: [u16; IDENTIFY_WORDS],
    pub media: Vec<u8>,
    pub fault: Fault,
    pub ejected: bool,
}

impl SimDrive {
    pub fn ata(model: &str, sectors: u32) -> Self {
        let mut identify = base_identify(model);
        identify[0] = 0x0040;
        identify[60] = (sectors & 0xFFFF) as u16;
        identify[61] = (sectors >> 16) as u16;
        Self {
            kind: SimKind::Ata,
            signature: (0, 0),
            identify,
            media: vec![0; sectors as usize * ATA_SECTOR_SIZE],
            fault: Fault::None,
            ejected: false,
        }
    }

    /// Packet drive holding `image`, padded to whole 2048-byte sectors.
    pub fn atapi(model: &str, image: &[u8]) -> Self {
        let mut identify = base_identify(model);
        identify[0] = 0x85C0;
        let sectors = image.len().div_ceil(ATAPI_SECTOR_SIZE);
        let mut media = vec![0; sectors * ATAPI_SECTOR_SIZE];
        media[..image.len()].copy_from_slice(image);
        Self {
            kind: SimKind::Atapi,
            signature: (0x14, 0xEB),
            identify,
            media,
            fault: Fault::None,
            ejected: false,
        }
    }

    /// Packet drive reporting the SATA-bridge signature.
    pub fn atapi_alt(model: &str, image: &[u8]) -> Self {
        let mut drive = Self::atapi(model, image);
        drive.signature = (0x69, 0x96);
        drive
    }

    fn sector_size(&self) -> usize {
        match self.kind {
            SimKind::Ata => ATA_SECTOR_SIZE,
            SimKind::Atapi => ATAPI_SECTOR_SIZE,
        }
    }

    fn sectors(&self) -> u32 {
        (self.media.len() / self.sector_size()) as u32
    }

    fn words_at(&self, lba: u32, count: u32) -> Option<Vec<u16>> {
        if self.ejected || lba.checked_add(count)? > self.sectors() {
            return None;
        }
        let size = self.sector_size();
        let start = lba as usize * size;
        let end = start + count as usize * size;
        Some(
            self.media[start..end]
                .chunks_exact(2)
                .map(|p| u16::from_le_bytes([p[0], p[1]]))
                .collect(),
        )
    }
}

fn pack_string(words: &mut [u16], text: &str) {
    let bytes = text.as_bytes();
    for (i, word) in words.iter_mut().enumerate() {
        let hi = bytes.get(i * 2).copied().unwrap_or(b' ');
        let lo = bytes.get(i * 2 + 1).copied().unwrap_or(b' ');
        *word = u16::from_be_bytes([hi, lo]);
    }
}

fn base_identify(model: &str) -> [u16; IDENTIFY_WORDS] {
    let mut words = [0u16; IDENTIFY_WORDS];
    pack_string(&mut words[10..20], "SIM0001");
    pack_string(&mut words[23..27], "1.0");
    pack_string(&mut words[27..47], model);
    words[49] = 0x0200;
    words[82] = 0x4000;
    words[83] = 0x4000;
    words
}

enum Phase {
    Idle,
    Packet(Vec<u16>),
    Write { lba: u32, remaining: u32, words: Vec<u16> },
}

struct SimChannel {
    drives: [Option<SimDrive>; 2],
    selected: usize,
    regs: [u8; 8],
    control: u8,
    status: u8,
    busy_left: u32,
    data: Vec<u16>,
    cursor: usize,
    phase: Phase,
    flushes: u32,
    resets: u32,
    last_cdb: [u8; 12],
}

impl SimChannel {
    fn new() -> Self {
        Self {
            drives: [None, None],
            selected: 0,
            regs: [0; 8],
            control: 0,
            status: 0,
            busy_left: 0,
            data: Vec::new(),
            cursor: 0,
            phase: Phase::Idle,
            flushes: 0,
            resets: 0,
            last_cdb: [0; 12],
        }
    }

    fn drive(&self) -> Option<&SimDrive> {
        self.drives[self.selected].as_ref()
    }

    fn read_status(&mut self) -> u8 {
        let fault = match self.drive() {
            Some(d) => d.fault,
            None => return 0,
        };
        match fault {
            Fault::StuckBusy => Status::BSY.bits(),
            Fault::Error => (Status::DRDY | Status::ERR).bits(),
            Fault::DriveFault => (Status::DRDY | Status::DF).bits(),
            Fault::None if self.busy_left > 0 => {
                self.busy_left -= 1;
                Status::BSY.bits()
            }
            Fault::None => self.status,
        }
    }

    fn finish(&mut self, status: Status) {
        self.status = status.bits();
        self.regs[ATA_REG_ERROR as usize] = if status.contains(Status::ERR) {
            ERR_ABORT
        } else {
            0
        };
    }

    fn load(&mut self, words: Vec<u16>) {
        self.data = words;
        self.cursor = 0;
        self.finish(Status::DRDY | Status::DRQ);
    }

    fn lba28(&self) -> u32 {
        (self.regs[ATA_REG_LBA_LO as usize] as u32)
            | (self.regs[ATA_REG_LBA_MID as usize] as u32) << 8
            | (self.regs[ATA_REG_LBA_HI as usize] as u32) << 16
            | ((self.regs[ATA_REG_DEVICE as usize] & 0x0F) as u32) << 24
    }

    fn command(&mut self, cmd: u8, busy_cycles: u32) {
        self.data.clear();
        self.cursor = 0;
        self.phase = Phase::Idle;
        self.busy_left = busy_cycles;

        let (kind, signature, identify) = match self.drive() {
            Some(d) if d.fault == Fault::None => (d.kind, d.signature, d.identify),
            _ => return,
        };

        match cmd {
            ATA_CMD_IDENTIFY => {
                if kind == SimKind::Atapi || signature != (0, 0) {
                    self.regs[ATA_REG_LBA_MID as usize] = signature.0;
                    self.regs[ATA_REG_LBA_HI as usize] = signature.1;
                    self.finish(Status::DRDY | Status::ERR);
                } else {
                    self.load(identify.to_vec());
                }
            }
            ATA_CMD_IDENTIFY_PACKET if kind == SimKind::Atapi => self.load(identify.to_vec()),
            ATA_CMD_READ_PIO if kind == SimKind::Ata => {
                let count = match self.regs[ATA_REG_SECCOUNT as usize] {
                    0 => 256,
                    n => n as u32,
                };
                let lba = self.lba28();
                let words = self.drive().and_then(|d| d.words_at(lba, count));
                match words {
                    Some(words) => self.load(words),
                    None => self.finish(Status::DRDY | Status::ERR),
                }
            }
            ATA_CMD_WRITE_PIO if kind == SimKind::Ata => {
                let remaining = match self.regs[ATA_REG_SECCOUNT as usize] {
                    0 => 256,
                    n => n as u32,
                };
                self.phase = Phase::Write {
                    lba: self.lba28(),
                    remaining,
                    words: Vec::new(),
                };
                self.finish(Status::DRDY | Status::DRQ);
            }
            ATA_CMD_CACHE_FLUSH if kind == SimKind::Ata => {
                self.flushes += 1;
                self.finish(Status::DRDY);
            }
            ATA_CMD_PACKET if kind == SimKind::Atapi => {
                self.phase = Phase::Packet(Vec::new());
                self.finish(Status::DRDY | Status::DRQ);
            }
            _ => self.finish(Status::DRDY | Status::ERR),
        }
    }

    fn read_data(&mut self) -> u16 {
        let word = self.data.get(self.cursor).copied().unwrap_or(0);
        if self.cursor < self.data.len() {
            self.cursor += 1;
            if self.cursor == self.data.len() {
                self.finish(Status::DRDY);
            }
        }
        word
    }

    fn write_data(&mut self, word: u16) {
        match core::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {}
            Phase::Packet(mut words) => {
                words.push(word);
                if words.len() == 6 {
                    let mut cdb = [0u8; 12];
                    for (i, w) in words.iter().enumerate() {
                        cdb[i * 2..i * 2 + 2].copy_from_slice(&w.to_le_bytes());
                    }
                    self.execute_packet(cdb);
                } else {
                    self.phase = Phase::Packet(words);
                }
            }
            Phase::Write {
                lba,
                remaining,
                mut words,
            } => {
                words.push(word);
                if words.len() < ATA_SECTOR_SIZE / 2 {
                    self.phase = Phase::Write {
                        lba,
                        remaining,
                        words,
                    };
                    return;
                }
                let stored = match self.drives[self.selected].as_mut() {
                    Some(d) if lba < d.sectors() => {
                        let start = lba as usize * ATA_SECTOR_SIZE;
                        for (i, w) in words.iter().enumerate() {
                            d.media[start + i * 2..start + i * 2 + 2]
                                .copy_from_slice(&w.to_le_bytes());
                        }
                        true
                    }
                    _ => false,
                };
                if !stored {
                    self.finish(Status::DRDY | Status::ERR);
                } else if remaining > 1 {
                    self.phase = Phase::Write {
                        lba: lba + 1,
                        remaining: remaining - 1,
                        words: Vec::new(),
                    };
                } else {
                    self.finish(Status::DRDY);
                }
            }
        }
    }

    fn execute_packet(&mut self, cdb: [u8; 12]) {
        self.last_cdb = cdb;
        match cdb[0] {
            SCSI_READ_12 => {
                let lba = u32::from_be_bytes([cdb[2], cdb[3], cdb[4], cdb[5]]);
                let count = cdb[9] as u32;
                let words = self.drive().and_then(|d| d.words_at(lba, count));
                match words {
                    Some(words) => self.load(words),
                    None => self.finish(Status::DRDY | Status::ERR),
                }
            }
            SCSI_READ_CAPACITY_10 => {
                let last = self.drive().map_or(0, |d| d.sectors().saturating_sub(1));
                let mut reply = [0u8; 8];
                reply[..4].copy_from_slice(&last.to_be_bytes());
                reply[4..].copy_from_slice(&(ATAPI_SECTOR_SIZE as u32).to_be_bytes());
                let words = reply
                    .chunks_exact(2)
                    .map(|p| u16::from_le_bytes([p[0], p[1]]))
                    .collect();
                self.load(words);
            }
            SCSI_START_STOP_UNIT => {
                if cdb[4] & 0x02 != 0 {
                    if let Some(d) = self.drives[self.selected].as_mut() {
                        d.ejected = true;
                    }
                }
                self.finish(Status::DRDY);
            }
            _ => self.finish(Status::DRDY | Status::ERR),
        }
    }

    fn write_control(&mut self, value: u8) {
        let was_reset = self.control & Control::SRST.bits() != 0;
        self.control = value;
        if value & Control::SRST.bits() != 0 {
            self.phase = Phase::Idle;
            self.data.clear();
            self.status = Status::BSY.bits();
        } else if was_reset {
            self.resets += 1;
            self.selected = 0;
            self.finish(Status::DRDY);
        }
    }
}

/// Both legacy channels with up to two drives each.
pub struct SimController {
    channels: [SimChannel; 2],
    busy_cycles: u32,
    status_reads: u64,
}

impl SimController {
    pub fn new() -> Self {
        Self {
            channels: [SimChannel::new(), SimChannel::new()],
            busy_cycles: 2,
            status_reads: 0,
        }
    }

    pub fn attach(&mut self, channel: Channel, role: DriveRole, drive: SimDrive) {
        self.channels[channel as usize].drives[role as usize] = Some(drive);
    }

    /// Status reads that report BSY after every command.
    pub fn set_busy_cycles(&mut self, cycles: u32) {
        self.busy_cycles = cycles;
    }

    pub fn set_fault(&mut self, channel: Channel, role: DriveRole, fault: Fault) {
        if let Some(d) = self.channels[channel as usize].drives[role as usize].as_mut() {
            d.fault = fault;
        }
    }

    pub fn media(&self, channel: Channel, role: DriveRole) -> Option<&[u8]> {
        self.channels[channel as usize].drives[role as usize]
            .as_ref()
            .map(|d| d.media.as_slice())
    }

    pub fn ejected(&self, channel: Channel, role: DriveRole) -> bool {
        self.channels[channel as usize].drives[role as usize]
            .as_ref()
            .is_some_and(|d| d.ejected)
    }

    pub fn flushes(&self, channel: Channel) -> u32 {
        self.channels[channel as usize].flushes
    }

    pub fn resets(&self, channel: Channel) -> u32 {
        self.channels[channel as usize].resets
    }

    pub fn control(&self, channel: Channel) -> u8 {
        self.channels[channel as usize].control
    }

    pub fn last_select(&self, channel: Channel) -> u8 {
        self.channels[channel as usize].regs[ATA_REG_DEVICE as usize]
    }

    pub fn last_cdb(&self, channel: Channel) -> [u8; 12] {
        self.channels[channel as usize].last_cdb
    }

    /// Byte count programmed into LBA mid/high for the last packet.
    pub fn byte_count(&self, channel: Channel) -> u16 {
        let regs = &self.channels[channel as usize].regs;
        u16::from_le_bytes([regs[ATA_REG_LBA_MID as usize], regs[ATA_REG_LBA_HI as usize]])
    }

    /// Reads of either status register since creation.
    pub fn status_reads(&self) -> u64 {
        self.status_reads
    }

    fn route(port: u16) -> Option<(usize, Option<u16>)> {
        for channel in Channel::ALL {
            if port == channel.ctrl() {
                return Some((channel as usize, None));
            }
            if (channel.base()..channel.base() + 8).contains(&port) {
                return Some((channel as usize, Some(port - channel.base())));
            }
        }
        None
    }
}

impl Default for SimController {
    fn default() -> Self {
        Self::new()
    }
}

impl PortIo for SimController {
    fn inb(&mut self, port: u16) -> u8 {
        let Some((idx, reg)) = Self::route(port) else {
            return 0xFF;
        };
        let ch = &mut self.channels[idx];
        match reg {
            None => ch.read_status(),
            Some(ATA_REG_STATUS) => {
                self.status_reads += 1;
                ch.read_status()
            }
            Some(r) => ch.regs[r as usize],
        }
    }

    fn outb(&mut self, port: u16, value: u8) {
        let Some((idx, reg)) = Self::route(port) else {
            return;
        };
        let busy_cycles = self.busy_cycles;
        let ch = &mut self.channels[idx];
        match reg {
            None => ch.write_control(value),
            Some(ATA_REG_COMMAND) => ch.command(value, busy_cycles),
            Some(ATA_REG_DEVICE) => {
                ch.regs[ATA_REG_DEVICE as usize] = value;
                ch.selected = ((value & DriveSelect::SLAVE.bits()) != 0) as usize;
                ch.status = if ch.drive().is_some() {
                    Status::DRDY.bits()
                } else {
                    0
                };
            }
            Some(r) => ch.regs[r as usize] = value,
        }
    }

    fn inw(&mut self, port: u16) -> u16 {
        match Self::route(port) {
            Some((idx, Some(ATA_REG_DATA))) => self.channels[idx].read_data(),
            _ => 0xFFFF,
        }
    }

    fn outw(&mut self, port: u16, value: u16) {
        if let Some((idx, Some(ATA_REG_DATA))) = Self::route(port) {
            self.channels[idx].write_data(value);
        }
    }
}
