// kernel/disk/src/ata.rs
// ATA/IDE PIO Driver
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use bitflags::bitflags;
use kernel_log::klog_warn;

use crate::block_device::*;
use crate::config::{ATA_SECTOR_SIZE, LBA28_MAX};
use crate::port::PortIo;

// ATA I/O Ports
pub const ATA_PRIMARY_IO: u16 = 0x1F0;
pub const ATA_SECONDARY_IO: u16 = 0x170;
pub const ATA_PRIMARY_CTRL: u16 = 0x3F6;
pub const ATA_SECONDARY_CTRL: u16 = 0x376;

// ATA Registers (offset from base)
pub const ATA_REG_DATA: u16 = 0;
pub const ATA_REG_ERROR: u16 = 1;
pub const ATA_REG_FEATURES: u16 = 1;
pub const ATA_REG_SECCOUNT: u16 = 2;
pub const ATA_REG_LBA_LO: u16 = 3;
pub const ATA_REG_LBA_MID: u16 = 4;
pub const ATA_REG_LBA_HI: u16 = 5;
pub const ATA_REG_DEVICE: u16 = 6;
pub const ATA_REG_STATUS: u16 = 7;
pub const ATA_REG_COMMAND: u16 = 7;

// ATA Commands
pub const ATA_CMD_READ_PIO: u8 = 0x20;
pub const ATA_CMD_WRITE_PIO: u8 = 0x30;
pub const ATA_CMD_PACKET: u8 = 0xA0;
pub const ATA_CMD_IDENTIFY_PACKET: u8 = 0xA1;
pub const ATA_CMD_CACHE_FLUSH: u8 = 0xE7;
pub const ATA_CMD_IDENTIFY: u8 = 0xEC;

bitflags! {
    /// Status / alternate status register.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Status: u8 {
        const BSY  = 0x80; // Busy
        const DRDY = 0x40; // Drive ready
        const DF   = 0x20; // Drive fault
        const DSC  = 0x10; // Drive seek complete
        const DRQ  = 0x08; // Data request
        const CORR = 0x04; // Corrected data
        const IDX  = 0x02; // Index
        const ERR  = 0x01; // Error
    }
}

bitflags! {
    /// Device control register (write side of the control port).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Control: u8 {
        const NIEN = 0x02; // Interrupts masked
        const SRST = 0x04; // Software reset
    }
}

bitflags! {
    /// Drive/head register.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct DriveSelect: u8 {
        const FIXED = 0xA0; // Obsolete bits, always set
        const LBA   = 0x40;
        const SLAVE = 0x10;
    }
}

impl DriveRole {
    pub fn select(self) -> DriveSelect {
        match self {
            DriveRole::Master => DriveSelect::FIXED,
            DriveRole::Slave => DriveSelect::FIXED | DriveSelect::SLAVE,
        }
    }
}

/// Register-level view of one channel for the duration of a command.
pub(crate) struct Bus<'a, P: PortIo> {
    io: &'a mut P,
    base: u16,
    ctrl: u16,
    timeout: u32,
}

impl<'a, P: PortIo> Bus<'a, P> {
    pub(crate) fn new(io: &'a mut P, channel: Channel, timeout: u32) -> Self {
        Self {
            io,
            base: channel.base(),
            ctrl: channel.ctrl(),
            timeout,
        }
    }

    pub(crate) fn read_reg(&mut self, reg: u16) -> u8 {
        self.io.inb(self.base + reg)
    }

    pub(crate) fn write_reg(&mut self, reg: u16, value: u8) {
        self.io.outb(self.base + reg, value);
    }

    pub(crate) fn status(&mut self) -> Status {
        Status::from_bits_retain(self.read_reg(ATA_REG_STATUS))
    }

    pub(crate) fn command(&mut self, cmd: u8) {
        self.write_reg(ATA_REG_COMMAND, cmd);
    }

    pub(crate) fn set_control(&mut self, value: Control) {
        self.io.outb(self.ctrl, value.bits());
    }

    /// Four alternate-status reads take at least 400ns on real buses.
    pub(crate) fn delay_400ns(&mut self) {
        for _ in 0..4 {
            let _ = self.io.inb(self.ctrl);
        }
    }

    pub(crate) fn select(&mut self, value: u8) {
        self.write_reg(ATA_REG_DEVICE, value);
        self.delay_400ns();
    }

    /// Spin until BSY clears.
    pub(crate) fn wait_bsy(&mut self) -> Result<Status> {
        for _ in 0..self.timeout {
            let status = self.status();
            if !status.contains(Status::BSY) {
                return Ok(status);
            }
            core::hint::spin_loop();
        }
        Err(DiskError::Timeout)
    }

    /// Spin until the drive asks for data, classifying ERR and DF on the way.
    pub(crate) fn wait_drq(&mut self) -> Result<()> {
        for _ in 0..self.timeout {
            let status = self.status();
            if status.contains(Status::ERR) {
                return Err(DiskError::ReadError);
            }
            if status.contains(Status::DF) {
                return Err(DiskError::DriveFault);
            }
            if !status.contains(Status::BSY) && status.contains(Status::DRQ) {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(DiskError::Timeout)
    }

    /// Settle, wait for BSY to clear, and optionally insist on DRQ.
    pub(crate) fn poll(&mut self, check_error: bool) -> Result<()> {
        self.delay_400ns();
        let status = self.wait_bsy()?;
        if !check_error {
            return Ok(());
        }
        if status.contains(Status::ERR) {
            return Err(DiskError::ReadError);
        }
        if status.contains(Status::DF) {
            return Err(DiskError::DriveFault);
        }
        if !status.contains(Status::DRQ) {
            return Err(DiskError::ReadError);
        }
        Ok(())
    }

    /// Drain `out.len() / 2` data words, low byte first.
    pub(crate) fn read_words(&mut self, out: &mut [u8]) {
        for pair in out.chunks_exact_mut(2) {
            let word = self.io.inw(self.base + ATA_REG_DATA);
            pair.copy_from_slice(&word.to_le_bytes());
        }
    }

    pub(crate) fn read_word(&mut self) -> u16 {
        self.io.inw(self.base + ATA_REG_DATA)
    }

    pub(crate) fn write_words(&mut self, data: &[u8]) {
        for pair in data.chunks_exact(2) {
            let word = u16::from_le_bytes([pair[0], pair[1]]);
            self.io.outw(self.base + ATA_REG_DATA, word);
        }
    }

    /// Program sector count and the low 24 address bits.
    pub(crate) fn set_lba28(&mut self, lba: u32, count: u8) {
        self.write_reg(ATA_REG_SECCOUNT, count);
        self.write_reg(ATA_REG_LBA_LO, (lba & 0xFF) as u8);
        self.write_reg(ATA_REG_LBA_MID, ((lba >> 8) & 0xFF) as u8);
        self.write_reg(ATA_REG_LBA_HI, ((lba >> 16) & 0xFF) as u8);
    }
}

fn as_write_error(e: DiskError) -> DiskError {
    match e {
        DiskError::ReadError => DiskError::WriteError,
        other => other,
    }
}

fn check_transfer(lba: u32, count: u8, buf_len: usize) -> Result<()> {
    if count == 0 || lba > LBA28_MAX || buf_len < count as usize * ATA_SECTOR_SIZE {
        return Err(DiskError::InvalidParameter);
    }
    Ok(())
}

impl<P: PortIo> DeviceTable<P> {
    /// Write nIEN to both control ports; this driver only polls.
    pub fn mask_interrupts(&mut self) {
        for channel in Channel::ALL {
            self.bus(channel).set_control(Control::NIEN);
        }
    }

    /// Pulse SRST on a channel and wait for both drives to come back.
    pub fn soft_reset(&mut self, channel: Channel) -> Result<()> {
        let mut bus = self.bus(channel);
        bus.set_control(Control::SRST | Control::NIEN);
        bus.delay_400ns();
        bus.set_control(Control::NIEN);
        bus.delay_400ns();
        bus.wait_bsy().map(|_| ())
    }

    /// PIO read of `count` 512-byte sectors from an ATA disk.
    pub fn read_sectors(&mut self, drive: u8, lba: u32, count: u8, buf: &mut [u8]) -> Result<()> {
        let dev = self.expect_class(drive, DeviceClass::Ata)?;
        check_transfer(lba, count, buf.len())?;

        let mut bus = self.bus(dev.channel);
        bus.wait_bsy()?;
        bus.select((dev.role.select() | DriveSelect::LBA).bits() | ((lba >> 24) & 0x0F) as u8);
        bus.set_lba28(lba, count);
        bus.command(ATA_CMD_READ_PIO);

        for sector in buf.chunks_exact_mut(ATA_SECTOR_SIZE).take(count as usize) {
            if let Err(e) = bus.poll(true) {
                klog_warn!("ata", "drive {}: read at lba {} failed: {}", drive, lba, e);
                return Err(e);
            }
            bus.read_words(sector);
        }
        Ok(())
    }

    /// PIO write of `count` 512-byte sectors followed by a cache flush.
    pub fn write_sectors(&mut self, drive: u8, lba: u32, count: u8, buf: &[u8]) -> Result<()> {
        let dev = self.expect_class(drive, DeviceClass::Ata)?;
        check_transfer(lba, count, buf.len())?;

        let mut bus = self.bus(dev.channel);
        bus.wait_bsy()?;
        bus.select((dev.role.select() | DriveSelect::LBA).bits() | ((lba >> 24) & 0x0F) as u8);
        bus.set_lba28(lba, count);
        bus.command(ATA_CMD_WRITE_PIO);

        for sector in buf.chunks_exact(ATA_SECTOR_SIZE).take(count as usize) {
            let ready = bus.poll(false).and_then(|_| bus.wait_drq());
            if let Err(e) = ready.map_err(as_write_error) {
                klog_warn!("ata", "drive {}: write at lba {} failed: {}", drive, lba, e);
                return Err(e);
            }
            bus.write_words(sector);
        }

        bus.command(ATA_CMD_CACHE_FLUSH);
        bus.wait_bsy().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeOptions;
    use crate::sim::{Fault, SimController, SimDrive};

    fn disk_table() -> DeviceTable<SimController> {
        let mut sim = SimController::new();
        sim.attach(Channel::Primary, DriveRole::Master, SimDrive::ata("SIM HARDDISK", 64));
        DeviceTable::init(sim, ProbeOptions::new().with_timeout(200))
    }

    #[test]
    fn test_read_write_round_trip() {
        let mut table = disk_table();
        let mut data = [0u8; 1024];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        table.write_sectors(0, 5, 2, &data).unwrap();

        let mut back = [0u8; 1024];
        table.read_sectors(0, 5, 2, &mut back).unwrap();
        assert_eq!(back[..], data[..]);
        assert_eq!(table.ports().flushes(Channel::Primary), 1);
    }

    #[test]
    fn test_read_selects_lba_mode() {
        let mut table = disk_table();
        let mut buf = [0u8; 512];
        table.read_sectors(0, 0x0123_4567, 1, &mut buf).unwrap_err();
        // Address beyond the simulated disk: the drive reports ERR
        let select = table.ports().last_select(Channel::Primary);
        assert_eq!(select, 0xE0 | 0x01);
    }

    #[test]
    fn test_parameter_validation() {
        let mut table = disk_table();
        let mut buf = [0u8; 512];
        assert_eq!(table.read_sectors(7, 0, 1, &mut buf), Err(DiskError::InvalidParameter));
        assert_eq!(table.read_sectors(1, 0, 1, &mut buf), Err(DiskError::NoDevice));
        assert_eq!(table.read_sectors(0, 0, 0, &mut buf), Err(DiskError::InvalidParameter));
        assert_eq!(table.read_sectors(0, 0, 2, &mut buf), Err(DiskError::InvalidParameter));
        assert_eq!(
            table.read_sectors(0, LBA28_MAX + 1, 1, &mut buf),
            Err(DiskError::InvalidParameter)
        );
    }

    #[test]
    fn test_faults_are_classified() {
        let mut table = disk_table();
        let mut buf = [0u8; 512];

        table.ports_mut().set_fault(Channel::Primary, DriveRole::Master, Fault::Error);
        assert_eq!(table.read_sectors(0, 0, 1, &mut buf), Err(DiskError::ReadError));
        assert_eq!(table.write_sectors(0, 0, 1, &buf), Err(DiskError::WriteError));

        table.ports_mut().set_fault(Channel::Primary, DriveRole::Master, Fault::DriveFault);
        assert_eq!(table.read_sectors(0, 0, 1, &mut buf), Err(DiskError::DriveFault));
    }

    #[test]
    fn test_stuck_busy_times_out() {
        let mut table = disk_table();
        let mut buf = [0u8; 512];
        table.ports_mut().set_fault(Channel::Primary, DriveRole::Master, Fault::StuckBusy);

        // Each entry point gives up after one budget of 200 polls. The wait
        // before select may cost one read on whichever drive was selected last.
        let mut before = table.ports().status_reads();
        assert_eq!(table.read_sectors(0, 0, 1, &mut buf), Err(DiskError::Timeout));
        let spent = table.ports().status_reads() - before;
        assert!((200..=201).contains(&spent), "read polled {} times", spent);

        before = table.ports().status_reads();
        assert_eq!(table.write_sectors(0, 0, 1, &buf), Err(DiskError::Timeout));
        let spent = table.ports().status_reads() - before;
        assert!((200..=201).contains(&spent), "write polled {} times", spent);

        before = table.ports().status_reads();
        assert_eq!(table.soft_reset(Channel::Primary), Err(DiskError::Timeout));
        let spent = table.ports().status_reads() - before;
        assert!((200..=201).contains(&spent), "reset polled {} times", spent);
    }

    #[test]
    fn test_init_masks_interrupts() {
        let table = disk_table();
        assert_eq!(table.ports().control(Channel::Primary) & Control::NIEN.bits(), Control::NIEN.bits());
        assert_eq!(table.ports().control(Channel::Secondary) & Control::NIEN.bits(), Control::NIEN.bits());
    }

    #[test]
    fn test_soft_reset_recovers() {
        let mut table = disk_table();
        assert_eq!(table.soft_reset(Channel::Primary), Ok(()));
        assert_eq!(table.ports().resets(Channel::Primary), 1);
        assert_eq!(table.ports().control(Channel::Primary), Control::NIEN.bits());
    }
}
