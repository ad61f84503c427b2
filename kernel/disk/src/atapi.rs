// kernel/disk/src/atapi.rs
// ATAPI Packet Commands
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use kernel_log::{klog_info, klog_warn};

use crate::ata::*;
use crate::block_device::*;
use crate::config::ATAPI_SECTOR_SIZE;
use crate::port::PortIo;

// SCSI opcodes
pub const SCSI_READ_12: u8 = 0xA8;
pub const SCSI_START_STOP_UNIT: u8 = 0x1B;
pub const SCSI_READ_CAPACITY_10: u8 = 0x25;

// START STOP UNIT byte 4: LoEj with Start clear ejects the tray
const START_STOP_EJECT: u8 = 0x02;

/// 12-byte SCSI command descriptor block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cdb([u8; 12]);

impl Cdb {
    pub const fn read12(lba: u32, sectors: u8) -> Self {
        let lba = lba.to_be_bytes();
        Self([
            SCSI_READ_12, 0, lba[0], lba[1], lba[2], lba[3], 0, 0, 0, sectors, 0, 0,
        ])
    }

    pub const fn read_capacity() -> Self {
        Self([SCSI_READ_CAPACITY_10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
    }

    pub const fn eject() -> Self {
        Self([SCSI_START_STOP_UNIT, 0, 0, 0, START_STOP_EJECT, 0, 0, 0, 0, 0, 0, 0])
    }

    pub const fn bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl<P: PortIo> Bus<'_, P> {
    /// Select, announce the expected byte count, issue PACKET and hand over
    /// the CDB once the drive raises DRQ.
    fn send_packet(&mut self, role: DriveRole, byte_count: u16, cdb: &Cdb) -> Result<()> {
        self.wait_bsy()?;
        self.select(role.select().bits());
        self.write_reg(ATA_REG_FEATURES, 0);
        self.write_reg(ATA_REG_LBA_MID, (byte_count & 0xFF) as u8);
        self.write_reg(ATA_REG_LBA_HI, (byte_count >> 8) as u8);
        self.command(ATA_CMD_PACKET);
        self.wait_drq()?;
        self.write_words(cdb.bytes());
        Ok(())
    }
}

impl<P: PortIo> DeviceTable<P> {
    /// READ(12) of `count` 2048-byte sectors into `buf`.
    pub fn atapi_read(&mut self, drive: u8, lba: u32, count: u8, buf: &mut [u8]) -> Result<()> {
        let dev = self.expect_class(drive, DeviceClass::Atapi)?;
        if count == 0 || buf.len() < count as usize * ATAPI_SECTOR_SIZE {
            return Err(DiskError::InvalidParameter);
        }

        let mut bus = self.bus(dev.channel);
        bus.send_packet(dev.role, ATAPI_SECTOR_SIZE as u16, &Cdb::read12(lba, count))?;

        for sector in buf.chunks_exact_mut(ATAPI_SECTOR_SIZE).take(count as usize) {
            if let Err(e) = bus.poll(true) {
                klog_warn!("atapi", "drive {}: read at lba {} failed: {}", drive, lba, e);
                return Err(e);
            }
            bus.read_words(sector);
        }
        Ok(())
    }

    /// START STOP UNIT with the eject bit; no data phase.
    pub fn atapi_eject(&mut self, drive: u8) -> Result<()> {
        let dev = self.expect_class(drive, DeviceClass::Atapi)?;
        let mut bus = self.bus(dev.channel);
        bus.send_packet(dev.role, 0, &Cdb::eject())?;
        bus.wait_bsy()?;
        klog_info!("atapi", "drive {}: tray ejected", drive);
        Ok(())
    }

    /// READ CAPACITY(10): returns the number of addressable sectors.
    pub fn atapi_read_capacity(&mut self, drive: u8) -> Result<u32> {
        let dev = self.expect_class(drive, DeviceClass::Atapi)?;
        let mut bus = self.bus(dev.channel);
        bus.send_packet(dev.role, 8, &Cdb::read_capacity())?;
        bus.poll(true)?;

        let mut reply = [0u8; 8];
        bus.read_words(&mut reply);
        let last_lba = u32::from_be_bytes([reply[0], reply[1], reply[2], reply[3]]);
        Ok(last_lba.wrapping_add(1))
    }
}
