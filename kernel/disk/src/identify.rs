// kernel/disk/src/identify.rs
// Device Identification
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use kernel_log::{klog_debug, klog_warn};

use crate::ata::*;
use crate::block_device::*;
use crate::config::IDENTIFY_WORDS;
use crate::port::PortIo;

// Signatures left in LBA mid/high by a packet device that rejected IDENTIFY
const ATAPI_SIGNATURES: [(u8, u8); 2] = [(0x14, 0xEB), (0x69, 0x96)];

// Word 83 bit 10 (48-bit address feature set) as seen in the 82/83 bitmask
const CMDSET_LBA48: u32 = 1 << 26;

/// Raw IDENTIFY (PACKET) DEVICE response.
pub struct IdentifyData {
    pub words: [u16; IDENTIFY_WORDS],
}

impl IdentifyData {
    pub const fn zeroed() -> Self {
        Self {
            words: [0; IDENTIFY_WORDS],
        }
    }

    pub fn signature(&self) -> u16 {
        self.words[0]
    }

    pub fn capabilities(&self) -> u16 {
        self.words[49]
    }

    pub fn command_sets(&self) -> u32 {
        ((self.words[83] as u32) << 16) | self.words[82] as u32
    }

    /// Sector count; only the 28-bit field is trusted unless the drive
    /// advertises the 48-bit feature set.
    pub fn size(&self) -> u32 {
        if self.command_sets() & CMDSET_LBA48 != 0 {
            ((self.words[103] as u32) << 16) | self.words[102] as u32
        } else {
            ((self.words[61] as u32) << 16) | self.words[60] as u32
        }
    }

    pub fn to_info(&self, channel: Channel, role: DriveRole, class: DeviceClass) -> DeviceInfo {
        DeviceInfo {
            present: true,
            channel,
            role,
            class,
            signature: self.signature(),
            capabilities: self.capabilities(),
            command_sets: self.command_sets(),
            size: self.size(),
            model: IdString::from_words(&self.words[27..47]),
            serial: IdString::from_words(&self.words[10..20]),
            firmware: IdString::from_words(&self.words[23..27]),
        }
    }
}

/// Run the IDENTIFY handshake on one slot and classify what answers.
fn identify_slot<P: PortIo>(bus: &mut Bus<'_, P>, role: DriveRole) -> Result<(DeviceClass, IdentifyData)> {
    bus.select(role.select().bits());
    bus.set_lba28(0, 0);
    bus.command(ATA_CMD_IDENTIFY);
    bus.delay_400ns();

    // Floating bus: nothing attached
    if bus.status().is_empty() {
        return Err(DiskError::NoDevice);
    }
    bus.wait_bsy().map_err(|_| DiskError::NoDevice)?;

    let signature = (bus.read_reg(ATA_REG_LBA_MID), bus.read_reg(ATA_REG_LBA_HI));
    let class = if ATAPI_SIGNATURES.contains(&signature) {
        bus.command(ATA_CMD_IDENTIFY_PACKET);
        bus.delay_400ns();
        DeviceClass::Atapi
    } else if signature == (0, 0) {
        DeviceClass::Ata
    } else {
        klog_debug!("ata", "unknown signature {:02x}:{:02x}", signature.0, signature.1);
        return Err(DiskError::NoDevice);
    };

    bus.poll(true).map_err(|_| DiskError::NoDevice)?;

    let mut data = IdentifyData::zeroed();
    for word in data.words.iter_mut() {
        *word = bus.read_word();
    }
    Ok((class, data))
}

impl<P: PortIo> DeviceTable<P> {
    /// Identify one slot and record the result.
    ///
    /// Absent slots come back as `NoDevice`. Identifying an unchanged
    /// device again yields the same record.
    pub fn identify(&mut self, drive: u8) -> Result<DeviceInfo> {
        let slot = *self
            .devices
            .get(drive as usize)
            .ok_or(DiskError::InvalidParameter)?;
        let (channel, role) = (slot.channel, slot.role);

        let probed = identify_slot(&mut self.bus(channel), role);
        let (class, data) = match probed {
            Ok(found) => found,
            Err(e) => {
                self.devices[drive as usize] = DeviceInfo::absent(channel, role);
                return Err(e);
            }
        };

        let mut info = data.to_info(channel, role, class);
        self.devices[drive as usize] = info;

        if class == DeviceClass::Atapi && self.options.read_capacity {
            match self.atapi_read_capacity(drive) {
                Ok(sectors) => info.size = sectors,
                Err(e) => klog_warn!("atapi", "drive {}: READ CAPACITY failed: {}", drive, e),
            }
            self.devices[drive as usize] = info;
        }
        Ok(info)
    }
}
