// kernel/disk/src/block_device.rs
// Device Records and the Device Table
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use core::fmt;

use kernel_log::{klog_info, klog_warn};

use crate::ata::{Bus, ATA_PRIMARY_CTRL, ATA_PRIMARY_IO, ATA_SECONDARY_CTRL, ATA_SECONDARY_IO};
use crate::config::{
    ProbeOptions, ATAPI_SECTOR_SIZE, ATA_SECTOR_SIZE, DRIVE_COUNT_QUERY, MAX_DRIVES,
};
use crate::port::PortIo;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiskError {
    NoDevice,
    Timeout,
    DriveFault,
    ReadError,
    WriteError,
    InvalidParameter,
}

impl DiskError {
    /// Integer code handed across the syscall boundary.
    pub const fn code(self) -> i32 {
        match self {
            DiskError::NoDevice => -1,
            DiskError::Timeout => -2,
            DiskError::DriveFault => -3,
            DiskError::ReadError => -4,
            DiskError::WriteError => -5,
            DiskError::InvalidParameter => -6,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(DiskError::NoDevice),
            -2 => Some(DiskError::Timeout),
            -3 => Some(DiskError::DriveFault),
            -4 => Some(DiskError::ReadError),
            -5 => Some(DiskError::WriteError),
            -6 => Some(DiskError::InvalidParameter),
            _ => None,
        }
    }
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DiskError::NoDevice => "no device",
            DiskError::Timeout => "timeout",
            DiskError::DriveFault => "drive fault",
            DiskError::ReadError => "read error",
            DiskError::WriteError => "write error",
            DiskError::InvalidParameter => "invalid parameter",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, DiskError>;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    Primary = 0,
    Secondary = 1,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Primary, Channel::Secondary];

    pub const fn base(self) -> u16 {
        match self {
            Channel::Primary => ATA_PRIMARY_IO,
            Channel::Secondary => ATA_SECONDARY_IO,
        }
    }

    pub const fn ctrl(self) -> u16 {
        match self {
            Channel::Primary => ATA_PRIMARY_CTRL,
            Channel::Secondary => ATA_SECONDARY_CTRL,
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DriveRole {
    Master = 0,
    Slave = 1,
}

impl DriveRole {
    pub const ALL: [DriveRole; 2] = [DriveRole::Master, DriveRole::Slave];
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceClass {
    None = 0,
    Ata = 1,
    Atapi = 2,
}

impl DeviceClass {
    pub const fn label(self) -> &'static str {
        match self {
            DeviceClass::None => "none",
            DeviceClass::Ata => "ATA",
            DeviceClass::Atapi => "ATAPI",
        }
    }
}

/// Drive number used throughout the driver: `channel * 2 + role`.
pub const fn drive_index(channel: Channel, role: DriveRole) -> u8 {
    (channel as u8) * 2 + role as u8
}

/// Fixed-capacity identification string, NUL padded.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct IdString<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> IdString<N> {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Unpack an IDENTIFY string: each word carries its first character in
    /// the high byte. Trailing spaces are dropped.
    pub fn from_words(words: &[u16]) -> Self {
        let mut out = Self::empty();
        for (i, &w) in words.iter().enumerate() {
            let at = i * 2;
            if at + 1 >= N {
                break;
            }
            out.bytes[at] = (w >> 8) as u8;
            out.bytes[at + 1] = (w & 0xFF) as u8;
            out.len = at + 2;
        }
        while out.len > 0 && matches!(out.bytes[out.len - 1], b' ' | 0) {
            out.len -= 1;
            out.bytes[out.len] = 0;
        }
        out
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// NUL-terminated copy as laid out for userspace.
    pub fn raw(&self) -> [u8; N] {
        self.bytes
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("<invalid>")
    }
}

impl<const N: usize> fmt::Debug for IdString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// One channel/drive slot as found at enumeration time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub present: bool,
    pub channel: Channel,
    pub role: DriveRole,
    pub class: DeviceClass,
    pub signature: u16,
    pub capabilities: u16,
    pub command_sets: u32,
    /// Capacity in native sectors (512 for ATA, 2048 for ATAPI).
    pub size: u32,
    pub model: IdString<41>,
    pub serial: IdString<21>,
    pub firmware: IdString<9>,
}

impl DeviceInfo {
    pub const fn absent(channel: Channel, role: DriveRole) -> Self {
        Self {
            present: false,
            channel,
            role,
            class: DeviceClass::None,
            signature: 0,
            capabilities: 0,
            command_sets: 0,
            size: 0,
            model: IdString::empty(),
            serial: IdString::empty(),
            firmware: IdString::empty(),
        }
    }

    pub const fn index(&self) -> u8 {
        drive_index(self.channel, self.role)
    }

    pub const fn sector_size(&self) -> usize {
        match self.class {
            DeviceClass::Atapi => ATAPI_SECTOR_SIZE,
            _ => ATA_SECTOR_SIZE,
        }
    }

    pub const fn capacity_mb(&self) -> u32 {
        match self.class {
            DeviceClass::Ata => self.size / 2048,
            DeviceClass::Atapi => self.size / 512,
            DeviceClass::None => 0,
        }
    }
}

/// Device record as copied out to userspace by the device-info syscall.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UserDeviceInfo {
    pub present: u8,
    pub channel: u8,
    pub drive: u8,
    pub kind: u8,
    pub size: u32,
    pub model: [u8; 41],
}

impl Default for UserDeviceInfo {
    fn default() -> Self {
        Self {
            present: 0,
            channel: 0,
            drive: 0,
            kind: 0,
            size: 0,
            model: [0; 41],
        }
    }
}

impl From<&DeviceInfo> for UserDeviceInfo {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            present: info.present as u8,
            channel: info.channel as u8,
            drive: info.role as u8,
            kind: info.class as u8,
            size: info.size,
            model: info.model.raw(),
        }
    }
}

/// Answer of the device-info query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceQuery {
    Count(u8),
    Device(UserDeviceInfo),
}

/// 2048-byte block reads from optical media.
///
/// This is the seam between the filesystem and the hardware driver.
pub trait SectorSource {
    /// Whether `drive` is present and speaks the packet protocol.
    fn is_optical(&self, drive: u8) -> bool;

    /// Read `count` blocks starting at `lba` into `buf`.
    fn read_blocks(&mut self, drive: u8, lba: u32, count: u8, buf: &mut [u8]) -> Result<()>;
}

/// All four channel/drive slots plus the port backend that reaches them.
pub struct DeviceTable<P: PortIo> {
    pub(crate) io: P,
    pub(crate) devices: [DeviceInfo; MAX_DRIVES],
    pub(crate) options: ProbeOptions,
}

impl<P: PortIo> DeviceTable<P> {
    /// Mask channel interrupts and identify every slot.
    pub fn init(io: P, options: ProbeOptions) -> Self {
        let mut table = Self::empty(io, options);
        table.mask_interrupts();

        for channel in Channel::ALL {
            for role in DriveRole::ALL {
                let drive = drive_index(channel, role);
                match table.identify(drive) {
                    Ok(info) => klog_info!(
                        "ata",
                        "drive {}: {} '{}' ({} sectors)",
                        drive,
                        info.class.label(),
                        info.model.as_str(),
                        info.size
                    ),
                    Err(DiskError::NoDevice) => {}
                    Err(e) => klog_warn!("ata", "drive {}: identify failed: {}", drive, e),
                }
            }
        }

        klog_info!("ata", "{} drive(s) detected", table.drive_count());
        table
    }

    /// Table with every slot absent; nothing is sent to the hardware.
    pub fn empty(io: P, options: ProbeOptions) -> Self {
        let devices = [
            DeviceInfo::absent(Channel::Primary, DriveRole::Master),
            DeviceInfo::absent(Channel::Primary, DriveRole::Slave),
            DeviceInfo::absent(Channel::Secondary, DriveRole::Master),
            DeviceInfo::absent(Channel::Secondary, DriveRole::Slave),
        ];
        Self {
            io,
            devices,
            options,
        }
    }

    pub fn options(&self) -> ProbeOptions {
        self.options
    }

    pub fn ports(&self) -> &P {
        &self.io
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.io
    }

    pub fn device(&self, drive: u8) -> Option<&DeviceInfo> {
        self.devices
            .get(drive as usize)
            .filter(|d| d.present)
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().filter(|d| d.present)
    }

    pub fn drive_count(&self) -> usize {
        self.devices().count()
    }

    /// First present ATAPI drive, if any.
    pub fn first_optical(&self) -> Option<u8> {
        self.devices()
            .find(|d| d.class == DeviceClass::Atapi)
            .map(DeviceInfo::index)
    }

    /// Device-info query: `0xFF` asks for the drive count.
    pub fn query(&self, drive: u8) -> Result<DeviceQuery> {
        if drive == DRIVE_COUNT_QUERY {
            return Ok(DeviceQuery::Count(self.drive_count() as u8));
        }
        self.device(drive)
            .map(|d| DeviceQuery::Device(UserDeviceInfo::from(d)))
            .ok_or(DiskError::NoDevice)
    }

    /// One log line per slot with class, model and capacity.
    pub fn log_summary(&self) {
        for (i, dev) in self.devices.iter().enumerate() {
            if !dev.present {
                klog_info!("ata", "drive {}: none", i);
                continue;
            }
            klog_info!(
                "ata",
                "drive {}: [{}] {} ({} MB)",
                i,
                dev.class.label(),
                dev.model.as_str(),
                dev.capacity_mb()
            );
        }
    }

    pub(crate) fn bus(&mut self, channel: Channel) -> Bus<'_, P> {
        Bus::new(&mut self.io, channel, self.options.timeout)
    }

    /// Look up a present drive of the given class.
    pub(crate) fn expect_class(&self, drive: u8, class: DeviceClass) -> Result<DeviceInfo> {
        let dev = self
            .devices
            .get(drive as usize)
            .ok_or(DiskError::InvalidParameter)?;
        if !dev.present {
            return Err(DiskError::NoDevice);
        }
        if dev.class != class {
            return Err(DiskError::InvalidParameter);
        }
        Ok(*dev)
    }
}

impl<P: PortIo> SectorSource for DeviceTable<P> {
    fn is_optical(&self, drive: u8) -> bool {
        self.device(drive)
            .is_some_and(|d| d.class == DeviceClass::Atapi)
    }

    fn read_blocks(&mut self, drive: u8, lba: u32, count: u8, buf: &mut [u8]) -> Result<()> {
        self.atapi_read(drive, lba, count, buf)
    }
}
