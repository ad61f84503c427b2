// kernel/disk/src/config.rs
// Driver Tunables
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

/// Iteration budget for every status polling loop.
pub const ATA_TIMEOUT: u32 = 5000;

/// Two channels times master/slave.
pub const MAX_DRIVES: usize = 4;

pub const ATA_SECTOR_SIZE: usize = 512;
pub const ATAPI_SECTOR_SIZE: usize = 2048;

/// IDENTIFY (PACKET) DEVICE response length in 16-bit words.
pub const IDENTIFY_WORDS: usize = 256;

/// Highest address reachable with 28-bit LBA.
pub const LBA28_MAX: u32 = 0x0FFF_FFFF;

/// Drive index that asks the device-info query for the drive count.
pub const DRIVE_COUNT_QUERY: u8 = 0xFF;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Polling iterations before a wait gives up with `Timeout`.
    pub timeout: u32,
    /// Issue READ CAPACITY to ATAPI drives during identification.
    pub read_capacity: bool,
}

impl ProbeOptions {
    pub const fn new() -> Self {
        Self {
            timeout: ATA_TIMEOUT,
            read_capacity: true,
        }
    }

    pub const fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self::new()
    }
}
