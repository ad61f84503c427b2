// kernel/disk/src/lib.rs
// Legacy IDE Storage Driver (ATA disks and ATAPI optical drives)
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

#![cfg_attr(not(test), no_std)]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

pub mod ata;
pub mod atapi;
pub mod block_device;
pub mod config;
pub mod identify;
pub mod port;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use ata::{Control, DriveSelect, Status};
pub use atapi::Cdb;
pub use block_device::*;
pub use config::*;
pub use identify::IdentifyData;
pub use port::PortIo;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use port::X86Ports;

/// Probe both legacy channels and log what was found.
pub fn init<P: PortIo>(io: P) -> DeviceTable<P> {
    let table = DeviceTable::init(io, ProbeOptions::default());
    table.log_summary();
    table
}
