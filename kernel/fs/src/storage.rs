// kernel/fs/src/storage.rs
// Storage bring-up: the single owner of devices, mounts and open files
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use disk::{DeviceClass, DeviceTable, PortIo, ProbeOptions, MAX_DRIVES};
use kernel_log::{klog_error, klog_info, klog_warn};

use crate::config::VfsOptions;
use crate::error::{FsError, Result};
use crate::iso9660::{self, FS_NAME};
use crate::kfile::OpenFileTable;
use crate::node::MountId;
use crate::vfs::Vfs;

/// Everything the storage stack needs, created once at boot and passed
/// down by reference.
pub struct Storage<P: PortIo> {
    pub devices: DeviceTable<P>,
    pub vfs: Vfs,
    pub files: OpenFileTable,
}

impl<P: PortIo> Storage<P> {
    /// Probe the IDE channels and mount the first optical volume as root.
    pub fn bring_up(ports: P) -> Result<Self> {
        Self::with_options(ports, ProbeOptions::default(), VfsOptions::default())
    }

    pub fn with_options(ports: P, probe: ProbeOptions, options: VfsOptions) -> Result<Self> {
        let devices = DeviceTable::init(ports, probe);
        devices.log_summary();

        let mut storage = Storage {
            devices,
            vfs: Vfs::new(options),
            files: OpenFileTable::new(),
        };
        storage.vfs.register(iso9660::driver())?;
        storage.mount_root()?;
        Ok(storage)
    }

    fn mount_root(&mut self) -> Result<MountId> {
        for drive in 0..MAX_DRIVES as u8 {
            let optical = self
                .devices
                .device(drive)
                .is_some_and(|d| d.class == DeviceClass::Atapi);
            if !optical {
                continue;
            }
            match self.vfs.mount(&mut self.devices, drive, FS_NAME) {
                Ok(id) => {
                    klog_info!("storage", "root filesystem on drive {}", drive);
                    return Ok(id);
                }
                Err(e) => klog_warn!("storage", "drive {} not mountable: {}", drive, e),
            }
        }
        klog_error!("storage", "no bootable optical volume found");
        Err(FsError::NotMounted)
    }

    /// Like [`Storage::bring_up`], but without a root filesystem there is
    /// nothing left to run, so the CPU is halted.
    pub fn bring_up_or_halt(ports: P) -> Self {
        match Self::bring_up(ports) {
            Ok(storage) => storage,
            Err(e) => {
                klog_error!("storage", "bring-up failed: {}, system halted", e);
                halt()
            }
        }
    }
}

fn halt() -> ! {
    loop {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            core::arch::asm!("cli; hlt", options(nomem, nostack));
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        core::hint::spin_loop();
    }
}
