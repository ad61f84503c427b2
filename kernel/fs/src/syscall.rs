// kernel/fs/src/syscall.rs
// Filesystem and storage system calls
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use disk::{DeviceQuery, PortIo, UserDeviceInfo};
use kernel_log::klog_trace;
use shared::{SYS_FCLOSE, SYS_FOPEN, SYS_FREAD, SYS_FSIZE, SYS_IDEINFO, SYS_READDIR};

use crate::kfile::{self, KfOpenFlags};
use crate::storage::Storage;

/// Value returned to user space for any failure.
pub const SYSCALL_ERROR: i32 = -1;

/// A storage system call with its arguments already copied in from user
/// space.
pub enum FsCall<'a> {
    Open { path: &'a str },
    Close { fd: i32 },
    ReadDir { path: &'a str, index: u32, out: &'a mut [u8] },
    Read { fd: i32, buf: &'a mut [u8] },
    Size { fd: i32 },
    DeviceInfo { drive: u32, out: &'a mut UserDeviceInfo },
}

impl FsCall<'_> {
    pub fn number(&self) -> usize {
        match self {
            FsCall::Open { .. } => SYS_FOPEN,
            FsCall::Close { .. } => SYS_FCLOSE,
            FsCall::ReadDir { .. } => SYS_READDIR,
            FsCall::Read { .. } => SYS_FREAD,
            FsCall::Size { .. } => SYS_FSIZE,
            FsCall::DeviceInfo { .. } => SYS_IDEINFO,
        }
    }
}

impl<P: PortIo> Storage<P> {
    /// Run one call. Successful results are non-negative; every error is
    /// reported as [`SYSCALL_ERROR`].
    pub fn dispatch(&mut self, call: FsCall<'_>) -> i32 {
        klog_trace!("vfs", "syscall {}", call.number());
        let Storage { devices, vfs, files } = self;

        let result = match call {
            FsCall::Open { path } => files.open(vfs, devices, path, KfOpenFlags::READ),
            FsCall::Close { fd } => files.close(fd).map(|_| 0),
            FsCall::ReadDir { path, index, out } => kfile::read_dir_entry(vfs, devices, path, index, out),
            FsCall::Read { fd, buf } => files
                .read(vfs, devices, fd, buf)
                .map(|n| i32::try_from(n).unwrap_or(i32::MAX)),
            FsCall::Size { fd } => files.size(fd).map(|n| i32::try_from(n).unwrap_or(i32::MAX)),
            FsCall::DeviceInfo { drive, out } => {
                let Ok(drive) = u8::try_from(drive) else {
                    return SYSCALL_ERROR;
                };
                return match devices.query(drive) {
                    Ok(DeviceQuery::Count(n)) => n as i32,
                    Ok(DeviceQuery::Device(info)) => {
                        *out = info;
                        0
                    }
                    Err(_) => SYSCALL_ERROR,
                };
            }
        };
        result.unwrap_or(SYSCALL_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Entry, IsoBuilder};
    use disk::sim::{SimController, SimDrive};
    use disk::{Channel, DeviceClass, DriveRole};
    use shared::IDEINFO_COUNT;

    fn storage() -> Storage<SimController> {
        let image = IsoBuilder::new("SYSCALLS")
            .add(Entry::file("MOTD.TXT;1", "motd.txt", b"welcome"))
            .add(Entry::dir("APPS", "apps", alloc::vec![]))
            .build();
        let mut sim = SimController::new();
        sim.attach(Channel::Secondary, DriveRole::Slave, SimDrive::atapi("SIM DVD-ROM", &image));
        Storage::bring_up(sim).unwrap()
    }

    #[test]
    fn test_call_numbers() {
        assert_eq!(FsCall::Open { path: "/" }.number(), 3);
        assert_eq!(FsCall::Close { fd: 3 }.number(), 4);
        assert_eq!(FsCall::Size { fd: 3 }.number(), 13);
    }

    #[test]
    fn test_file_calls() {
        let mut s = storage();
        let fd = s.dispatch(FsCall::Open { path: "/motd.txt" });
        assert_eq!(fd, 3);
        assert_eq!(s.dispatch(FsCall::Size { fd }), 7);

        let mut buf = [0u8; 16];
        assert_eq!(s.dispatch(FsCall::Read { fd, buf: &mut buf }), 7);
        assert_eq!(&buf[..7], b"welcome");
        assert_eq!(s.dispatch(FsCall::Close { fd }), 0);
        assert_eq!(s.dispatch(FsCall::Close { fd }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::Open { path: "/apps" }), SYSCALL_ERROR);
    }

    #[test]
    fn test_readdir_call() {
        let mut s = storage();
        let mut name = [0u8; 256];
        assert_eq!(s.dispatch(FsCall::ReadDir { path: "/", index: 1, out: &mut name }), 1);
        assert_eq!(&name[..5], b"apps\0");
        assert_eq!(s.dispatch(FsCall::ReadDir { path: "/", index: 2, out: &mut name }), 0);
        assert_eq!(s.dispatch(FsCall::ReadDir { path: "/motd.txt", index: 0, out: &mut name }), SYSCALL_ERROR);
    }

    #[test]
    fn test_device_info_call() {
        let mut s = storage();
        let mut info = UserDeviceInfo::default();
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: IDEINFO_COUNT, out: &mut info }), 1);
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 3, out: &mut info }), 0);
        assert_eq!(info.present, 1);
        assert_eq!(info.kind, DeviceClass::Atapi as u8);
        assert_eq!((info.channel, info.drive), (1, 1));
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 0, out: &mut info }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 7, out: &mut info }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 0x1FF, out: &mut info }), SYSCALL_ERROR);
    }
}
