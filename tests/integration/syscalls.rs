// tests/integration/syscalls.rs
// File and device system calls against a booted storage stack
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

#[cfg(test)]
mod syscalls_tests {
    use disk::sim::SimController;
    use disk::{DeviceClass, UserDeviceInfo};
    use integration_tests::{boot_disc, machine_with_disc, manual_text, HELLO_ELF};
    use kernel_fs::{FsCall, Storage, MAX_OPEN_FILES, SYSCALL_ERROR};
    use shared::{FIRST_FILE_FD, IDEINFO_COUNT, READDIR_NAME_MAX};

    fn booted() -> Storage<SimController> {
        Storage::bring_up(machine_with_disc(&boot_disc().build())).unwrap()
    }

    fn c_str(buf: &[u8]) -> &str {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        std::str::from_utf8(&buf[..end]).unwrap()
    }

    #[test]
    fn test_open_read_size_close() {
        let mut s = booted();
        let fd = s.dispatch(FsCall::Open { path: "/bin/hello" });
        assert_eq!(fd, FIRST_FILE_FD);
        assert_eq!(s.dispatch(FsCall::Size { fd }), HELLO_ELF.len() as i32);

        let mut buf = [0u8; 8];
        assert_eq!(s.dispatch(FsCall::Read { fd, buf: &mut buf }), 8);
        assert_eq!(&buf, &HELLO_ELF[..8]);

        // The cursor moved on
        let mut rest = [0u8; 64];
        let n = s.dispatch(FsCall::Read { fd, buf: &mut rest });
        assert_eq!(n as usize, HELLO_ELF.len() - 8);
        assert_eq!(&rest[..n as usize], &HELLO_ELF[8..]);
        assert_eq!(s.dispatch(FsCall::Read { fd, buf: &mut rest }), 0);

        assert_eq!(s.dispatch(FsCall::Close { fd }), 0);
        assert_eq!(s.dispatch(FsCall::Size { fd }), SYSCALL_ERROR);
    }

    #[test]
    fn test_sequential_reads_of_large_file() {
        let mut s = booted();
        let fd = s.dispatch(FsCall::Open { path: "/docs/manual.txt" });
        let mut collected = Vec::new();
        let mut chunk = [0u8; 700];
        loop {
            let n = s.dispatch(FsCall::Read { fd, buf: &mut chunk });
            assert!(n >= 0);
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&chunk[..n as usize]);
        }
        assert_eq!(collected, manual_text());
    }

    #[test]
    fn test_open_failures() {
        let mut s = booted();
        assert_eq!(s.dispatch(FsCall::Open { path: "/nope" }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::Open { path: "/bin" }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::Open { path: "/readme.txt/x" }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::Close { fd: 0 }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::Read { fd: 42, buf: &mut [0u8; 4] }), SYSCALL_ERROR);
        assert_eq!(s.files.open_count(), 0);
    }

    #[test]
    fn test_descriptor_table_fills_and_recycles() {
        let mut s = booted();
        let fds: Vec<i32> = (0..MAX_OPEN_FILES)
            .map(|_| s.dispatch(FsCall::Open { path: "/readme.txt" }))
            .collect();
        assert!(fds.iter().all(|&fd| fd >= FIRST_FILE_FD));
        assert_eq!(s.dispatch(FsCall::Open { path: "/readme.txt" }), SYSCALL_ERROR);

        assert_eq!(s.dispatch(FsCall::Close { fd: fds[5] }), 0);
        assert_eq!(s.dispatch(FsCall::Open { path: "/bin/shell" }), fds[5]);
        assert_eq!(s.files.open_count(), MAX_OPEN_FILES);
    }

    #[test]
    fn test_readdir_copies_names() {
        let mut s = booted();
        let mut out = [0xAAu8; READDIR_NAME_MAX];
        let mut names = Vec::new();
        for index in 0.. {
            match s.dispatch(FsCall::ReadDir { path: "/bin", index, out: &mut out }) {
                1 => names.push(c_str(&out).to_string()),
                0 => break,
                other => panic!("unexpected readdir result {}", other),
            }
        }
        assert_eq!(names, ["hello", "shell"]);

        assert_eq!(s.dispatch(FsCall::ReadDir { path: "/", index: 2, out: &mut out }), 1);
        assert_eq!(c_str(&out), "readme.txt");
        assert_eq!(s.dispatch(FsCall::ReadDir { path: "/", index: 3, out: &mut out }), 0);
        assert_eq!(s.dispatch(FsCall::ReadDir { path: "/readme.txt", index: 0, out: &mut out }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::ReadDir { path: "/gone", index: 0, out: &mut out }), SYSCALL_ERROR);

        // Short buffers get a truncated, terminated name
        let mut short = [0xAAu8; 4];
        assert_eq!(s.dispatch(FsCall::ReadDir { path: "/", index: 2, out: &mut short }), 1);
        assert_eq!(&short, b"rea\0");
    }

    #[test]
    fn test_device_info() {
        let mut s = booted();
        let mut info = UserDeviceInfo::default();
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: IDEINFO_COUNT, out: &mut info }), 2);

        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 2, out: &mut info }), 0);
        assert_eq!(info.present, 1);
        assert_eq!(info.channel, 1);
        assert_eq!(info.drive, 0);
        assert_eq!(info.kind, DeviceClass::Atapi as u8);
        assert_eq!(c_str(&info.model), "SIM DVD-ROM");

        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 0, out: &mut info }), 0);
        assert_eq!(info.kind, DeviceClass::Ata as u8);
        assert_eq!(info.size, 2048);

        let mut untouched = UserDeviceInfo::default();
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 1, out: &mut untouched }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 7, out: &mut untouched }), SYSCALL_ERROR);
        assert_eq!(s.dispatch(FsCall::DeviceInfo { drive: 0x1FF, out: &mut untouched }), SYSCALL_ERROR);
        assert_eq!(untouched.present, 0);
    }
}
