// tests/integration/device_faults.rs
// Drive faults surfacing through the filesystem layer
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

#[cfg(test)]
mod device_faults_tests {
    use disk::sim::{Fault, SimController, SimDrive};
    use disk::{Channel, DiskError, DriveRole, ProbeOptions};
    use integration_tests::{boot_disc, machine_with_disc, manual_text};
    use kernel_fs::{FsError, Storage, VfsOptions};

    // Keeps the stuck-drive cases quick.
    fn probe() -> ProbeOptions {
        ProbeOptions::new().with_timeout(500)
    }

    fn booted() -> Storage<SimController> {
        Storage::with_options(machine_with_disc(&boot_disc().build()), probe(), VfsOptions::default()).unwrap()
    }

    #[test]
    fn test_no_optical_drive_means_no_root() {
        let mut sim = SimController::new();
        sim.attach(Channel::Primary, DriveRole::Master, SimDrive::ata("SIM HARDDISK", 2048));
        let result = Storage::with_options(sim, probe(), VfsOptions::default());
        assert!(matches!(result, Err(FsError::NotMounted)));
    }

    #[test]
    fn test_stuck_drive_is_skipped_at_probe() {
        let mut sim = machine_with_disc(&boot_disc().build());
        sim.set_fault(Channel::Secondary, DriveRole::Master, Fault::StuckBusy);
        let result = Storage::with_options(sim, probe(), VfsOptions::default());
        assert!(matches!(result, Err(FsError::NotMounted)));
    }

    #[test]
    fn test_unformatted_disc_is_not_mounted() {
        let blank = vec![0u8; 2048 * 20];
        let result = Storage::with_options(machine_with_disc(&blank), probe(), VfsOptions::default());
        assert!(matches!(result, Err(FsError::NotMounted)));
    }

    #[test]
    fn test_falls_back_to_next_drive() {
        let blank = vec![0u8; 2048 * 20];
        let mut sim = machine_with_disc(&blank);
        sim.attach(Channel::Secondary, DriveRole::Slave, SimDrive::atapi("SIM CD-RW", &boot_disc().build()));
        let storage = Storage::with_options(sim, probe(), VfsOptions::default()).unwrap();
        assert_eq!(storage.vfs.mounts().get(0).unwrap().drive, 3);
    }

    #[test]
    fn test_slow_drive_within_budget_still_boots() {
        let mut sim = machine_with_disc(&boot_disc().build());
        sim.set_busy_cycles(100);
        let mut storage = Storage::with_options(sim, probe(), VfsOptions::default()).unwrap();
        let Storage { devices, vfs, .. } = &mut storage;
        let h = vfs.namei(devices, "/docs/manual.txt").unwrap();
        let mut buf = [0u8; 10];
        assert_eq!(vfs.read(devices, h, 4990, &mut buf), Ok(10));
    }

    #[test]
    fn test_busy_longer_than_budget_times_out() {
        let mut sim = machine_with_disc(&boot_disc().build());
        sim.set_busy_cycles(10_000);
        let result = Storage::with_options(sim, probe(), VfsOptions::default());
        assert!(matches!(result, Err(FsError::NotMounted)));
    }

    #[test]
    fn test_timeout_reaches_reader() {
        let mut storage = booted();
        let Storage { devices, vfs, .. } = &mut storage;
        let manual = vfs.namei(devices, "/docs/manual.txt").unwrap();

        devices.ports_mut().set_fault(Channel::Secondary, DriveRole::Master, Fault::StuckBusy);
        let mut buf = [0u8; 64];
        assert_eq!(vfs.read(devices, manual, 0, &mut buf), Err(FsError::IoError(DiskError::Timeout)));
        assert_eq!(vfs.namei(devices, "/bin/hello"), Err(FsError::IoError(DiskError::Timeout)));

        // Root resolution never touches the drive
        assert!(vfs.namei(devices, "/").is_ok());
    }

    #[test]
    fn test_error_and_fault_status_are_distinguished() {
        let mut storage = booted();
        let Storage { devices, vfs, .. } = &mut storage;
        let manual = vfs.namei(devices, "/docs/manual.txt").unwrap();
        let mut buf = [0u8; 64];

        devices.ports_mut().set_fault(Channel::Secondary, DriveRole::Master, Fault::Error);
        assert_eq!(vfs.read(devices, manual, 0, &mut buf), Err(FsError::IoError(DiskError::ReadError)));

        devices.ports_mut().set_fault(Channel::Secondary, DriveRole::Master, Fault::DriveFault);
        assert_eq!(vfs.read(devices, manual, 0, &mut buf), Err(FsError::IoError(DiskError::DriveFault)));

        // Drive recovers, reads work again
        devices.ports_mut().set_fault(Channel::Secondary, DriveRole::Master, Fault::None);
        assert_eq!(vfs.read(devices, manual, 0, &mut buf), Ok(64));
        assert_eq!(buf[..], manual_text()[..64]);
    }

    #[test]
    fn test_ejected_media_fails_reads() {
        let mut storage = booted();
        let Storage { devices, vfs, .. } = &mut storage;
        let manual = vfs.namei(devices, "/docs/manual.txt").unwrap();

        devices.atapi_eject(2).unwrap();
        assert!(devices.ports().ejected(Channel::Secondary, DriveRole::Master));
        let mut buf = [0u8; 16];
        assert_eq!(vfs.read(devices, manual, 0, &mut buf), Err(FsError::IoError(DiskError::ReadError)));
    }

    #[test]
    fn test_failed_read_keeps_descriptor_usable() {
        let mut storage = booted();
        let Storage { devices, vfs, files } = &mut storage;
        let fd = files.open(vfs, devices, "/docs/manual.txt", kernel_fs::KfOpenFlags::READ).unwrap();

        devices.ports_mut().set_fault(Channel::Secondary, DriveRole::Master, Fault::Error);
        let mut buf = [0u8; 100];
        assert!(files.read(vfs, devices, fd, &mut buf).is_err());

        devices.ports_mut().set_fault(Channel::Secondary, DriveRole::Master, Fault::None);
        assert_eq!(files.read(vfs, devices, fd, &mut buf), Ok(100));
        assert_eq!(buf[..], manual_text()[..100]);
        assert_eq!(files.close(fd), Ok(()));
    }
}
