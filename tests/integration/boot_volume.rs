// tests/integration/boot_volume.rs
// Bring-up from a simulated IDE controller and file access on the root volume
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

#[cfg(test)]
mod boot_volume_tests {
    use disk::sim::{SimController, SimDrive};
    use disk::{Channel, DeviceClass, DriveRole};
    use integration_tests::{boot_disc, machine_with_disc, manual_text, HELLO_ELF};
    use kernel_fs::testing::{Entry, IsoBuilder};
    use kernel_fs::{read_file, FsError, NodeHandle, NodeKind, Storage};

    fn booted() -> Storage<SimController> {
        Storage::bring_up(machine_with_disc(&boot_disc().build())).unwrap()
    }

    #[test]
    fn test_root_is_mounted_from_cd_drive() {
        let storage = booted();
        assert_eq!(storage.devices.drive_count(), 2);
        assert_eq!(storage.devices.device(0).unwrap().class, DeviceClass::Ata);
        assert_eq!(storage.devices.first_optical(), Some(2));

        assert_eq!(storage.vfs.root(), Ok(NodeHandle::Root(0)));
        let mount = storage.vfs.mounts().get(0).unwrap();
        assert_eq!(mount.drive, 2);
        assert_eq!(mount.fs_name, "iso9660");
        let iso = mount.volume.as_iso9660().unwrap();
        assert_eq!(iso.label(), "OPTICAL_OS");
        assert_eq!(iso.block_size(), 2048);
        assert!(!iso.has_joliet());
        assert!(!iso.has_rock_ridge());
    }

    #[test]
    fn test_root_listing() {
        let mut storage = booted();
        let Storage { devices, vfs, .. } = &mut storage;
        let root = vfs.root().unwrap();

        let mut names = Vec::new();
        let mut index = 0;
        while let Some(entry) = vfs.readdir(devices, root, index).unwrap() {
            names.push(entry.name.as_str().to_string());
            index += 1;
        }
        assert_eq!(names, ["bin", "docs", "readme.txt"]);
    }

    #[test]
    fn test_lookup_and_read_program() {
        let mut storage = booted();
        let Storage { devices, vfs, .. } = &mut storage;

        let bin = vfs.namei(devices, "/bin").unwrap();
        assert_eq!(vfs.node(bin).unwrap().kind, NodeKind::Directory);

        let hello = vfs.namei(devices, "/BIN/Hello").unwrap();
        let node = vfs.node(hello).unwrap();
        assert_eq!(node.kind, NodeKind::File);
        assert_eq!(node.length as usize, HELLO_ELF.len());
        assert_eq!(node.mount, 0);

        let mut image = [0u8; 256];
        let n = read_file(vfs, devices, "/bin/hello", &mut image).unwrap();
        assert_eq!(&image[..n], HELLO_ELF);

        let mut tiny = [0u8; 4];
        assert_eq!(read_file(vfs, devices, "/bin/hello", &mut tiny), Err(FsError::NoSpace));
        assert_eq!(read_file(vfs, devices, "/bin", &mut image), Err(FsError::IsDirectory));
    }

    #[test]
    fn test_reads_across_sector_boundaries() {
        let mut storage = booted();
        let Storage { devices, vfs, .. } = &mut storage;
        let manual = manual_text();
        let h = vfs.namei(devices, "/docs/manual.txt").unwrap();
        assert_eq!(vfs.node(h).unwrap().length, 5000);

        // Straddles the first and second sector
        let mut buf = [0u8; 100];
        assert_eq!(vfs.read(devices, h, 2000, &mut buf), Ok(100));
        assert_eq!(buf[..], manual[2000..2100]);

        // Covers all three sectors
        let mut whole = vec![0u8; 6000];
        assert_eq!(vfs.read(devices, h, 0, &mut whole), Ok(5000));
        assert_eq!(whole[..5000], manual[..]);

        // Clamped at end of file, nothing past it
        assert_eq!(vfs.read(devices, h, 4990, &mut buf), Ok(10));
        assert_eq!(buf[..10], manual[4990..]);
        assert_eq!(vfs.read(devices, h, 5000, &mut buf), Ok(0));
        assert_eq!(vfs.read(devices, h, 9000, &mut buf), Ok(0));
    }

    #[test]
    fn test_lookup_failures() {
        let mut storage = booted();
        let Storage { devices, vfs, .. } = &mut storage;
        assert_eq!(vfs.namei(devices, "/bin/missing"), Err(FsError::NotFound));
        assert_eq!(vfs.namei(devices, "/readme.txt/more"), Err(FsError::NotFound));
        let readme = vfs.namei(devices, "/readme.txt").unwrap();
        assert_eq!(vfs.finddir(devices, readme, "more"), Err(FsError::NotDirectory));
        assert_eq!(vfs.readdir(devices, readme, 0), Err(FsError::NotDirectory));
        assert_eq!(vfs.write(readme, 0, b"x"), Err(FsError::InvalidArgument));
    }

    #[test]
    fn test_first_optical_drive_wins() {
        let spare = IsoBuilder::new("SPARE")
            .add(Entry::file("NOTES.TXT;1", "notes.txt", b"spare disc"))
            .build();
        let mut sim = machine_with_disc(&boot_disc().build());
        sim.attach(Channel::Secondary, DriveRole::Slave, SimDrive::atapi("SIM CD-RW", &spare));
        let mut storage = Storage::bring_up(sim).unwrap();
        let Storage { devices, vfs, .. } = &mut storage;

        assert_eq!(vfs.mounts().len(), 1);
        assert_eq!(vfs.mounts().get(0).unwrap().drive, 2);

        // A later mount does not take over the root
        let id = vfs.mount(devices, 3, "iso9660").unwrap();
        assert_eq!(id, 1);
        assert_eq!(vfs.root(), Ok(NodeHandle::Root(0)));
        assert_eq!(vfs.volume(id).unwrap().as_iso9660().unwrap().label(), "SPARE");
        assert!(vfs.namei(devices, "/notes.txt").is_err());

        // Mounting the hard disk is refused
        assert_eq!(vfs.mount(devices, 0, "iso9660"), Err(FsError::InvalidArgument));
    }

    #[test]
    fn test_second_volume_reached_through_mountpoint() {
        let spare = IsoBuilder::new("SPARE")
            .add(Entry::file("NOTES.TXT;1", "notes.txt", b"spare disc"))
            .build();
        let mut sim = machine_with_disc(&boot_disc().build());
        sim.attach(Channel::Secondary, DriveRole::Slave, SimDrive::atapi("SIM CD-RW", &spare));
        let mut storage = Storage::bring_up(sim).unwrap();
        let Storage { devices, vfs, .. } = &mut storage;

        let id = vfs.mount(devices, 3, "iso9660").unwrap();
        vfs.set_mountpoint(devices, "/docs", id).unwrap();

        let notes = vfs.namei(devices, "/docs/notes.txt").unwrap();
        assert_eq!(vfs.node(notes).unwrap().mount, id);
        let mut buf = [0u8; 32];
        let n = vfs.read(devices, notes, 0, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"spare disc");

        // The covered directory's own entries are hidden
        assert_eq!(vfs.namei(devices, "/docs/manual.txt"), Err(FsError::NotFound));
    }

    #[test]
    fn test_identify_is_stable_after_boot() {
        let mut storage = booted();
        let before = *storage.devices.device(2).unwrap();
        let again = storage.devices.identify(2).unwrap();
        assert_eq!(before, again);
        assert_eq!(again.model.as_str(), "SIM DVD-ROM");
    }
}
