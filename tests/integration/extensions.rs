// tests/integration/extensions.rs
// Joliet and Rock Ridge names read through the ATAPI driver
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

#[cfg(test)]
mod extensions_tests {
    use disk::sim::SimController;
    use integration_tests::{boot_disc, machine_with_disc, manual_text, HELLO_ELF};
    use kernel_fs::testing::{Entry, IsoBuilder};
    use kernel_fs::{read_file, FsError, NodeHandle, Storage};

    fn boot(image: &[u8]) -> Storage<SimController> {
        Storage::bring_up(machine_with_disc(image)).unwrap()
    }

    fn list(storage: &mut Storage<SimController>, path: &str) -> Vec<String> {
        let Storage { devices, vfs, .. } = storage;
        let dir = vfs.namei(devices, path).unwrap();
        let mut names = Vec::new();
        let mut index = 0;
        while let Some(entry) = vfs.readdir(devices, dir, index).unwrap() {
            names.push(entry.name.as_str().to_string());
            index += 1;
        }
        names
    }

    #[test]
    fn test_joliet_keeps_case_and_long_names() {
        let mut storage = boot(&boot_disc().joliet(true).build());
        let iso = storage.vfs.volume(0).unwrap().as_iso9660().unwrap();
        assert!(iso.has_joliet());
        assert!(!iso.has_rock_ridge());

        assert_eq!(list(&mut storage, "/"), ["bin", "docs", "README.txt"]);
        assert_eq!(list(&mut storage, "/docs"), ["User Manual.txt"]);

        let Storage { devices, vfs, .. } = &mut storage;
        let h = vfs.namei(devices, "/docs/user manual.TXT").unwrap();
        assert_eq!(vfs.node(h).unwrap().name.as_str(), "User Manual.txt");

        let mut buf = vec![0u8; 8192];
        let n = read_file(vfs, devices, "/docs/User Manual.txt", &mut buf).unwrap();
        assert_eq!(buf[..n], manual_text()[..]);

        // The 8.3 names are not visible through the Joliet tree
        assert_eq!(vfs.namei(devices, "/docs/manual.txt"), Err(FsError::NotFound));
    }

    #[test]
    fn test_joliet_replaces_non_ascii() {
        let image = IsoBuilder::new("UNICODE")
            .joliet(true)
            .add(Entry::file("CAFE.TXT;1", "café.txt", b"coffee"))
            .build();
        let mut storage = boot(&image);
        assert_eq!(list(&mut storage, "/"), ["caf_.txt"]);

        let Storage { devices, vfs, .. } = &mut storage;
        let mut buf = [0u8; 16];
        let n = read_file(vfs, devices, "/caf_.txt", &mut buf).unwrap();
        assert_eq!(&buf[..n], b"coffee");
    }

    #[test]
    fn test_rock_ridge_on_primary_tree() {
        let mut storage = boot(&boot_disc().rock_ridge(true).build());
        let iso = storage.vfs.volume(0).unwrap().as_iso9660().unwrap();
        assert!(iso.has_rock_ridge());
        assert!(!iso.has_joliet());
        assert_eq!(iso.rock_ridge_skip(), Some(0));

        assert_eq!(list(&mut storage, "/"), ["bin", "docs", "README.txt"]);

        let Storage { devices, vfs, .. } = &mut storage;
        let mut buf = [0u8; 256];
        let n = read_file(vfs, devices, "/bin/hello", &mut buf).unwrap();
        assert_eq!(&buf[..n], HELLO_ELF);
    }

    #[test]
    fn test_rock_ridge_beats_joliet() {
        let image = IsoBuilder::new("BOTH")
            .joliet(true)
            .rock_ridge(true)
            .add(Entry::file("SCRIPT.SH;1", "script.sh", b"#!/bin/sh\n").rock_ridge_name("install-script.sh"))
            .add(Entry::file("NOTES.TXT;1", "Notes.txt", b"notes"))
            .build();
        let mut storage = boot(&image);
        assert_eq!(list(&mut storage, "/"), ["install-script.sh", "Notes.txt"]);

        let Storage { devices, vfs, .. } = &mut storage;
        assert!(vfs.namei(devices, "/install-script.sh").is_ok());
        assert_eq!(vfs.namei(devices, "/script.sh"), Err(FsError::NotFound));
    }

    #[test]
    fn test_rock_ridge_with_skip_and_continuation() {
        let image = boot_disc().rock_ridge(true).susp_skip(4).continuation(true).build();
        let mut storage = boot(&image);
        let iso = storage.vfs.volume(0).unwrap().as_iso9660().unwrap();
        assert_eq!(iso.rock_ridge_skip(), Some(4));

        // Each name was split between the record and a CE area
        assert_eq!(list(&mut storage, "/docs"), ["User Manual.txt"]);
        assert_eq!(list(&mut storage, "/bin"), ["hello", "shell"]);

        let Storage { devices, vfs, .. } = &mut storage;
        let h = vfs.namei(devices, "/docs/User Manual.txt").unwrap();
        assert_eq!(vfs.node(h).unwrap().length, 5000);
    }

    #[test]
    fn test_directory_larger_than_one_sector() {
        let mut entries = Vec::new();
        for i in 0..90 {
            let iso = format!("FILE{:03}.TXT;1", i);
            let long = format!("file number {}.txt", i);
            entries.push(Entry::file(&iso, &long, format!("body {}", i).as_bytes()));
        }
        let mut builder = IsoBuilder::new("BIGDIR").joliet(true);
        builder = builder.add(Entry::dir("MANY", "many", entries));
        let mut storage = boot(&builder.build());

        let names = list(&mut storage, "/many");
        assert_eq!(names.len(), 90);
        assert_eq!(names[0], "file number 0.txt");
        assert_eq!(names[89], "file number 89.txt");

        let Storage { devices, vfs, .. } = &mut storage;
        let mut buf = [0u8; 32];
        let n = read_file(vfs, devices, "/many/FILE NUMBER 77.TXT", &mut buf).unwrap();
        assert_eq!(&buf[..n], b"body 77");
        assert!(vfs.root().is_ok_and(|r| r == NodeHandle::Root(0)));
    }
}
