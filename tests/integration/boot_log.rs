// tests/integration/boot_log.rs
// Kernel log records emitted while the storage stack comes up
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause
//
// Own test binary: the log ring is global, so no other test may log into it.

#[cfg(test)]
mod boot_log_tests {
    use integration_tests::{boot_disc, machine_with_disc};
    use kernel_fs::Storage;
    use kernel_log::{LogLevel, LogRecord, LoggerCallbacks, LOG_RING_SIZE};

    fn boot_clock() -> u64 {
        7
    }

    fn quiet(_msg: &str) {}

    fn records() -> Vec<LogRecord> {
        let mut out = [LogRecord::empty(); LOG_RING_SIZE];
        let n = kernel_log::read_records(&mut out);
        out[..n].to_vec()
    }

    fn find<'a>(records: &'a [LogRecord], subsystem: &str, text: &str) -> Option<&'a LogRecord> {
        records.iter().find(|r| r.subsystem == subsystem && r.message().contains(text))
    }

    #[test]
    fn test_bring_up_is_logged() {
        kernel_log::init(LoggerCallbacks::new(boot_clock, quiet));
        kernel_log::set_min_level(LogLevel::Info);

        let storage = Storage::bring_up(machine_with_disc(&boot_disc().build())).unwrap();
        assert_eq!(storage.vfs.mounts().len(), 1);

        let log = records();
        assert!(find(&log, "ata", "2 drive(s) detected").is_some());
        assert!(find(&log, "storage", "root filesystem on drive 2").is_some());
        let mounted = find(&log, "iso9660", "mounted 'OPTICAL_OS'").unwrap();
        assert_eq!(mounted.level, LogLevel::Info);
        assert_eq!(mounted.ts, 7);

        // Debug records were filtered out
        assert!(log.iter().all(|r| r.level >= LogLevel::Info));
        assert!(find(&log, "vfs", "registered filesystem").is_none());

        let seen = log.len();
        assert_eq!(kernel_log::ack_records(seen), Ok(()));
        assert!(records().is_empty());
    }
}
