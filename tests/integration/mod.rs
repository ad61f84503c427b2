// tests/integration/mod.rs
// Storage stack integration tests: simulated IDE controller -> device
// table -> ISO9660 -> VFS -> open-file table.
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

mod boot_volume;
mod device_faults;
mod extensions;
mod syscalls;
