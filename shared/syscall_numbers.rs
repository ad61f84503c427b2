// Package: shared
// Copyright © 2025 Cartesian School. Developed by Siergej Sobolewski.
// License: BSD-3-Clause
//
// Canonical system call numbers (INT 0x80, number in EAX, arguments in
// EBX/ECX/EDX). Single source of truth for the kernel and user programs.

// Process / console
pub const SYS_EXIT: usize = 0;
pub const SYS_WRITE: usize = 1;
pub const SYS_READ: usize = 2;

// Files
pub const SYS_FOPEN: usize = 3;
pub const SYS_FCLOSE: usize = 4;

pub const SYS_SLEEP: usize = 5;
pub const SYS_BEEP: usize = 6;
pub const SYS_GETCHAR: usize = 7;
pub const SYS_EXEC: usize = 8;

// Directories
pub const SYS_READDIR: usize = 9;

pub const SYS_CLEAR: usize = 10;
pub const SYS_SETCOLOR: usize = 11;

pub const SYS_FREAD: usize = 12;
pub const SYS_FSIZE: usize = 13;

// Storage devices
pub const SYS_IDEINFO: usize = 25;

pub const NUM_SYSCALLS: usize = 28;

/// Descriptors below this are the console.
pub const FIRST_FILE_FD: i32 = 3;

/// Minimum buffer size for SYS_READDIR names.
pub const READDIR_NAME_MAX: usize = 256;

/// SYS_IDEINFO drive argument that asks for the device count.
pub const IDEINFO_COUNT: u32 = 0xFF;
