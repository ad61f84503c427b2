//! Package: shared
//! Copyright © 2025 Cartesian School. Developed by Siergej Sobolewski.
//! License: BSD-3-Clause
//!
//! Definitions shared by the kernel and user programs.

#![no_std]

pub mod syscall_numbers {
    include!("syscall_numbers.rs");
}

pub use syscall_numbers::*;
