// kernel/disk/src/port.rs
// Legacy I/O Port Access
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

/// Byte and word access to the x86 I/O port space.
///
/// The driver never touches ports directly; it goes through this trait so the
/// same protocol code runs against real hardware and against the simulated
/// controller used in tests.
pub trait PortIo {
    fn inb(&mut self, port: u16) -> u8;
    fn outb(&mut self, port: u16, value: u8);
    fn inw(&mut self, port: u16) -> u16;
    fn outw(&mut self, port: u16, value: u16);
}

/// Real port I/O through `in`/`out` instructions.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub struct X86Ports {
    _private: (),
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl X86Ports {
    /// # Safety
    ///
    /// The caller must run at an I/O privilege level that permits port
    /// access and must be the only owner of the ATA command blocks.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl PortIo for X86Ports {
    fn inb(&mut self, port: u16) -> u8 {
        let value: u8;
        // SAFETY: port access rights were asserted in `X86Ports::new`.
        unsafe {
            core::arch::asm!(
                "in al, dx",
                in("dx") port,
                out("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
        value
    }

    fn outb(&mut self, port: u16, value: u8) {
        // SAFETY: see `inb`.
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    fn inw(&mut self, port: u16) -> u16 {
        let value: u16;
        // SAFETY: see `inb`.
        unsafe {
            core::arch::asm!(
                "in ax, dx",
                in("dx") port,
                out("ax") value,
                options(nomem, nostack, preserves_flags)
            );
        }
        value
    }

    fn outw(&mut self, port: u16, value: u16) {
        // SAFETY: see `inb`.
        unsafe {
            core::arch::asm!(
                "out dx, ax",
                in("dx") port,
                in("ax") value,
                options(nomem, nostack, preserves_flags)
            );
        }
    }
}
