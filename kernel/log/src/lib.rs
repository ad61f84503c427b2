// kernel/log/src/lib.rs
// Kernel Logging Facility
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::fmt::Write;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use spin::Mutex;

// Recursion protection: the storage stack is single-threaded, one flag is enough
static LOGGING_ACTIVE: AtomicBool = AtomicBool::new(false);

// Tunables
pub const LOG_RING_SIZE: usize = 256;
pub const LOG_MSG_MAX: usize = 160;
pub const LOG_SUBSYS_MAX: usize = 16;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone)]
pub struct LogRecord {
    pub ts: u64,
    pub level: LogLevel,
    pub subsystem: &'static str,
    pub msg: [u8; LOG_MSG_MAX],
    pub len: u16,
}

impl LogRecord {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            ts: 0,
            level: LogLevel::Info,
            subsystem: "",
            msg: [0; LOG_MSG_MAX],
            len: 0,
        }
    }

    /// Message text; records are built from `fmt::Write` so this is UTF-8
    /// up to a possibly cut trailing character.
    #[must_use]
    pub fn message(&self) -> &str {
        let bytes = &self.msg[..self.len as usize];
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

#[derive(Copy, Clone)]
pub struct LoggerCallbacks {
    pub timestamp: fn() -> u64,
    pub early_print: fn(&str),
}

impl LoggerCallbacks {
    pub const fn new(timestamp: fn() -> u64, early_print: fn(&str)) -> Self {
        Self {
            timestamp,
            early_print,
        }
    }

    #[must_use]
    pub const fn default() -> Self {
        Self {
            timestamp: default_timestamp,
            early_print: default_early_print,
        }
    }
}

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn default_timestamp() -> u64 {
    FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub fn default_early_print(msg: &str) {
    log_backend::write_bytes(msg.as_bytes());
    log_backend::write_bytes(b"\n");
}

// --------------------------------------------------------------------------
// Logger backends: serial + in-memory byte ring + external sink
// --------------------------------------------------------------------------

pub mod log_backend {
    use core::sync::atomic::{AtomicBool, Ordering};
    use spin::Mutex;

    use crate::Ring;

    const MEM_RING_SIZE: usize = 4096;
    const COM1: u16 = 0x3F8;

    // Serial stays off until the kernel has a console port; host tests never enable it.
    static SERIAL_ENABLED: AtomicBool = AtomicBool::new(false);

    type ExternalSinkFn = fn(&[u8]);
    static EXTERNAL_SINK: Mutex<Option<ExternalSinkFn>> = Mutex::new(None);

    static MEM_RING: Mutex<Ring<u8, MEM_RING_SIZE>> = Mutex::new(Ring::new(0));

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    fn serial_write(data: &[u8]) {
        for &byte in data {
            // Line status register bit 5: transmit holding register empty
            // SAFETY: COM1 is a legacy ISA port; only reached once the kernel enabled serial.
            unsafe {
                while inb(COM1 + 5) & 0x20 == 0 {
                    core::hint::spin_loop();
                }
                outb(COM1, byte);
            }
        }
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn serial_write(_data: &[u8]) {}

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    unsafe fn inb(port: u16) -> u8 {
        let value: u8;
        core::arch::asm!(
            "in al, dx",
            in("dx") port,
            out("al") value,
            options(nomem, nostack, preserves_flags)
        );
        value
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    unsafe fn outb(port: u16, value: u8) {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") value,
            options(nomem, nostack, preserves_flags)
        );
    }

    #[inline]
    pub fn enable_serial(enable: bool) {
        SERIAL_ENABLED.store(enable, Ordering::Relaxed);
    }

    /// Core write entry for all backends.
    pub fn write_bytes(data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if SERIAL_ENABLED.load(Ordering::Relaxed) {
            serial_write(data);
        }
        if let Some(mut ring) = MEM_RING.try_lock() {
            data.iter().for_each(|&b| ring.push(b));
        }
        if let Some(sink) = EXTERNAL_SINK.try_lock().and_then(|s| *s) {
            sink(data);
        }
    }

    /// Copy bytes from the in-memory ring buffer for diagnostics.
    #[must_use]
    pub fn copy_mem(out: &mut [u8]) -> usize {
        MEM_RING.try_lock().map_or(0, |ring| ring.copy_out(out))
    }

    #[must_use]
    pub fn serial_enabled() -> bool {
        SERIAL_ENABLED.load(Ordering::Relaxed)
    }

    /// Register an external sink callback (best effort, skipped under contention).
    pub fn set_external_sink(sink: Option<ExternalSinkFn>) {
        *EXTERNAL_SINK.lock() = sink;
    }
}

// --------------------------------------------------------------------------
// Public API
// --------------------------------------------------------------------------
// Logging never blocks: the record ring is taken with try_lock and a busy
// ring degrades to the early-print path.
// --------------------------------------------------------------------------

pub fn init(callbacks: LoggerCallbacks) {
    LOGGER.init(callbacks);
}

pub fn log(level: LogLevel, subsystem: &'static str, args: fmt::Arguments) {
    LOGGER.record(level, subsystem, args);
}

/// Drop records below `level`.
pub fn set_min_level(level: LogLevel) {
    LOGGER.min_level.store(level as u8, Ordering::Relaxed);
}

#[must_use]
pub fn min_level() -> LogLevel {
    LogLevel::from_u8(LOGGER.min_level.load(Ordering::Relaxed))
}

/// Copy the oldest unacknowledged records into `out`.
/// Returns the number of records copied, or 0 if the ring is busy.
pub fn read_records(out: &mut [LogRecord]) -> usize {
    LOGGER.ring.try_lock().map_or(0, |ring| ring.copy_out(out))
}

/// Acknowledge records in the kernel log ring buffer.
///
/// # Errors
///
/// Returns `Err(())` if the ring buffer is busy.
#[allow(clippy::result_unit_err)]
pub fn ack_records(count: usize) -> Result<(), ()> {
    match LOGGER.ring.try_lock() {
        Some(mut ring) => {
            ring.ack(count);
            Ok(())
        }
        None => Err(()),
    }
}

// --------------------------------------------------------------------------
// Macros
// --------------------------------------------------------------------------

#[macro_export]
macro_rules! klog_trace {
    ($subsystem:expr, $($arg:tt)*) => {
        $crate::log($crate::LogLevel::Trace, $subsystem, core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_debug {
    ($subsystem:expr, $($arg:tt)*) => {
        $crate::log($crate::LogLevel::Debug, $subsystem, core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_info {
    ($subsystem:expr, $($arg:tt)*) => {
        $crate::log($crate::LogLevel::Info, $subsystem, core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_warn {
    ($subsystem:expr, $($arg:tt)*) => {
        $crate::log($crate::LogLevel::Warn, $subsystem, core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_error {
    ($subsystem:expr, $($arg:tt)*) => {
        $crate::log($crate::LogLevel::Error, $subsystem, core::format_args!($($arg)*))
    };
}

// --------------------------------------------------------------------------
// Logger core
// --------------------------------------------------------------------------

static LOGGER: Logger = Logger::new();

struct Logger {
    ring: Mutex<LogRing>,
    callbacks: Mutex<LoggerCallbacks>,
    min_level: AtomicU8,
}

impl Logger {
    const fn new() -> Self {
        Self {
            ring: Mutex::new(LogRing::new(LogRecord::empty())),
            callbacks: Mutex::new(LoggerCallbacks::default()),
            min_level: AtomicU8::new(LogLevel::Debug as u8),
        }
    }

    fn init(&self, callbacks: LoggerCallbacks) {
        *self.callbacks.lock() = callbacks;
    }

    fn callbacks(&self) -> LoggerCallbacks {
        self.callbacks
            .try_lock()
            .map_or(LoggerCallbacks::default(), |cb| *cb)
    }

    fn record(&self, level: LogLevel, subsystem: &'static str, args: fmt::Arguments) {
        if (level as u8) < self.min_level.load(Ordering::Relaxed) {
            return;
        }

        let mut msg_buf = MsgBuf::new();
        let _ = fmt::write(&mut msg_buf, args);
        let cb = self.callbacks();

        // Nested logging (a sink that logs) goes straight to early print
        if LOGGING_ACTIVE
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            early_line(cb, level, subsystem, msg_buf.as_str());
            return;
        }

        let pushed = match self.ring.try_lock() {
            Some(mut ring) => {
                ring.push(LogRecord {
                    ts: (cb.timestamp)(),
                    level,
                    subsystem,
                    msg: msg_buf.buf,
                    len: msg_buf.len as u16,
                });
                true
            }
            None => false,
        };

        // A busy ring still gets the line out through early print
        if !pushed {
            early_line(cb, level, subsystem, msg_buf.as_str());
        } else {
            let mut line = LineBuf::new();
            let _ = line.write_prefix(level, subsystem);
            let _ = line.write_str(msg_buf.as_str());
            let _ = line.write_str("\n");
            log_backend::write_bytes(line.as_bytes());
        }

        LOGGING_ACTIVE.store(false, Ordering::Release);
    }
}

fn early_line(cb: LoggerCallbacks, level: LogLevel, subsystem: &'static str, msg: &str) {
    let mut early = LineBuf::new();
    let _ = early.write_prefix(level, subsystem);
    let _ = early.write_str(msg);
    (cb.early_print)(early.as_str());
}

// --------------------------------------------------------------------------
// Overwriting ring shared by the record log and the byte backend
// --------------------------------------------------------------------------

struct Ring<T: Copy, const N: usize> {
    buf: [T; N],
    // Oldest unacknowledged entry and number of live entries
    start: usize,
    count: usize,
}

impl<T: Copy, const N: usize> Ring<T, N> {
    const fn new(fill: T) -> Self {
        Self {
            buf: [fill; N],
            start: 0,
            count: 0,
        }
    }

    fn len(&self) -> usize {
        self.count
    }

    /// Append, dropping the oldest entry when full.
    fn push(&mut self, item: T) {
        self.buf[(self.start + self.count) % N] = item;
        if self.count == N {
            self.start = (self.start + 1) % N;
        } else {
            self.count += 1;
        }
    }

    fn copy_out(&self, out: &mut [T]) -> usize {
        let n = self.count.min(out.len());
        for (i, slot) in out[..n].iter_mut().enumerate() {
            *slot = self.buf[(self.start + i) % N];
        }
        n
    }

    fn ack(&mut self, count: usize) {
        let n = count.min(self.count);
        self.start = (self.start + n) % N;
        self.count -= n;
    }
}

type LogRing = Ring<LogRecord, LOG_RING_SIZE>;

// --------------------------------------------------------------------------
// Helpers
// --------------------------------------------------------------------------

/// Fixed-capacity text buffer; writes past the end are cut off silently.
struct TextBuf<const N: usize> {
    buf: [u8; N],
    len: usize,
}

type MsgBuf = TextBuf<LOG_MSG_MAX>;
type LineBuf = TextBuf<{ LOG_MSG_MAX + LOG_SUBSYS_MAX + 16 }>;

impl<const N: usize> TextBuf<N> {
    const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    fn write_prefix(&mut self, level: LogLevel, subsystem: &'static str) -> fmt::Result {
        write!(self, "[{}][{}] ", level, subsystem)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Truncation may split a character; the partial tail is dropped.
    fn as_str(&self) -> &str {
        let bytes = self.as_bytes();
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

impl<const N: usize> fmt::Write for TextBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let take = (N - self.len).min(s.len());
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}
