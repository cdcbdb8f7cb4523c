// Licensed under the Apache-2.0 license

//! Shared helpers used across the driver: diagnostic logging, DMA-safe
//! buffers and a busy-wait delay provider.

use core::fmt::Write as _;
use embedded_hal::delay::DelayNs;

/// Capacity of a single formatted log line.
pub const LOG_LINE_SIZE: usize = 96;

/// Sink for driver diagnostics.
///
/// Implementations are called from interrupt context and must not block.
pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Logger that discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Logger writing one line per message to any `embedded_io` byte sink,
/// typically a UART.
pub struct IoLogger<W: embedded_io::Write> {
    writer: W,
}

impl<W: embedded_io::Write> IoLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, level: &str, msg: &str) {
        // Write errors are dropped, there is nowhere to report them.
        let _ = self.writer.write_all(level.as_bytes());
        let _ = self.writer.write_all(msg.as_bytes());
        let _ = self.writer.write_all(b"\r\n");
    }
}

impl<W: embedded_io::Write> Logger for IoLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.line("[i2c] ", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line("[i2c] error: ", msg);
    }
}

/// Render `args` into a fixed-capacity line. A piece that does not fit is dropped.
pub fn format_line(args: core::fmt::Arguments<'_>) -> heapless::String<LOG_LINE_SIZE> {
    let mut line = heapless::String::new();
    let _ = line.write_fmt(args);
    line
}

/// Word-aligned byte buffer handed to a DMA engine by address.
#[derive(Clone, Debug)]
#[repr(C, align(4))]
pub struct DmaBuffer<const N: usize> {
    pub buf: [u8; N],
}

impl<const N: usize> Default for DmaBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DmaBuffer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: [0; N] }
    }

    /// Bus address of the first byte.
    #[must_use]
    pub fn address(&self) -> usize {
        self.buf.as_ptr() as usize
    }

    /// `len` bytes starting at `start`, clamped to the buffer.
    #[must_use]
    pub fn as_slice(&self, start: usize, len: usize) -> &[u8] {
        let start = start.min(N);
        let end = start.saturating_add(len).min(N);
        self.buf.get(start..end).unwrap_or(&[])
    }

    /// Mutable view of `len` bytes starting at `start`, clamped to the buffer.
    pub fn as_mut_slice(&mut self, start: usize, len: usize) -> &mut [u8] {
        let start = start.min(N);
        let end = start.saturating_add(len).min(N);
        self.buf.get_mut(start..end).unwrap_or(&mut [])
    }
}

/// Cycle-counting delay for Cortex-M cores.
#[derive(Clone, Copy, Debug)]
pub struct CycleDelay {
    cpu_hz: u32,
}

impl CycleDelay {
    #[must_use]
    pub const fn new(cpu_hz: u32) -> Self {
        Self { cpu_hz }
    }
}

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = u64::from(self.cpu_hz) * u64::from(ns) / 1_000_000_000;
        cortex_m::asm::delay(u32::try_from(cycles).unwrap_or(u32::MAX).max(1));
    }
}
