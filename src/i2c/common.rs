// Licensed under the Apache-2.0 license

//! Common types and constants for the NPCM4xx I2C driver modules.
//!
//! This module provides shared definitions for error handling, bus speeds,
//! driver state and configuration used across the I2C driver implementation.

use fugit::{HertzU32, MillisDurationU32};

/// Capacity of the controller-owned transmit and receive DMA buffers.
pub const I2C_MAX_XFER_SIZE: usize = 256;

/// Default maximum time a caller waits for a transfer to complete.
pub const I2C_TRANS_TIMEOUT_MS: u32 = 500;

/// Default maximum time a caller waits for the controller lock.
pub const I2C_WAITING_TIME_MS: u32 = 1000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Controller lock or slave registration contention.
    Busy,
    /// Message shape, addressing mode or speed class not supported.
    Unsupported,
    InvalidConfig,
    InvalidState,
    /// Target rejected the address or data.
    NoAck,
    /// Illegal bus condition detected by the controller.
    BusError,
    /// Software wait or hardware cumulative-time threshold exceeded.
    Timeout,
    /// Clock source could not be enabled or queried.
    ClockUnavailable,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            Error::NoAck => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Error::BusError => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::Busy => "controller busy",
            Error::Unsupported => "operation not supported",
            Error::InvalidConfig => "invalid configuration",
            Error::InvalidState => "invalid state",
            Error::NoAck => "no acknowledge",
            Error::BusError => "bus error",
            Error::Timeout => "timeout",
            Error::ClockUnavailable => "clock unavailable",
        };
        f.write_str(msg)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    #[must_use]
    pub const fn bitrate(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }
}

impl TryFrom<HertzU32> for I2cSpeed {
    type Error = Error;

    fn try_from(freq: HertzU32) -> Result<Self, Self::Error> {
        match freq.raw() {
            100_000 => Ok(Self::Standard),
            400_000 => Ok(Self::Fast),
            1_000_000 => Ok(Self::FastPlus),
            _ => Err(Error::InvalidConfig),
        }
    }
}

/// Operation state shared by the master and slave state machines.
///
/// For the slave, `Read` means the slave is reading from the bus (receiving)
/// and `Write` means it is writing to the bus (transmitting).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum OperState {
    #[default]
    Idle,
    Start,
    Write,
    Read,
    Quick,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cSEvent {
    SlaveRdReq,
    SlaveWrReq,
    SlaveRdProc,
    SlaveWrRecvd,
    SlaveStop,
}

/// Status information for I2C slave operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveStatus {
    /// Registered 7-bit slave address
    pub address: u8,
    /// Current slave state machine state
    pub state: OperState,
    /// Last callback delivered to the registered target
    pub last_event: Option<I2cSEvent>,
    /// Bus errors seen while acting as slave
    pub bus_errors: u32,
    /// Hardware timeouts seen while acting as slave
    pub timeouts: u32,
}

/// Cumulative SMBus timeout thresholds, in milliseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HwTimeout {
    pub clock_low_ms: u8,
    pub clock_cycle_ms: u8,
}

impl Default for HwTimeout {
    fn default() -> Self {
        Self {
            clock_low_ms: 25,
            clock_cycle_ms: 50,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    pub speed: I2cSpeed,
    pub master_timeout: Option<HwTimeout>,
    pub slave_timeout: Option<HwTimeout>,
    pub transfer_timeout: MillisDurationU32,
    pub lock_timeout: MillisDurationU32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    master_timeout: Option<HwTimeout>,
    slave_timeout: Option<HwTimeout>,
    transfer_timeout: MillisDurationU32,
    lock_timeout: MillisDurationU32,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Standard,
            master_timeout: None,
            // Quick commands trip the slave timeout, keep it off unless asked.
            slave_timeout: None,
            transfer_timeout: MillisDurationU32::millis(I2C_TRANS_TIMEOUT_MS),
            lock_timeout: MillisDurationU32::millis(I2C_WAITING_TIME_MS),
        }
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn master_timeout(mut self, timeout: HwTimeout) -> Self {
        self.master_timeout = Some(timeout);
        self
    }
    #[must_use]
    pub fn slave_timeout(mut self, timeout: HwTimeout) -> Self {
        self.slave_timeout = Some(timeout);
        self
    }
    #[must_use]
    pub fn transfer_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.transfer_timeout = timeout;
        self
    }
    #[must_use]
    pub fn lock_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.lock_timeout = timeout;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            master_timeout: self.master_timeout,
            slave_timeout: self.slave_timeout,
            transfer_timeout: self.transfer_timeout,
            lock_timeout: self.lock_timeout,
        }
    }
}
