// Licensed under the Apache-2.0 license

//! # I2C Driver Traits
//!
//! Small traits at the seams of the driver:
//!
//! ```text
//! I2cHardwareCore (configure + interrupt entry)
//!     ├── I2cMaster (blocking controller transfers)
//!     └── I2cSlaveCore (target registration)
//! I2cTarget (callbacks invoked by the slave engine)
//! ```
//!
//! Every method takes `&self`: one controller is shared between the
//! calling thread and its interrupt handler.

use crate::i2c::common::I2cSpeed;
use embedded_hal::i2c::{Operation, SevenBitAddress};

/// Bus configuration requested through [`I2cHardwareCore::configure`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    pub speed: I2cSpeed,
    /// The controller role is requested.
    pub controller: bool,
    pub ten_bit_addressing: bool,
}

impl BusConfig {
    #[must_use]
    pub const fn controller(speed: I2cSpeed) -> Self {
        Self {
            speed,
            controller: true,
            ten_bit_addressing: false,
        }
    }
}

/// Core interface every controller provides.
pub trait I2cHardwareCore {
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Select the bus speed and recompute the SCL timing.
    ///
    /// # Errors
    ///
    /// Fails for speeds or addressing modes the controller cannot do.
    fn configure(&self, config: BusConfig) -> Result<(), Self::Error>;

    /// Interrupt entry. Must be called from the controller's interrupt
    /// handler and only from there.
    fn handle_interrupt(&self);
}

/// Controller (master) role.
pub trait I2cMaster<A = SevenBitAddress>: I2cHardwareCore {
    /// Run `operations` against `addr` as one bus transaction.
    ///
    /// Supported shapes are an optional write segment followed by an
    /// optional single read. Consecutive writes are concatenated and sent
    /// as one segment, not as separate messages. A single empty operation
    /// is sent as an SMBus quick command.
    ///
    /// # Errors
    ///
    /// `Busy` when the controller lock cannot be taken, `Unsupported` for
    /// other shapes, then whatever the bus reports.
    fn transfer(&self, addr: A, operations: &mut [Operation<'_>]) -> Result<(), Self::Error>;
}

/// Reason a target declined a callback.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Declined;

/// Callbacks the slave engine invokes while acting as a target.
///
/// They run in interrupt context. They must not block and must not call
/// back into the controller.
pub trait I2cTarget {
    /// A master started writing to us.
    fn write_requested(&mut self);

    /// One byte written by the master, delivered in order.
    ///
    /// # Errors
    ///
    /// `Declined` when the target cannot take more data.
    fn write_received(&mut self, byte: u8) -> Result<(), Declined>;

    /// A master started reading from us. Fill the first reply byte.
    ///
    /// # Errors
    ///
    /// `Declined` when there is nothing to send.
    fn read_requested(&mut self, byte: &mut u8) -> Result<(), Declined>;

    /// Fill the next reply byte.
    ///
    /// # Errors
    ///
    /// `Declined` when the reply is complete.
    fn read_processed(&mut self, byte: &mut u8) -> Result<(), Declined>;

    /// The master issued a stop during one of our transactions.
    fn stop(&mut self);
}

/// Target for controllers used only as bus masters. Declines everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTarget;

impl I2cTarget for NoTarget {
    fn write_requested(&mut self) {}

    fn write_received(&mut self, _byte: u8) -> Result<(), Declined> {
        Err(Declined)
    }

    fn read_requested(&mut self, _byte: &mut u8) -> Result<(), Declined> {
        Err(Declined)
    }

    fn read_processed(&mut self, _byte: &mut u8) -> Result<(), Declined> {
        Err(Declined)
    }

    fn stop(&mut self) {}
}

/// Registration of a target on a controller.
pub struct SlaveConfig<'a, T: I2cTarget> {
    pub address: u16,
    pub ten_bit_addressing: bool,
    pub target: &'a mut T,
}

impl<'a, T: I2cTarget> SlaveConfig<'a, T> {
    pub fn new(address: u8, target: &'a mut T) -> Self {
        Self {
            address: u16::from(address),
            ten_bit_addressing: false,
            target,
        }
    }
}

/// Target (slave) role.
pub trait I2cSlaveCore<'a, T: I2cTarget>: I2cHardwareCore {
    /// # Errors
    ///
    /// `InvalidConfig` for missing configurations or unsupported
    /// addressing, `Busy` if a target is already registered or the lock
    /// cannot be taken.
    fn slave_register(&self, config: Option<SlaveConfig<'a, T>>) -> Result<(), Self::Error>;

    /// Detach the registered target and hand it back.
    ///
    /// # Errors
    ///
    /// `InvalidState` without a registered target, `Busy` while a
    /// transaction is in flight.
    fn slave_unregister(&self) -> Result<&'a mut T, Self::Error>;
}
