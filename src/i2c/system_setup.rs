// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! Separates controller bring-up from the platform clock tree. The board
//! provides a [`ClockSource`] for the SMBus functional clock; the driver
//! only ever asks it to turn on and to report its rate.

use crate::i2c::common::Error;
use fugit::HertzU32;

/// Functional clock feeding one SMBus controller.
pub trait ClockSource {
    type Error: core::fmt::Debug;

    /// Ungate the clock.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Current clock rate.
    fn rate(&self) -> Result<HertzU32, Self::Error>;
}

/// Helper for I2C clock operations.
pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// Turn on the controller clock.
    ///
    /// # Errors
    ///
    /// `ClockUnavailable` if the clock tree refuses.
    pub fn enable_i2c_clock<C: ClockSource>(clock: &mut C) -> Result<(), Error> {
        clock.enable().map_err(|_| Error::ClockUnavailable)
    }

    /// Source clock used for the SCL and timeout calculations.
    ///
    /// # Errors
    ///
    /// `ClockUnavailable` if the rate cannot be read.
    pub fn get_i2c_source_frequency<C: ClockSource>(clock: &C) -> Result<HertzU32, Error> {
        clock.rate().map_err(|_| Error::ClockUnavailable)
    }
}
