// Licensed under the Apache-2.0 license

//! embedded-hal front end for a shared controller.
//!
//! The driver takes `&self` so that it can be reached from its interrupt
//! handler. [`I2cController`] borrows it and exposes the usual
//! `embedded_hal::i2c::I2c` interface to device drivers.

use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<'c, H: I2cMaster> {
    pub hardware: &'c H,
}

impl<'c, H: I2cMaster> I2cController<'c, H> {
    pub fn new(hardware: &'c H) -> Self {
        Self { hardware }
    }
}

impl<H: I2cMaster> embedded_hal::i2c::ErrorType for I2cController<'_, H> {
    type Error = H::Error;
}

impl<H: I2cMaster> embedded_hal::i2c::I2c for I2cController<'_, H> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware.transfer(addr, &mut [Operation::Read(buffer)])
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.hardware.transfer(addr, &mut [Operation::Write(bytes)])
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hardware
            .transfer(addr, &mut [Operation::Write(bytes), Operation::Read(buffer)])
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hardware.transfer(addr, operations)
    }
}
