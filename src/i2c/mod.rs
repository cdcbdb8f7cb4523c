// Licensed under the Apache-2.0 license

//! NPCM4xx SMBus/I2C driver module.
//!
//! Interrupt-driven master and slave engines for the NPCM4xx SMBus
//! controller in DMA mode, designed for bare-metal and `no_std`
//! environments. [`npcm4xx_i2c::Npcm4xxI2c`] owns one controller;
//! [`i2c_controller::I2cController`] puts an `embedded_hal::i2c::I2c` face on it.

pub mod common;
pub mod i2c_controller;
mod master;
pub mod npcm4xx_i2c;
pub mod registers;
#[cfg(test)]
pub(crate) mod sim;
mod slave;
pub mod sync;
pub mod system_setup;
pub mod timing;
pub mod traits;
