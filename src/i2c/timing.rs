// Licensed under the Apache-2.0 license

//! SCL timing derivation.
//!
//! Converts a source clock and a bus speed into the divider and hold-time
//! fields of the controller, then programs them.

use crate::i2c::common::{Error, I2cSpeed};
use crate::i2c::registers::{Ctl2, Ctl3, I2cRegisters, Reg, SCLFRQ6_0_SHIFT};
use fugit::HertzU32;

const STANDARD_DIV_MIN: u32 = 8;
const STANDARD_DIV_MAX: u32 = 511;
const FAST_DIV_MIN: u32 = 5;
const FAST_DIV_MAX: u32 = 255;

/// Register field values for one bus speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// SCL frequency divider, split across CTL2/CTL3 in standard mode.
    pub scl_freq: u16,
    /// Fast mode / fast mode plus path.
    pub fast_mode: bool,
    pub scl_high: u8,
    pub scl_low: u8,
    /// SDA hold time (CTL4).
    pub hold_time: u8,
}

/// Hold time keeping roughly 360 ns at the given source clock.
#[must_use]
pub fn hold_time(source: HertzU32) -> u8 {
    match source.raw() {
        40_000_000.. => 17,
        20_000_000.. => 9,
        _ => 7,
    }
}

impl TimingConfig {
    /// # Errors
    ///
    /// `InvalidConfig` when `bus` is not a standard, fast or fast-plus rate.
    pub fn calculate(source: HertzU32, bus: HertzU32) -> Result<Self, Error> {
        I2cSpeed::try_from(bus)?;

        let divider = source.raw() / bus.raw().saturating_mul(4);
        let hold_time = hold_time(source);

        if bus.raw() < I2cSpeed::Fast as u32 {
            let divider = divider.clamp(STANDARD_DIV_MIN, STANDARD_DIV_MAX);
            Ok(Self {
                scl_freq: u16::try_from(divider).map_err(|_| Error::InvalidConfig)?,
                fast_mode: false,
                scl_high: 0,
                scl_low: 0,
                hold_time,
            })
        } else {
            let divider = u8::try_from(divider.clamp(FAST_DIV_MIN, FAST_DIV_MAX))
                .map_err(|_| Error::InvalidConfig)?;
            Ok(Self {
                scl_freq: 0,
                fast_mode: true,
                scl_high: divider - 3,
                scl_low: divider - 1,
                hold_time,
            })
        }
    }

    pub fn apply<R: I2cRegisters>(&self, regs: &mut R) {
        // Low seven divider bits live in CTL2, the top two in CTL3.
        let [lo, hi] = self.scl_freq.to_le_bytes();
        let frq6_0 = lo & 0x7F;
        let frq8_7 = (lo >> 7) | (hi << 1);

        regs.modify(Reg::Ctl2, |v| {
            let v = Ctl2::from_bits_retain(v).difference(Ctl2::SCLFRQ6_0).bits();
            v | (frq6_0 << SCLFRQ6_0_SHIFT)
        });
        regs.modify(Reg::Ctl3, |v| {
            let mut ctl3 = Ctl3::from_bits_retain(v).difference(Ctl3::SCLFRQ8_7);
            ctl3.set(Ctl3::FAST_MODE, self.fast_mode);
            ctl3.bits() | (frq8_7 & Ctl3::SCLFRQ8_7.bits())
        });

        if self.fast_mode {
            regs.write(Reg::SclHt, self.scl_high);
            regs.write(Reg::SclLt, self.scl_low);
        }
        regs.write(Reg::Ctl4, self.hold_time);
    }
}
