// Licensed under the Apache-2.0 license

//! NPCM4xx SMBus/I2C controller driver.
//!
//! One [`Npcm4xxI2c`] owns one controller. It is shared between the thread
//! issuing transfers and the controller's interrupt handler, which calls
//! [`I2cHardwareCore::handle_interrupt`]. Transfer state lives behind a
//! critical-section mutex. Only the interrupt handler changes it while a
//! transfer is armed; the caller touches it again only after the
//! completion signal or its timeout.

use crate::common::{format_line, DmaBuffer, Logger, NoOpLogger};
use crate::i2c::common::{
    Error, HwTimeout, I2cConfig, I2cSEvent, I2cSpeed, OperState, SlaveStatus, I2C_MAX_XFER_SIZE,
};
use crate::i2c::registers::{Ctl1, I2cRegisters, Reg, St, TimeoutSt, TO_CKDIV_SHIFT};
use crate::i2c::sync::{BusLock, Completion};
use crate::i2c::system_setup::{ClockSource, I2cSystemSetup};
use crate::i2c::timing::TimingConfig;
use crate::i2c::traits::{
    BusConfig, I2cHardwareCore, I2cMaster, I2cSlaveCore, I2cTarget, NoTarget, SlaveConfig,
};
use core::cell::RefCell;
use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::{HertzU32, MillisDurationU32};

/// Timeout clock divider bounds accepted by `TIMEOUT_EN`.
const TO_CKDIV_MIN: u32 = 0x03;
const TO_CKDIV_MAX: u32 = 0x3F;

pub(crate) struct RegisteredSlave<'a, T> {
    pub(crate) address: u8,
    pub(crate) target: &'a mut T,
}

#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct SlaveStats {
    pub(crate) last_event: Option<I2cSEvent>,
    pub(crate) bus_errors: u32,
    pub(crate) timeouts: u32,
}

/// State shared between the caller and the interrupt handler.
pub(crate) struct I2cData<'a, R, T, L> {
    pub(crate) regs: R,
    pub(crate) logger: L,
    pub(crate) master_state: OperState,
    pub(crate) slave_state: OperState,
    pub(crate) source_clk: HertzU32,
    pub(crate) bitrate: HertzU32,
    pub(crate) tx_buf: DmaBuffer<I2C_MAX_XFER_SIZE>,
    pub(crate) rx_buf: DmaBuffer<I2C_MAX_XFER_SIZE>,
    pub(crate) tx_cnt: u16,
    pub(crate) rx_cnt: u16,
    /// 8-bit device address, read/write bit in bit 0.
    pub(crate) dev_addr: u8,
    pub(crate) result: Result<(), Error>,
    /// Set by the master engine when the waiting caller must be woken.
    pub(crate) notified: bool,
    pub(crate) master_timeout: Option<HwTimeout>,
    pub(crate) slave_timeout: Option<HwTimeout>,
    pub(crate) slave: Option<RegisteredSlave<'a, T>>,
    pub(crate) slave_stats: SlaveStats,
}

impl<'a, R: I2cRegisters, T: I2cTarget, L: Logger> I2cData<'a, R, T, L> {
    fn new(regs: R, config: &I2cConfig, logger: L) -> Self {
        Self {
            regs,
            logger,
            master_state: OperState::Idle,
            slave_state: OperState::Idle,
            source_clk: HertzU32::from_raw(0),
            bitrate: config.speed.bitrate(),
            tx_buf: DmaBuffer::new(),
            rx_buf: DmaBuffer::new(),
            tx_cnt: 0,
            rx_cnt: 0,
            dev_addr: 0,
            result: Ok(()),
            notified: false,
            master_timeout: config.master_timeout,
            slave_timeout: config.slave_timeout,
            slave: None,
            slave_stats: SlaveStats::default(),
        }
    }

    fn reset_state(&mut self) {
        self.master_state = OperState::Idle;
        self.slave_state = OperState::Idle;
        self.tx_buf.buf.fill(0);
        self.rx_buf.buf.fill(0);
        self.tx_cnt = 0;
        self.rx_cnt = 0;
        self.dev_addr = 0;
        self.result = Ok(());
        self.notified = false;
        self.slave = None;
        self.slave_stats = SlaveStats::default();
    }

    pub(crate) fn set_baudrate(&mut self) -> Result<(), Error> {
        let timing = TimingConfig::calculate(self.source_clk, self.bitrate)?;
        timing.apply(&mut self.regs);
        Ok(())
    }

    /// Controller reset. Drops the master back to idle.
    pub(crate) fn reset_module(&mut self) {
        self.regs.reset_module();
        self.master_state = OperState::Idle;
    }

    fn timeout_divider(&self) -> Option<u8> {
        let div = (self.source_clk.raw() / 1_000_000).checked_sub(1)?;
        if (TO_CKDIV_MIN..=TO_CKDIV_MAX).contains(&div) {
            u8::try_from(div).ok()
        } else {
            None
        }
    }

    fn set_cumulative_timeout(&mut self, enable: TimeoutSt, flag: TimeoutSt, reg: Reg, ms: u8) {
        let Some(div) = self.timeout_divider() else {
            return;
        };
        self.regs.enable_module();
        self.regs.write(Reg::TimeoutEn, div << TO_CKDIV_SHIFT);
        self.regs
            .modify(Reg::TimeoutSt, |v| (TimeoutSt::from_bits_retain(v) | enable).bits());
        self.regs.clear_timeout_flag(flag);
        self.regs.write(reg, ms);
    }

    /// Program and arm the cumulative clock-cycle and clock-low timeouts.
    pub(crate) fn arm_hw_timeout(&mut self, timeout: HwTimeout) {
        self.set_cumulative_timeout(
            TimeoutSt::T_OUTST2_EN,
            TimeoutSt::T_OUTST2,
            Reg::TimeoutCtl1,
            timeout.clock_cycle_ms,
        );
        self.set_cumulative_timeout(
            TimeoutSt::T_OUTST1_EN,
            TimeoutSt::T_OUTST1,
            Reg::TimeoutCtl2,
            timeout.clock_low_ms,
        );
        self.regs.enable_hw_timeout();
    }

    /// Route one interrupt: the master while it is active, then a
    /// registered slave, otherwise discard whatever status is pending.
    pub(crate) fn dispatch(&mut self) {
        if self.master_state != OperState::Idle {
            self.master_isr();
        } else if self.slave.is_some() && self.slave_state != OperState::Idle {
            self.slave_isr();
        } else {
            self.regs.clear_status(St::all());
            self.regs.clear_dma_irq();
        }
    }

    fn attach_slave(&mut self, address: u8, target: &'a mut T) -> Result<(), Error> {
        if self.slave.is_some() {
            return Err(Error::Busy);
        }
        self.slave = Some(RegisteredSlave { address, target });
        self.slave_stats = SlaveStats::default();
        self.slave_state = OperState::Start;
        self.regs.set_slave_address(address);
        if let Some(timeout) = self.slave_timeout {
            self.arm_hw_timeout(timeout);
        }
        Ok(())
    }

    fn check_detachable(&self) -> Result<(), Error> {
        if self.slave.is_none() {
            return Err(Error::InvalidState);
        }
        if self.master_state != OperState::Idle || self.slave_state != OperState::Start {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn detach_slave(&mut self) -> Result<&'a mut T, Error> {
        self.check_detachable()?;
        self.regs.clear_slave_address();
        self.regs.clear_status(St::all());
        self.slave_state = OperState::Idle;
        self.slave
            .take()
            .map(|slave| slave.target)
            .ok_or(Error::InvalidState)
    }

    fn slave_status(&self) -> Option<SlaveStatus> {
        self.slave.as_ref().map(|slave| SlaveStatus {
            address: slave.address,
            state: self.slave_state,
            last_event: self.slave_stats.last_event,
            bus_errors: self.slave_stats.bus_errors,
            timeouts: self.slave_stats.timeouts,
        })
    }
}

/// Driver for one NPCM4xx SMBus controller in DMA mode.
pub struct Npcm4xxI2c<'a, R, D, T = NoTarget, L = NoOpLogger> {
    data: Mutex<RefCell<I2cData<'a, R, T, L>>>,
    lock: BusLock,
    completion: Completion,
    delay: D,
    default_speed: I2cSpeed,
    transfer_timeout: MillisDurationU32,
    lock_timeout: MillisDurationU32,
}

impl<'a, R, D, T, L> Npcm4xxI2c<'a, R, D, T, L>
where
    R: I2cRegisters,
    D: DelayNs + Clone,
    T: I2cTarget,
    L: Logger,
{
    /// Wrap a register block. The controller stays untouched until
    /// [`init`](Self::init).
    pub fn new(regs: R, config: I2cConfig, delay: D, logger: L) -> Self {
        Self {
            data: Mutex::new(RefCell::new(I2cData::new(regs, &config, logger))),
            lock: BusLock::new(),
            completion: Completion::new(),
            delay,
            default_speed: config.speed,
            transfer_timeout: config.transfer_timeout,
            lock_timeout: config.lock_timeout,
        }
    }

    /// Bring the controller up: clock on, state reset, default bus speed,
    /// module and interrupt enabled.
    ///
    /// # Errors
    ///
    /// `ClockUnavailable` if the clock cannot be enabled, `InvalidConfig`
    /// if the configured speed cannot be generated.
    pub fn init<C: ClockSource>(&mut self, clock: &mut C) -> Result<(), Error> {
        let data = self.data.get_mut().get_mut();

        if I2cSystemSetup::enable_i2c_clock(clock).is_err() {
            data.logger.error("turn on clock failed");
            return Err(Error::ClockUnavailable);
        }

        data.reset_state();
        data.bitrate = self.default_speed.bitrate();
        match I2cSystemSetup::get_i2c_source_frequency(clock) {
            Ok(freq) => data.source_clk = freq,
            Err(_) => data.logger.error("get clock source failed"),
        }
        data.logger.debug(&format_line(format_args!(
            "i2c clock source: {}, bitrate: {}",
            data.source_clk.raw(),
            data.bitrate.raw()
        )));
        data.set_baudrate()?;

        data.regs.enable_module();
        data.regs.modify(Reg::Ctl1, |v| {
            (Ctl1::from_bits_retain(v).difference(Ctl1::COMMANDS) | Ctl1::INTEN).bits()
        });
        self.completion.reset();
        Ok(())
    }

    pub(crate) fn with_data<Ret>(&self, f: impl FnOnce(&mut I2cData<'a, R, T, L>) -> Ret) -> Ret {
        critical_section::with(|cs| f(&mut self.data.borrow_ref_mut(cs)))
    }

    #[must_use]
    pub fn master_state(&self) -> OperState {
        self.with_data(|data| data.master_state)
    }

    #[must_use]
    pub fn slave_state(&self) -> OperState {
        self.with_data(|data| data.slave_state)
    }

    #[must_use]
    pub fn bitrate(&self) -> HertzU32 {
        self.with_data(|data| data.bitrate)
    }

    /// Snapshot of the slave role, `None` when no target is registered.
    #[must_use]
    pub fn slave_status(&self) -> Option<SlaveStatus> {
        self.with_data(|data| data.slave_status())
    }
}

impl<'a, R, D, T, L> I2cHardwareCore for Npcm4xxI2c<'a, R, D, T, L>
where
    R: I2cRegisters,
    D: DelayNs + Clone,
    T: I2cTarget,
    L: Logger,
{
    type Error = Error;

    fn configure(&self, config: BusConfig) -> Result<(), Error> {
        if !config.controller || config.ten_bit_addressing {
            return Err(Error::Unsupported);
        }
        self.with_data(|data| {
            data.bitrate = config.speed.bitrate();
            data.set_baudrate()
        })
    }

    fn handle_interrupt(&self) {
        let notify = self.with_data(|data| {
            data.dispatch();
            core::mem::take(&mut data.notified)
        });
        if notify {
            self.completion.signal();
        }
    }
}

impl<'a, R, D, T, L> I2cMaster<SevenBitAddress> for Npcm4xxI2c<'a, R, D, T, L>
where
    R: I2cRegisters,
    D: DelayNs + Clone,
    T: I2cTarget,
    L: Logger,
{
    fn transfer(
        &self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        if addr > 0x7F {
            return Err(Error::Unsupported);
        }
        let mut delay = self.delay.clone();
        let _guard = self
            .lock
            .acquire(&mut delay, self.lock_timeout)
            .ok_or(Error::Busy)?;

        let read_index = self.with_data(|data| data.combine_messages(addr, operations))?;

        self.completion.reset();
        self.with_data(|data| data.arm_master());

        let completed = self.completion.wait(&mut delay, self.transfer_timeout);

        let read_buf = read_index
            .and_then(|index| operations.get_mut(index))
            .and_then(|op| match op {
                Operation::Read(buf) => Some(&mut **buf),
                Operation::Write(_) => None,
            });
        self.with_data(|data| data.finish_transfer(completed, read_buf))
    }
}

impl<'a, R, D, T, L> I2cSlaveCore<'a, T> for Npcm4xxI2c<'a, R, D, T, L>
where
    R: I2cRegisters,
    D: DelayNs + Clone,
    T: I2cTarget,
    L: Logger,
{
    fn slave_register(&self, config: Option<SlaveConfig<'a, T>>) -> Result<(), Error> {
        let config = config.ok_or(Error::InvalidConfig)?;
        if config.ten_bit_addressing {
            return Err(Error::InvalidConfig);
        }
        let address = u8::try_from(config.address)
            .ok()
            .filter(|addr| *addr <= 0x7F)
            .ok_or(Error::InvalidConfig)?;

        let mut delay = self.delay.clone();
        let _guard = self
            .lock
            .acquire(&mut delay, self.lock_timeout)
            .ok_or(Error::Busy)?;
        self.with_data(|data| data.attach_slave(address, config.target))
    }

    fn slave_unregister(&self) -> Result<&'a mut T, Error> {
        self.with_data(|data| data.check_detachable())?;

        let mut delay = self.delay.clone();
        let _guard = self
            .lock
            .acquire(&mut delay, self.lock_timeout)
            .ok_or(Error::Busy)?;
        self.with_data(|data| data.detach_slave())
    }
}
