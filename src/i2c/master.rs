// Licensed under the Apache-2.0 license

//! Master transaction engine.
//!
//! A transfer is at most one write segment followed by at most one read
//! segment. The caller stages the segments with `combine_messages`, arms
//! the controller with `arm_master` and then only waits; every later step
//! happens in `master_isr`:
//!
//! ```text
//! Start --SDAST--> Write --SDAST--> tx DMA --DMA done--> stop        (no read)
//!                                            \--DMA done--> Read (repeated start)
//! Start --SDAST--> Read  --STASTR--> rx DMA --DMA done--> stop
//! Start --SDAST--> Quick --STASTR--> stop
//! ```

use crate::common::{format_line, Logger};
use crate::i2c::common::{Error, OperState, I2C_MAX_XFER_SIZE};
use crate::i2c::npcm4xx_i2c::I2cData;
use crate::i2c::registers::{DmaCtrl, I2cRegisters, St, TimeoutSt};
use crate::i2c::traits::I2cTarget;
use embedded_hal::i2c::Operation;

impl<R: I2cRegisters, T: I2cTarget, L: Logger> I2cData<'_, R, T, L> {
    /// Stage `operations` for `addr` without touching the hardware.
    ///
    /// Returns the index of the read operation, if any.
    pub(crate) fn combine_messages(
        &mut self,
        addr: u8,
        operations: &[Operation<'_>],
    ) -> Result<Option<usize>, Error> {
        let mut tx_len = 0usize;
        let mut rx_len = 0usize;
        let mut read_index = None;

        for (index, op) in operations.iter().enumerate() {
            if read_index.is_some() {
                return Err(Error::Unsupported);
            }
            match op {
                Operation::Write(bytes) => {
                    let end = tx_len + bytes.len();
                    if end > I2C_MAX_XFER_SIZE {
                        return Err(Error::Unsupported);
                    }
                    self.tx_buf
                        .as_mut_slice(tx_len, bytes.len())
                        .copy_from_slice(bytes);
                    tx_len = end;
                }
                Operation::Read(buf) => {
                    if buf.len() > I2C_MAX_XFER_SIZE {
                        return Err(Error::Unsupported);
                    }
                    rx_len = buf.len();
                    read_index = Some(index);
                }
            }
        }

        let mut dev_addr = addr << 1;
        if tx_len == 0 && rx_len == 0 {
            // Quick command: exactly one empty message, its direction in bit 0.
            match operations {
                [Operation::Write(_)] => {}
                [Operation::Read(_)] => dev_addr |= 1,
                _ => return Err(Error::Unsupported),
            }
        }

        self.tx_cnt = u16::try_from(tx_len).map_err(|_| Error::Unsupported)?;
        self.rx_cnt = u16::try_from(rx_len).map_err(|_| Error::Unsupported)?;
        self.dev_addr = dev_addr;
        self.result = Ok(());
        Ok(read_index)
    }

    /// Arm the staged transfer and issue START.
    pub(crate) fn arm_master(&mut self) {
        if let Some(timeout) = self.master_timeout {
            self.arm_hw_timeout(timeout);
        }
        self.notified = false;
        self.master_state = OperState::Start;
        self.regs.clear_dma_irq();
        self.regs.start();
    }

    /// Collect the outcome once the caller stopped waiting.
    pub(crate) fn finish_transfer(
        &mut self,
        completed: bool,
        read_buf: Option<&mut [u8]>,
    ) -> Result<(), Error> {
        if !completed {
            self.reset_module();
            self.regs.clear_dma_irq();
            if self.master_timeout.is_some() {
                self.regs.disable_hw_timeout();
            }
            self.notified = false;
            self.result = Err(Error::Timeout);
            self.logger.error(&format_line(format_args!(
                "i2c transfer to 0x{:02x} timed out",
                self.dev_addr >> 1
            )));
        }

        self.result?;
        if let Some(buf) = read_buf {
            let len = usize::from(self.rx_cnt).min(buf.len());
            if let (Some(dst), src) = (buf.get_mut(..len), self.rx_buf.as_slice(0, len)) {
                dst.copy_from_slice(src);
            }
        }
        Ok(())
    }

    fn notify(&mut self, result: Result<(), Error>) {
        if self.master_timeout.is_some() {
            self.regs.disable_hw_timeout();
        }
        self.master_state = OperState::Idle;
        self.result = result;
        self.notified = true;
    }

    fn stop_and_notify(&mut self) {
        self.regs.stop();
        self.notify(Ok(()));
    }

    pub(crate) fn master_isr(&mut self) {
        if self.master_timeout.is_some() {
            for flag in [TimeoutSt::T_OUTST1, TimeoutSt::T_OUTST2] {
                if self.regs.timeout_status().contains(flag) {
                    self.regs.clear_timeout_flag(flag);
                    self.reset_module();
                    self.notify(Err(Error::Timeout));
                }
            }
        }

        if self.regs.status().contains(St::NEGACK) {
            self.logger.debug("i2c: nack");
            self.regs.abort_data();
            self.regs.clear_dma_irq();
            self.master_state = OperState::Idle;
            self.notify(Err(Error::NoAck));
        }

        if self.regs.status().contains(St::BER) {
            self.logger.debug("i2c: bus error");
            self.regs.abort_data();
            self.master_state = OperState::Idle;
            self.reset_module();
            self.notify(Err(Error::BusError));
        }

        if self.regs.status().contains(St::SDAST) {
            match self.master_state {
                OperState::Start => {
                    if self.tx_cnt == 0 && self.rx_cnt == 0 {
                        self.master_state = OperState::Quick;
                        self.regs.enable_stall();
                        self.regs.write_data(self.dev_addr);
                    } else if self.tx_cnt == 0 {
                        self.master_state = OperState::Read;
                        self.regs.enable_stall();
                        self.regs.write_data(self.dev_addr | 1);
                    } else {
                        self.master_state = OperState::Write;
                        self.regs.write_data(self.dev_addr & !1);
                    }
                }
                OperState::Write => {
                    let addr = self.tx_buf.address();
                    self.regs.start_dma(addr, self.tx_cnt);
                }
                _ => {}
            }
        }

        if self.regs.status().contains(St::STASTR) {
            match self.master_state {
                OperState::Read => {
                    self.regs.dma_nack_last_byte();
                    let addr = self.rx_buf.address();
                    self.regs.start_dma(addr, self.rx_cnt);
                }
                OperState::Quick => self.stop_and_notify(),
                _ => {}
            }
            self.regs.disable_stall();
            self.regs.clear_status(St::STASTR);
        }

        if self.regs.dma_ctrl().contains(DmaCtrl::DMA_IRQ) {
            match self.master_state {
                OperState::Write if self.rx_cnt == 0 => self.stop_and_notify(),
                OperState::Write => {
                    self.master_state = OperState::Read;
                    self.regs.enable_stall();
                    self.regs.start();
                    self.regs.write_data(self.dev_addr | 1);
                }
                OperState::Read => {
                    self.regs.stop();
                    self.rx_cnt = self.regs.dma_count().min(self.rx_cnt);
                    self.notify(Ok(()));
                }
                _ => {}
            }
            self.regs.clear_dma_irq();
        }
    }
}
