// Licensed under the Apache-2.0 license

//! Slave (target) engine.
//!
//! Runs when the master engine is idle and a target is registered. A
//! master write lands in the receive DMA buffer and reaches the target one
//! byte at a time through `write_received` once the transaction ends or
//! turns around. A master read is answered from a reply the target fills
//! up front through `read_requested`/`read_processed`.
//!
//! Slave states reuse [`OperState`] from the controller's point of view:
//! `Read` while receiving from the master, `Write` while transmitting to it,
//! `Quick` for a read with nothing to send.

use crate::common::{format_line, Logger};
use crate::i2c::common::{I2cSEvent, OperState, I2C_MAX_XFER_SIZE};
use crate::i2c::npcm4xx_i2c::I2cData;
use crate::i2c::registers::{DmaCtrl, I2cRegisters, St, TimeoutSt, SLAVE_FILLER_BYTE};
use crate::i2c::traits::I2cTarget;

const RX_DMA_LEN: u16 = I2C_MAX_XFER_SIZE as u16;

impl<R: I2cRegisters, T: I2cTarget, L: Logger> I2cData<'_, R, T, L> {
    /// Hand the bytes the receive DMA collected to the target, in order.
    fn flush_received(&mut self, stop_on_decline: bool) {
        let count = usize::from(self.regs.dma_count());
        let Some(slave) = self.slave.as_mut() else {
            return;
        };
        for &byte in self.rx_buf.as_slice(0, count) {
            if slave.target.write_received(byte).is_err() && stop_on_decline {
                break;
            }
        }
        if count > 0 {
            self.slave_stats.last_event = Some(I2cSEvent::SlaveWrRecvd);
        }
    }

    /// Collect the reply from the target. Returns its length.
    fn prepare_reply(&mut self) -> u16 {
        let Some(slave) = self.slave.as_mut() else {
            return 0;
        };
        let Some((first, rest)) = self.tx_buf.buf.split_first_mut() else {
            return 0;
        };
        self.slave_stats.last_event = Some(I2cSEvent::SlaveRdReq);
        if slave.target.read_requested(first).is_err() {
            return 0;
        }

        let mut len: u16 = 1;
        for byte in rest {
            if slave.target.read_processed(byte).is_err() {
                break;
            }
            len += 1;
        }
        if len > 1 {
            self.slave_stats.last_event = Some(I2cSEvent::SlaveRdProc);
        }
        len
    }

    fn address_matched(&mut self) {
        if self.regs.status().contains(St::XMIT) {
            if self.slave_state == OperState::Read {
                self.flush_received(false);
            }
            self.tx_cnt = self.prepare_reply();
            self.slave_state = OperState::Write;
            if self.tx_cnt == 0 {
                self.slave_state = OperState::Quick;
            } else {
                let addr = self.tx_buf.address();
                self.regs.start_dma(addr, self.tx_cnt);
            }
        } else {
            self.slave_state = OperState::Read;
            let addr = self.rx_buf.address();
            self.regs.start_dma(addr, RX_DMA_LEN);
            if let Some(slave) = self.slave.as_mut() {
                slave.target.write_requested();
            }
            self.slave_stats.last_event = Some(I2cSEvent::SlaveWrReq);
        }
        self.regs.clear_status(St::NMATCH);
    }

    pub(crate) fn slave_isr(&mut self) {
        if self.slave_timeout.is_some() {
            for flag in [TimeoutSt::T_OUTST1, TimeoutSt::T_OUTST2] {
                if self.regs.timeout_status().contains(flag) {
                    self.logger.error(&format_line(format_args!(
                        "i2c slave: hw timeout {:?}",
                        flag
                    )));
                    self.slave_state = OperState::Start;
                    self.regs.clear_timeout_flag(flag);
                    self.reset_module();
                    self.slave_stats.timeouts = self.slave_stats.timeouts.wrapping_add(1);
                }
            }
        }

        if self.regs.status().contains(St::NEGACK) {
            self.regs.clear_status(St::NEGACK);
        }

        if self.regs.status().contains(St::BER) {
            // A bus error right after a quick read is how masters end it.
            if self.slave_state != OperState::Quick {
                self.logger.error("i2c slave: bus error");
                self.slave_stats.bus_errors = self.slave_stats.bus_errors.wrapping_add(1);
            }
            self.slave_state = OperState::Start;
            self.regs.clear_status(St::BER);
            self.reset_module();
        }

        if self.regs.dma_ctrl().contains(DmaCtrl::DMA_IRQ) {
            // Receive buffer full: refuse anything beyond it.
            if self.slave_state == OperState::Read {
                self.regs.nack();
            }
            self.regs.clear_dma_irq();
        }

        if self.regs.status().contains(St::NMATCH) {
            self.address_matched();
        }

        if self.regs.status().contains(St::SDAST) {
            if self.slave_state == OperState::Read {
                let overflow = self.regs.read_data();
                self.flush_received(true);
                if let Some(slave) = self.slave.as_mut() {
                    let _ = slave.target.write_received(overflow);
                }
                self.slave_state = OperState::Start;
            } else {
                self.regs.write_data(SLAVE_FILLER_BYTE);
            }
        }

        if self.regs.status().contains(St::SLVSTP) {
            if self.slave_state == OperState::Read {
                self.flush_received(false);
            }
            if self.slave_state != OperState::Idle {
                if let Some(slave) = self.slave.as_mut() {
                    slave.target.stop();
                }
                self.slave_stats.last_event = Some(I2cSEvent::SlaveStop);
            }
            self.slave_state = OperState::Start;
            self.regs.clear_status(St::SLVSTP);
        }
    }
}
