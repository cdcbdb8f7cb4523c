// Licensed under the Apache-2.0 license

//! Simulated controller for host tests.
//!
//! [`SimRegs`] models the parts of the register file the engines depend on:
//! write-1-to-clear status, command bits that act on write, the DMA engine
//! and the timeout flags. The test plays the bus through [`Bus`], raising
//! status bits and calling `handle_interrupt` the way the interrupt line
//! would, usually from a second thread while the caller blocks in
//! `transfer`.

use crate::common::NoOpLogger;
use crate::i2c::common::I2cConfig;
use crate::i2c::npcm4xx_i2c::Npcm4xxI2c;
use crate::i2c::registers::{Ctl1, Cst, DmaCtrl, I2cRegisters, Reg, St, TimeoutSt};
use crate::i2c::system_setup::tests::MockClock;
use crate::i2c::traits::{Declined, I2cTarget};
use embedded_hal::delay::DelayNs;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const REG_SPACE: usize = 0x50;
const BUS_WAIT: Duration = Duration::from_secs(2);

/// St bits that are write-1-to-clear.
const ST_W1C: St = St::NMATCH
    .union(St::STASTR)
    .union(St::NEGACK)
    .union(St::BER)
    .union(St::SLVSTP);

pub(crate) type SimController<'a> = Npcm4xxI2c<'a, SimRegs, StdDelay, RecordingTarget, NoOpLogger>;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// One DMA transfer the driver started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DmaRequest {
    pub(crate) addr: usize,
    pub(crate) len: u16,
    /// `LAST_PEC` was latched when the transfer started.
    pub(crate) nack_last: bool,
}

struct RegFile {
    regs: [u8; REG_SPACE],
    dma_addr: usize,
    last_pec: bool,
    dma: Option<DmaRequest>,
    sda_in: u8,
    sda_writes: Vec<u8>,
    starts: usize,
    stops: usize,
    nacks: usize,
    bb_clears: usize,
    writes: usize,
}

impl RegFile {
    fn new() -> Self {
        Self {
            regs: [0; REG_SPACE],
            dma_addr: 0,
            last_pec: false,
            dma: None,
            sda_in: 0,
            sda_writes: Vec::new(),
            starts: 0,
            stops: 0,
            nacks: 0,
            bb_clears: 0,
            writes: 0,
        }
    }

    fn get(&self, reg: Reg) -> u8 {
        self.regs[reg.offset()]
    }

    fn set(&mut self, reg: Reg, value: u8) {
        self.regs[reg.offset()] = value;
    }

    fn update(&mut self, reg: Reg, f: impl FnOnce(u8) -> u8) {
        let value = f(self.get(reg));
        self.set(reg, value);
    }
}

/// Register file handed to the driver.
#[derive(Clone)]
pub(crate) struct SimRegs(Arc<Mutex<RegFile>>);

impl SimRegs {
    fn file(&self) -> MutexGuard<'_, RegFile> {
        self.0.lock().unwrap()
    }
}

impl I2cRegisters for SimRegs {
    fn read(&self, reg: Reg) -> u8 {
        let mut file = self.file();
        if reg == Reg::Sda {
            file.update(Reg::St, |v| v & !St::SDAST.bits());
            return file.sda_in;
        }
        file.get(reg)
    }

    fn write(&mut self, reg: Reg, value: u8) {
        let mut file = self.file();
        file.writes += 1;
        match reg {
            Reg::Sda => {
                file.sda_writes.push(value);
                file.update(Reg::St, |v| v & !St::SDAST.bits());
            }
            Reg::St => file.update(Reg::St, |v| v & !(value & ST_W1C.bits())),
            Reg::Cst => {
                if value & Cst::BB.bits() != 0 {
                    file.bb_clears += 1;
                }
                file.update(Reg::Cst, |v| v & !(value & Cst::BB.bits()));
            }
            Reg::Ctl1 => {
                let ctl1 = Ctl1::from_bits_retain(value);
                if ctl1.contains(Ctl1::START) {
                    file.starts += 1;
                }
                if ctl1.contains(Ctl1::STOP) {
                    file.stops += 1;
                }
                if ctl1.contains(Ctl1::ACK) {
                    file.nacks += 1;
                }
                // STOP completes at once, ACK is a one-shot command.
                file.set(Reg::Ctl1, ctl1.difference(Ctl1::STOP | Ctl1::ACK).bits());
            }
            Reg::DmaCtrl => {
                let ctrl = DmaCtrl::from_bits_retain(value);
                if ctrl.contains(DmaCtrl::LAST_PEC) {
                    file.last_pec = true;
                }
                if ctrl.contains(DmaCtrl::DMA_EN) {
                    let len = u16::from_le_bytes([file.get(Reg::DataLen1), file.get(Reg::DataLen2)]);
                    file.dma = Some(DmaRequest {
                        addr: file.dma_addr,
                        len,
                        nack_last: file.last_pec,
                    });
                    file.last_pec = false;
                }
                file.update(Reg::DmaCtrl, |v| {
                    let mut stored = DmaCtrl::from_bits_retain(v) & DmaCtrl::DMA_IRQ;
                    if ctrl.contains(DmaCtrl::DMA_INT_CLR) {
                        stored.remove(DmaCtrl::DMA_IRQ);
                    }
                    (stored | (ctrl & (DmaCtrl::LAST_PEC | DmaCtrl::DMA_STALL))).bits()
                });
            }
            Reg::TimeoutSt => file.update(Reg::TimeoutSt, |v| {
                let flags = TimeoutSt::from_bits_retain(v) & TimeoutSt::FLAGS;
                let cleared = TimeoutSt::from_bits_retain(value) & TimeoutSt::FLAGS;
                (flags.difference(cleared) | (TimeoutSt::from_bits_retain(value) & TimeoutSt::ENABLES))
                    .bits()
            }),
            _ => file.set(reg, value),
        }
    }

    fn set_dma_address(&mut self, addr: usize) {
        let mut file = self.file();
        file.writes += 1;
        file.dma_addr = addr;
    }
}

/// The test's side of the wire.
pub(crate) struct Bus(Arc<Mutex<RegFile>>);

impl Bus {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(RegFile::new())))
    }

    pub(crate) fn regs(&self) -> SimRegs {
        SimRegs(Arc::clone(&self.0))
    }

    fn file(&self) -> MutexGuard<'_, RegFile> {
        self.0.lock().unwrap()
    }

    fn wait_for<Out>(&self, what: &str, mut f: impl FnMut(&mut RegFile) -> Option<Out>) -> Out {
        let started = Instant::now();
        loop {
            if let Some(out) = f(&mut self.file()) {
                return out;
            }
            assert!(started.elapsed() < BUS_WAIT, "bus: no {what}");
            std::thread::sleep(Duration::from_micros(50));
        }
    }

    /// Wait until the driver requests START and acknowledge it.
    pub(crate) fn take_start(&self) {
        self.wait_for("start", |file| {
            let ctl1 = Ctl1::from_bits_retain(file.get(Reg::Ctl1));
            ctl1.contains(Ctl1::START).then(|| {
                file.set(Reg::Ctl1, ctl1.difference(Ctl1::START).bits());
            })
        });
    }

    /// Wait for the next DMA transfer the driver starts.
    pub(crate) fn take_dma(&self) -> DmaRequest {
        self.wait_for("dma", |file| file.dma.take())
    }

    pub(crate) fn pending_dma(&self) -> Option<DmaRequest> {
        self.file().dma
    }

    pub(crate) fn raise(&self, bits: St) {
        self.file().update(Reg::St, |v| v | bits.bits());
    }

    pub(crate) fn raise_dma_irq(&self) {
        self.file()
            .update(Reg::DmaCtrl, |v| v | DmaCtrl::DMA_IRQ.bits());
    }

    pub(crate) fn raise_timeout(&self, flag: TimeoutSt) {
        self.file().update(Reg::TimeoutSt, |v| v | flag.bits());
    }

    pub(crate) fn set_transmitting(&self, transmitting: bool) {
        self.file().update(Reg::St, |v| {
            let mut st = St::from_bits_retain(v);
            st.set(St::XMIT, transmitting);
            st.bits()
        });
    }

    pub(crate) fn set_dma_count(&self, count: u16) {
        let [hi, lo] = count.to_be_bytes();
        let mut file = self.file();
        file.set(Reg::DataCnt1, hi);
        file.set(Reg::DataCnt2, lo);
    }

    pub(crate) fn set_sda_input(&self, byte: u8) {
        self.file().sda_in = byte;
    }

    /// Bytes the DMA engine would fetch from memory.
    pub(crate) fn read_mem(&self, addr: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        critical_section::with(|_| {
            // SAFETY: `addr` is a driver DMA buffer of at least `len` bytes
            // and the driver does not touch it inside a critical section.
            unsafe { core::ptr::copy_nonoverlapping(addr as *const u8, out.as_mut_ptr(), len) }
        });
        out
    }

    /// Bytes the DMA engine stores into memory.
    pub(crate) fn write_mem(&self, addr: usize, bytes: &[u8]) {
        critical_section::with(|_| {
            // SAFETY: see `read_mem`.
            unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), addr as *mut u8, bytes.len()) }
        });
    }

    pub(crate) fn reg(&self, reg: Reg) -> u8 {
        self.file().get(reg)
    }

    pub(crate) fn status(&self) -> St {
        St::from_bits_retain(self.reg(Reg::St))
    }

    pub(crate) fn ctl1(&self) -> Ctl1 {
        Ctl1::from_bits_retain(self.reg(Reg::Ctl1))
    }

    pub(crate) fn dma_ctrl(&self) -> DmaCtrl {
        DmaCtrl::from_bits_retain(self.reg(Reg::DmaCtrl))
    }

    pub(crate) fn timeout_status(&self) -> TimeoutSt {
        TimeoutSt::from_bits_retain(self.reg(Reg::TimeoutSt))
    }

    pub(crate) fn sda_writes(&self) -> Vec<u8> {
        self.file().sda_writes.clone()
    }

    pub(crate) fn starts(&self) -> usize {
        self.file().starts
    }

    pub(crate) fn stops(&self) -> usize {
        self.file().stops
    }

    pub(crate) fn nacks(&self) -> usize {
        self.file().nacks
    }

    pub(crate) fn bus_busy_cleared(&self) -> bool {
        self.file().bb_clears > 0
    }

    pub(crate) fn register_writes(&self) -> usize {
        self.file().writes
    }
}

/// Controller initialised on a 48 MHz source clock.
pub(crate) fn new_controller<'a>(config: I2cConfig) -> (SimController<'a>, Bus) {
    let bus = Bus::new();
    let mut ctrl = Npcm4xxI2c::new(bus.regs(), config, StdDelay, NoOpLogger);
    ctrl.init(&mut MockClock::new(48_000_000)).unwrap();
    (ctrl, bus)
}

/// Target that records every callback.
#[derive(Debug, Default)]
pub(crate) struct RecordingTarget {
    pub(crate) received: Vec<u8>,
    pub(crate) write_requests: usize,
    pub(crate) stops: usize,
    pub(crate) declined: usize,
    capacity: Option<usize>,
    reply: Vec<u8>,
    reply_pos: usize,
}

impl RecordingTarget {
    pub(crate) fn with_reply(reply: &[u8]) -> Self {
        Self {
            reply: reply.to_vec(),
            ..Self::default()
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }
}

impl I2cTarget for RecordingTarget {
    fn write_requested(&mut self) {
        self.write_requests += 1;
    }

    fn write_received(&mut self, byte: u8) -> Result<(), Declined> {
        if self.capacity.is_some_and(|cap| self.received.len() >= cap) {
            self.declined += 1;
            return Err(Declined);
        }
        self.received.push(byte);
        Ok(())
    }

    fn read_requested(&mut self, byte: &mut u8) -> Result<(), Declined> {
        self.reply_pos = 0;
        self.read_processed(byte)
    }

    fn read_processed(&mut self, byte: &mut u8) -> Result<(), Declined> {
        let next = self.reply.get(self.reply_pos).ok_or(Declined)?;
        *byte = *next;
        self.reply_pos += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}
