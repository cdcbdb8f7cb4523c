// Licensed under the Apache-2.0 license

//! Register map and bus primitives of the NPCM4xx SMBus controller.
//!
//! The types here only describe registers and the command sequences built
//! from them. All hardware access goes through [`I2cRegisters`], which a
//! memory-mapped block ([`Npcm4xxRegisterBlock`]) or a test double implements.

use bitflags::bitflags;

/// Polls of the stop bit before an abort gives up waiting for the bus.
pub const ABORT_TIMEOUT: u16 = 10_000;

/// Byte sent by a slave that has run out of reply data.
pub const SLAVE_FILLER_BYTE: u8 = 0xFF;

macro_rules! register_map {
    ($($name:ident => $offset:literal),* $(,)?) => {
        paste::paste! {
            /// Provides the register offset from the controller base address.
            pub mod offsets {
                $(pub const [<$name:snake:upper>]: usize = $offset;)*
            }

            /// Byte-wide registers of one controller instance.
            #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
            pub enum Reg {
                $($name,)*
            }

            impl Reg {
                #[must_use]
                pub const fn offset(self) -> usize {
                    match self {
                        $(Reg::$name => offsets::[<$name:snake:upper>],)*
                    }
                }
            }
        }
    };
}

register_map! {
    Sda => 0x00,
    St => 0x02,
    Cst => 0x04,
    Ctl1 => 0x06,
    Addr1 => 0x08,
    Ctl2 => 0x0A,
    Ctl3 => 0x0E,
    TimeoutSt => 0x10,
    TimeoutEn => 0x12,
    TimeoutCtl1 => 0x14,
    TimeoutCtl2 => 0x16,
    Ctl4 => 0x1A,
    SclLt => 0x1C,
    SclHt => 0x1E,
    DmaAddr1 => 0x40,
    DmaAddr2 => 0x41,
    DmaAddr3 => 0x42,
    DmaAddr4 => 0x43,
    DataLen1 => 0x44,
    DataLen2 => 0x45,
    DataCnt1 => 0x46,
    DataCnt2 => 0x47,
    DmaCtrl => 0x48,
}

bitflags! {
    /// SMBnST, status. Every bit except `XMIT`, `MASTER` and `SDAST` is
    /// write-1-to-clear.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct St: u8 {
        /// Direction of the current transfer, set while transmitting.
        const XMIT = 1 << 0;
        const MASTER = 1 << 1;
        /// Own slave address matched.
        const NMATCH = 1 << 2;
        /// Clock stalled after the address byte.
        const STASTR = 1 << 3;
        const NEGACK = 1 << 4;
        const BER = 1 << 5;
        /// SDA data register ready.
        const SDAST = 1 << 6;
        const SLVSTP = 1 << 7;
    }
}

bitflags! {
    /// SMBnCST, control and status.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Cst: u8 {
        const BUSY = 1 << 0;
        /// Bus busy, write-1-to-clear.
        const BB = 1 << 1;
        const MATCH = 1 << 2;
        const GCMATCH = 1 << 3;
    }
}

bitflags! {
    /// SMBnCTL1, control.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Ctl1: u8 {
        const START = 1 << 0;
        const STOP = 1 << 1;
        const INTEN = 1 << 2;
        const EOBINTE = 1 << 3;
        const ACK = 1 << 4;
        const GCMEN = 1 << 5;
        const NMINTE = 1 << 6;
        const STASTRE = 1 << 7;
    }
}

impl Ctl1 {
    /// Command bits that act on write and must not be echoed back by a
    /// read-modify-write.
    pub const COMMANDS: Self = Self::START.union(Self::STOP).union(Self::ACK);
    /// Bits kept across a module reset.
    pub const PRESERVED_ON_RESET: Self = Self::INTEN
        .union(Self::EOBINTE)
        .union(Self::GCMEN)
        .union(Self::NMINTE);
}

bitflags! {
    /// SMBnCTL2, module enable and SCL frequency bits 6..0.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Ctl2: u8 {
        const ENABLE = 1 << 0;
        const SCLFRQ6_0 = 0x7F << 1;
    }
}

bitflags! {
    /// SMBnCTL3, SCL frequency bits 8..7 and fast mode select.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Ctl3: u8 {
        const SCLFRQ8_7 = 0x03;
        const ARPMEN = 1 << 2;
        const IDL_START = 1 << 3;
        /// Fast mode and fast mode plus.
        const FAST_MODE = 1 << 4;
        const BNK_SEL = 1 << 5;
        const SDA_LVL = 1 << 6;
        const SCL_LVL = 1 << 7;
    }
}

bitflags! {
    /// SMBnADDR1, own slave address.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Addr: u8 {
        const ADDR = 0x7F;
        const SAEN = 1 << 7;
    }
}

bitflags! {
    /// DMA_CTRL.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct DmaCtrl: u8 {
        const DMA_INT_CLR = 1 << 0;
        const DMA_EN = 1 << 1;
        /// NACK the last received byte.
        const LAST_PEC = 1 << 2;
        const DMA_STALL = 1 << 3;
        const DMA_IRQ = 1 << 7;
    }
}

bitflags! {
    /// TIMEOUT_EN, cumulative timeout enable and its clock divider.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct TimeoutEn: u8 {
        const TIMEOUT_EN = 1 << 0;
        const TO_CKDIV = 0x3F << 2;
    }
}

bitflags! {
    /// TIMEOUT_ST. The `T_OUTST` flags are write-1-to-clear.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct TimeoutSt: u8 {
        /// Cumulative clock-low timeout fired.
        const T_OUTST1 = 1 << 0;
        /// Cumulative clock-cycle timeout fired.
        const T_OUTST2 = 1 << 1;
        const T_OUTST1_EN = 1 << 6;
        const T_OUTST2_EN = 1 << 7;
    }
}

impl TimeoutSt {
    pub const FLAGS: Self = Self::T_OUTST1.union(Self::T_OUTST2);
    pub const ENABLES: Self = Self::T_OUTST1_EN.union(Self::T_OUTST2_EN);
}

/// Shift of the timeout clock divider inside `TIMEOUT_EN`.
pub const TO_CKDIV_SHIFT: u8 = 2;
/// Shift of SCL frequency bits 6..0 inside `SMBnCTL2`.
pub const SCLFRQ6_0_SHIFT: u8 = 1;

/// Register file of one controller instance.
///
/// Implementors provide byte access; everything else is built on top.
pub trait I2cRegisters {
    fn read(&self, reg: Reg) -> u8;

    fn write(&mut self, reg: Reg, value: u8);

    fn modify<F: FnOnce(u8) -> u8>(&mut self, reg: Reg, f: F) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    /// Bus address the DMA engine transfers to or from.
    fn set_dma_address(&mut self, addr: usize) {
        // The engine takes a 32-bit bus address.
        #[allow(clippy::cast_possible_truncation)]
        let addr = addr as u32;
        let [a1, a2, a3, a4] = addr.to_le_bytes();
        self.write(Reg::DmaAddr1, a1);
        self.write(Reg::DmaAddr2, a2);
        self.write(Reg::DmaAddr3, a3);
        self.write(Reg::DmaAddr4, a4);
    }

    fn set_dma_length(&mut self, len: u16) {
        let [lo, hi] = len.to_le_bytes();
        self.write(Reg::DataLen1, lo);
        self.write(Reg::DataLen2, hi);
    }

    /// Bytes moved by the last DMA transfer. `DATA_CNT1` holds the high byte.
    fn dma_count(&self) -> u16 {
        u16::from_be_bytes([self.read(Reg::DataCnt1), self.read(Reg::DataCnt2)])
    }

    fn status(&self) -> St {
        St::from_bits_retain(self.read(Reg::St))
    }

    fn clear_status(&mut self, bits: St) {
        self.write(Reg::St, bits.bits());
    }

    fn dma_ctrl(&self) -> DmaCtrl {
        DmaCtrl::from_bits_retain(self.read(Reg::DmaCtrl))
    }

    fn timeout_status(&self) -> TimeoutSt {
        TimeoutSt::from_bits_retain(self.read(Reg::TimeoutSt))
    }

    /// Clear a fired timeout flag, keeping the enables.
    fn clear_timeout_flag(&mut self, flag: TimeoutSt) {
        self.modify(Reg::TimeoutSt, |v| {
            (TimeoutSt::from_bits_retain(v) & TimeoutSt::ENABLES | flag).bits()
        });
    }

    fn set_ctl1_command(&mut self, command: Ctl1) {
        self.modify(Reg::Ctl1, |v| {
            (Ctl1::from_bits_retain(v).difference(Ctl1::COMMANDS) | command).bits()
        });
    }

    /// Request a START, only valid in master mode or when requesting it.
    fn start(&mut self) {
        self.set_ctl1_command(Ctl1::START);
    }

    fn stop(&mut self) {
        self.set_ctl1_command(Ctl1::STOP);
    }

    fn enable_stall(&mut self) {
        self.set_ctl1_command(Ctl1::STASTRE);
    }

    fn disable_stall(&mut self) {
        self.modify(Reg::Ctl1, |v| {
            Ctl1::from_bits_retain(v)
                .difference(Ctl1::COMMANDS | Ctl1::STASTRE)
                .bits()
        });
    }

    fn nack(&mut self) {
        self.set_ctl1_command(Ctl1::ACK);
    }

    fn write_data(&mut self, byte: u8) {
        self.write(Reg::Sda, byte);
    }

    fn read_data(&mut self) -> u8 {
        self.read(Reg::Sda)
    }

    fn start_dma(&mut self, addr: usize, len: u16) {
        self.set_dma_address(addr);
        self.set_dma_length(len);
        self.write(Reg::DmaCtrl, DmaCtrl::DMA_INT_CLR.bits());
        self.write(Reg::DmaCtrl, DmaCtrl::DMA_EN.bits());
    }

    /// NACK the byte that completes the next receive DMA.
    fn dma_nack_last_byte(&mut self) {
        self.modify(Reg::DmaCtrl, |v| {
            (DmaCtrl::from_bits_retain(v).difference(DmaCtrl::DMA_INT_CLR) | DmaCtrl::LAST_PEC)
                .bits()
        });
    }

    fn clear_dma_irq(&mut self) {
        self.write(Reg::DmaCtrl, DmaCtrl::DMA_INT_CLR.bits());
    }

    fn enable_module(&mut self) {
        self.modify(Reg::Ctl2, |v| (Ctl2::from_bits_retain(v) | Ctl2::ENABLE).bits());
    }

    /// Disable and re-enable the module, dropping any bus activity but
    /// keeping interrupt enables and the timeout configuration.
    fn reset_module(&mut self) {
        let ctl1 = Ctl1::from_bits_retain(self.read(Reg::Ctl1));
        let timeout_en = self.read(Reg::TimeoutEn);

        self.modify(Reg::Ctl2, |v| {
            Ctl2::from_bits_retain(v).difference(Ctl2::ENABLE).bits()
        });
        self.enable_module();

        self.write(Reg::Ctl1, (ctl1 & Ctl1::PRESERVED_ON_RESET).bits());
        self.write(Reg::TimeoutEn, timeout_en);
    }

    /// Stop the current transaction and release the bus.
    fn abort_data(&mut self) {
        self.stop();
        self.clear_status(St::STASTR | St::NEGACK | St::BER);

        let mut polls = ABORT_TIMEOUT;
        while polls > 0 {
            if !Ctl1::from_bits_retain(self.read(Reg::Ctl1)).contains(Ctl1::STOP) {
                break;
            }
            polls -= 1;
        }

        self.write(Reg::Cst, Cst::BB.bits());
    }

    fn set_slave_address(&mut self, addr: u8) {
        self.write(Reg::Addr1, (Addr::from_bits_truncate(addr) | Addr::SAEN).bits());
        self.modify(Reg::Ctl1, |v| {
            (Ctl1::from_bits_retain(v).difference(Ctl1::COMMANDS) | Ctl1::NMINTE).bits()
        });
    }

    fn clear_slave_address(&mut self) {
        self.write(Reg::Addr1, 0);
        self.modify(Reg::Ctl1, |v| {
            Ctl1::from_bits_retain(v)
                .difference(Ctl1::COMMANDS | Ctl1::NMINTE)
                .bits()
        });
    }

    fn enable_hw_timeout(&mut self) {
        self.modify(Reg::TimeoutEn, |v| {
            (TimeoutEn::from_bits_retain(v) | TimeoutEn::TIMEOUT_EN).bits()
        });
    }

    fn disable_hw_timeout(&mut self) {
        self.modify(Reg::TimeoutEn, |v| {
            TimeoutEn::from_bits_retain(v)
                .difference(TimeoutEn::TIMEOUT_EN)
                .bits()
        });
    }
}

/// Memory-mapped register block of one controller.
pub struct Npcm4xxRegisterBlock {
    base: usize,
}

impl Npcm4xxRegisterBlock {
    /// # Safety
    ///
    /// `base` must be the address of an SMBus controller register block that
    /// nothing else accesses for the lifetime of the returned value.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl I2cRegisters for Npcm4xxRegisterBlock {
    fn read(&self, reg: Reg) -> u8 {
        // SAFETY: `new` guarantees an exclusively owned, mapped register block.
        unsafe { core::ptr::read_volatile((self.base + reg.offset()) as *const u8) }
    }

    fn write(&mut self, reg: Reg, value: u8) {
        // SAFETY: `new` guarantees an exclusively owned, mapped register block.
        unsafe { core::ptr::write_volatile((self.base + reg.offset()) as *mut u8, value) }
    }
}
