/*++

Licensed under the Apache-2.0 license.

File Name:

    regs.rs

Abstract:

    File contains the register block of the IPECC: control register and
    big-number word accesses over an `Mmio` transport, in the word layout
    the IP was synthesized with.

--*/

use ipecc_registers::Mmio;

/// Width of every register access and of the big-number words moved
/// through `W_WRITE_DATA` / `R_READ_DATA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordLayout {
    /// 32-bit accesses
    W32,

    /// 64-bit accesses. The interconnect swaps the two 32-bit halves of
    /// every slot, in both directions.
    W64,
}

impl WordLayout {
    /// Number of bytes in a big-number word.
    pub const fn word_bytes(self) -> usize {
        match self {
            WordLayout::W32 => 4,
            WordLayout::W64 => 8,
        }
    }
}

pub(crate) struct RegisterBlock<M: Mmio> {
    mmio: M,
    layout: WordLayout,
}

impl<M: Mmio> RegisterBlock<M> {
    pub fn new(mmio: M, layout: WordLayout) -> Self {
        Self { mmio, layout }
    }

    pub fn layout(&self) -> WordLayout {
        self.layout
    }

    pub fn mmio(&self) -> &M {
        &self.mmio
    }

    pub fn into_mmio(self) -> M {
        self.mmio
    }

    /// Reads the 32-bit register at `offset`.
    pub fn read(&self, offset: usize) -> u32 {
        self.read_word(offset) as u32
    }

    /// Writes the 32-bit register at `offset`.
    pub fn write(&self, offset: usize, val: u32) {
        self.write_word(offset, u64::from(val))
    }

    /// Reads a full word at `offset`.
    pub fn read_word(&self, offset: usize) -> u64 {
        let val = match self.layout {
            WordLayout::W32 => u64::from(self.mmio.read_u32(offset)),
            WordLayout::W64 => self.mmio.read_u64(offset).rotate_left(32),
        };
        log::trace!("ipecc: read {offset:#05x} -> {val:#x}");
        val
    }

    /// Writes a full word at `offset`. Only the low 32 bits are transferred
    /// with the 32-bit layout.
    pub fn write_word(&self, offset: usize, val: u64) {
        log::trace!("ipecc: write {offset:#05x} <- {val:#x}");
        match self.layout {
            WordLayout::W32 => self.mmio.write_u32(offset, val as u32),
            WordLayout::W64 => self.mmio.write_u64(offset, val.rotate_left(32)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipecc_emu_bus::testing::FakeBus;
    use ipecc_hw_model::mmio::BusMmio;

    #[test]
    fn test_w32_passthrough() {
        let mut fake_bus = FakeBus::new();
        fake_bus.set_read_value(0x018, 0x100);
        let log = fake_bus.log.clone();
        let regs = RegisterBlock::new(BusMmio::new(fake_bus), WordLayout::W32);

        assert_eq!(regs.read(0x018), 0x100);
        regs.write(0x020, 0x180);
        regs.write_word(0x008, 0x1122_3344_5566_7788);
        assert_eq!(
            log.take(),
            vec![
                "read(Word, 0x018)",
                "write(Word, 0x020, 0x180)",
                "write(Word, 0x008, 0x55667788)",
            ]
        );
    }

    #[test]
    fn test_w64_swaps_halves() {
        let mut fake_bus = FakeBus::new();
        fake_bus.set_read_value(0x018, 0x100 << 32);
        fake_bus.set_read_value(0x008, 0x5566_7788_1122_3344);
        let log = fake_bus.log.clone();
        let regs = RegisterBlock::new(BusMmio::new(fake_bus), WordLayout::W64);

        assert_eq!(regs.read(0x018), 0x100);
        assert_eq!(regs.read_word(0x008), 0x1122_3344_5566_7788);
        regs.write(0x020, 0x180);
        regs.write_word(0x008, 0x1122_3344_5566_7788);
        assert_eq!(
            log.take(),
            vec![
                "read(DoubleWord, 0x018)",
                "read(DoubleWord, 0x008)",
                "write(DoubleWord, 0x020, 0x18000000000)",
                "write(DoubleWord, 0x008, 0x5566778811223344)",
            ]
        );
        assert_eq!(WordLayout::W64.word_bytes(), 8);
    }
}
