// Licensed under the Apache-2.0 license

use std::cell::{Ref, RefCell};

use ipecc_emu_bus::{AccessSize, Bus};

/// An MMIO implementation that reads and writes to an `ipecc_emu_bus::Bus`.
pub struct BusMmio<TBus: Bus> {
    bus: RefCell<TBus>,
}
impl<TBus: Bus> BusMmio<TBus> {
    pub fn new(bus: TBus) -> Self {
        Self {
            bus: RefCell::new(bus),
        }
    }

    /// Shared access to the underlying bus, for inspecting model state.
    ///
    /// # Panics
    ///
    /// Panics if called while a bus access is in progress.
    pub fn bus(&self) -> Ref<'_, TBus> {
        self.bus.borrow()
    }

    /// Run `f` with exclusive access to the underlying bus.
    pub fn with_bus<R>(&self, f: impl FnOnce(&mut TBus) -> R) -> R {
        f(&mut self.bus.borrow_mut())
    }

    pub fn into_inner(self) -> TBus {
        self.bus.into_inner()
    }

    fn read(&self, size: AccessSize, offset: usize) -> u64 {
        match self.bus.borrow_mut().read(size, offset as u32) {
            Ok(val) => val,
            Err(e) => panic!("IPECC bus read of {offset:#05x} faulted: {e:?}"),
        }
    }

    fn write(&self, size: AccessSize, offset: usize, val: u64) {
        if let Err(e) = self.bus.borrow_mut().write(size, offset as u32, val) {
            panic!("IPECC bus write of {val:#x} to {offset:#05x} faulted: {e:?}");
        }
    }
}

impl<TBus: Bus> ipecc_registers::Mmio for BusMmio<TBus> {
    /// Loads the 32-bit word at `offset` on the bus.
    ///
    /// # Panics
    ///
    /// This function panics if the bus faults.
    fn read_u32(&self, offset: usize) -> u32 {
        self.read(AccessSize::Word, offset) as u32
    }

    /// Stores `val` at `offset` on the bus.
    ///
    /// # Panics
    ///
    /// This function panics if the bus faults.
    fn write_u32(&self, offset: usize, val: u32) {
        self.write(AccessSize::Word, offset, u64::from(val))
    }

    /// Loads the 64-bit word at `offset` on the bus.
    ///
    /// # Panics
    ///
    /// This function panics if the bus faults.
    fn read_u64(&self, offset: usize) -> u64 {
        self.read(AccessSize::DoubleWord, offset)
    }

    /// Stores `val` at `offset` on the bus.
    ///
    /// # Panics
    ///
    /// This function panics if the bus faults.
    fn write_u64(&self, offset: usize, val: u64) {
        self.write(AccessSize::DoubleWord, offset, val)
    }
}

#[cfg(test)]
mod tests {
    use ipecc_emu_bus::testing::FakeBus;
    use ipecc_emu_bus::BusError;
    use ipecc_registers::Mmio;

    use super::*;

    #[test]
    fn test_bus_mmio() {
        let mut fake_bus = FakeBus::new();
        fake_bus.set_read_value(0x018, 0x100);
        fake_bus.set_read_value(0x008, 0x0000_0001_dead_beef);
        let mmio = BusMmio::new(fake_bus);

        mmio.write_u32(0x050, 0x0400_0000);
        mmio.write_u64(0x008, 0x1122_3344_5566_7788);
        assert_eq!(mmio.read_u32(0x018), 0x100);
        assert_eq!(mmio.read_u64(0x008), 0x0000_0001_dead_beef);
        assert_eq!(mmio.read_u32(0x008), 0xdead_beef);

        assert_eq!(
            mmio.into_inner().log.take(),
            vec![
                "write(Word, 0x050, 0x4000000)",
                "write(DoubleWord, 0x008, 0x1122334455667788)",
                "read(Word, 0x018)",
                "read(DoubleWord, 0x008)",
                "read(Word, 0x008)",
            ]
        );
    }

    #[test]
    #[should_panic(expected = "faulted")]
    fn test_bus_mmio_fault_panics() {
        let mut fake_bus = FakeBus::new();
        fake_bus.read_result = Err(BusError::LoadAccessFault);
        BusMmio::new(fake_bus).read_u32(0x1f8);
    }
}
