/*++

Licensed under the Apache-2.0 license.

File Name:

    fake_bus.rs

Abstract:

    File contains code for a fake implementation of the Bus trait.

--*/
use std::collections::HashMap;

use crate::{testing::Log, AccessSize, Bus, BusAddr, BusData, BusError};

/// A Bus implementation that logs all calls, and allows the user to choose
/// the value returned by reads, either per address or globally.
///
/// # Example
///
/// ```
/// use ipecc_emu_bus::{testing::FakeBus, AccessSize, Bus};
///
/// let mut fake_bus = FakeBus::new();
/// fake_bus.set_read_value(0x018, 256);
/// assert_eq!(fake_bus.read(AccessSize::Word, 0x018), Ok(256));
/// assert_eq!(fake_bus.read(AccessSize::Word, 0x000), Ok(0));
/// assert_eq!(
///     fake_bus.log.take(),
///     vec!["read(Word, 0x018)", "read(Word, 0x000)"]
/// );
/// ```
pub struct FakeBus {
    pub log: Log,
    pub read_result: Result<BusData, BusError>,
    pub write_result: Result<(), BusError>,
    read_values: HashMap<BusAddr, BusData>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            log: Log::new(),
            read_result: Ok(0),
            write_result: Ok(()),
            read_values: HashMap::new(),
        }
    }

    /// Make every subsequent read of `addr` return `val`.
    pub fn set_read_value(&mut self, addr: BusAddr, val: BusData) {
        self.read_values.insert(addr, val);
    }
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for FakeBus {
    fn read(&mut self, size: AccessSize, addr: BusAddr) -> Result<BusData, BusError> {
        self.log.push(format_args!("read({size:?}, {addr:#05x})"));
        match self.read_values.get(&addr) {
            Some(val) => Ok(*val),
            None => self.read_result,
        }
    }

    fn write(&mut self, size: AccessSize, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        self.log
            .push(format_args!("write({size:?}, {addr:#05x}, {val:#x})"));
        self.write_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_bus() {
        let mut fake_bus = FakeBus::new();

        assert_eq!(fake_bus.read(AccessSize::Word, 0x010), Ok(0));
        assert_eq!(vec!["read(Word, 0x010)"], fake_bus.log.take());

        assert_eq!(
            fake_bus.write(AccessSize::DoubleWord, 0x008, 0x1234_5678_0000_0000),
            Ok(())
        );
        assert_eq!(
            vec!["write(DoubleWord, 0x008, 0x1234567800000000)"],
            fake_bus.log.take()
        );

        fake_bus.set_read_value(0x018, 0x100);
        fake_bus.read_result = Err(BusError::LoadAccessFault);
        assert_eq!(fake_bus.read(AccessSize::Word, 0x018), Ok(0x100));
        assert_eq!(
            fake_bus.read(AccessSize::Word, 0x1f8),
            Err(BusError::LoadAccessFault)
        );
        assert_eq!(
            vec!["read(Word, 0x018)", "read(Word, 0x1f8)"],
            fake_bus.log.take()
        );

        fake_bus.write_result = Err(BusError::StoreAccessFault);
        assert_eq!(
            fake_bus.write(AccessSize::Word, 0x068, 0x1),
            Err(BusError::StoreAccessFault)
        );
        assert_eq!(vec!["write(Word, 0x068, 0x1)"], fake_bus.log.take());
    }
}
