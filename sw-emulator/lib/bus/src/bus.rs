/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains definition of the Bus trait used to reach emulated
    peripheral registers.

--*/

/// Byte offset of a register on the bus.
pub type BusAddr = u32;

/// Register value; 32-bit accesses use the low half.
pub type BusData = u64;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessSize {
    /// 32-bit access
    Word,

    /// 64-bit access
    DoubleWord,
}

impl AccessSize {
    pub fn bytes(self) -> usize {
        match self {
            AccessSize::Word => 4,
            AccessSize::DoubleWord => 8,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusError {
    /// Load address misaligned
    LoadAddrMisaligned,

    /// Load from an address with no readable register
    LoadAccessFault,

    /// Store address misaligned
    StoreAddrMisaligned,

    /// Store to an address with no writable register
    StoreAccessFault,
}

/// Represents an abstract register bus. Used to read and write peripheral
/// registers.
pub trait Bus {
    /// Read data of specified size from given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    /// * `addr` - Address to read from
    ///
    /// # Error
    ///
    /// * `BusError` - `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&mut self, size: AccessSize, addr: BusAddr) -> Result<BusData, BusError>;

    /// Write data of specified size to given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the write
    /// * `addr` - Address to write
    /// * `val` - Data to write
    ///
    /// # Error
    ///
    /// * `BusError` - `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, size: AccessSize, addr: BusAddr, val: BusData) -> Result<(), BusError>;

    /// This method is used to notify peripherals of the passage of time. The
    /// owner of this bus MAY call this function periodically.
    fn poll(&mut self) {
        // By default, do nothing
    }
}

impl<T: Bus + ?Sized> Bus for Box<T> {
    fn read(&mut self, size: AccessSize, addr: BusAddr) -> Result<BusData, BusError> {
        T::read(self, size, addr)
    }

    fn write(&mut self, size: AccessSize, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        T::write(self, size, addr, val)
    }

    fn poll(&mut self) {
        T::poll(self)
    }
}

/// Checks that `addr` is aligned for an access of `size`.
pub fn check_alignment(size: AccessSize, addr: BusAddr, err: BusError) -> Result<(), BusError> {
    if addr as usize % size.bytes() != 0 {
        return Err(err);
    }
    Ok(())
}
