/*++

Licensed under the Apache-2.0 license.

File Name:

    mmio.rs

Abstract:

    File contains the transport trait used to reach the IPECC register
    slots, and its implementation over a raw memory mapping.

--*/

/// Access to the 64-bit aligned register slots of one IPECC instance.
///
/// Offsets are byte offsets from the IP base address. Implementations do
/// not interpret the values; word-layout normalization is done by the
/// driver.
pub trait Mmio {
    /// Loads the 32-bit word at `offset`.
    fn read_u32(&self, offset: usize) -> u32;

    /// Stores the 32-bit word `val` at `offset`.
    fn write_u32(&self, offset: usize, val: u32);

    /// Loads the 64-bit word at `offset`.
    fn read_u64(&self, offset: usize) -> u64;

    /// Stores the 64-bit word `val` at `offset`.
    fn write_u64(&self, offset: usize, val: u64);
}

impl<T: Mmio + ?Sized> Mmio for &T {
    fn read_u32(&self, offset: usize) -> u32 {
        (**self).read_u32(offset)
    }
    fn write_u32(&self, offset: usize, val: u32) {
        (**self).write_u32(offset, val)
    }
    fn read_u64(&self, offset: usize) -> u64 {
        (**self).read_u64(offset)
    }
    fn write_u64(&self, offset: usize, val: u64) {
        (**self).write_u64(offset, val)
    }
}

/// Volatile accesses through a pointer to the mapped register window.
pub struct RealMmio {
    base: *mut u8,
}

impl RealMmio {
    /// Create a transport over the register window starting at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to a mapping of the IPECC register window that is
    /// at least `0x200` bytes long, 8-byte aligned, and stays mapped for the
    /// lifetime of the returned value. No other code may access the window
    /// concurrently.
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

impl Mmio for RealMmio {
    fn read_u32(&self, offset: usize) -> u32 {
        // SAFETY: window validity is guaranteed by the caller of `new`.
        unsafe { core::ptr::read_volatile(self.base.add(offset) as *const u32) }
    }

    fn write_u32(&self, offset: usize, val: u32) {
        // SAFETY: window validity is guaranteed by the caller of `new`.
        unsafe { core::ptr::write_volatile(self.base.add(offset) as *mut u32, val) }
    }

    fn read_u64(&self, offset: usize) -> u64 {
        // SAFETY: window validity is guaranteed by the caller of `new`.
        unsafe { core::ptr::read_volatile(self.base.add(offset) as *const u64) }
    }

    fn write_u64(&self, offset: usize, val: u64) {
        // SAFETY: window validity is guaranteed by the caller of `new`.
        unsafe { core::ptr::write_volatile(self.base.add(offset) as *mut u64, val) }
    }
}
