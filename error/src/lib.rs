/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains API and macros used by the IPECC driver for error handling

--*/
#![cfg_attr(not(any(test, feature = "std")), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// IPECC Error Type
/// Derives debug, copy, clone, eq, and partial eq
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IpeccError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: IpeccError = IpeccError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl IpeccError {
    /// Mask of the hardware error latch carried in the low bits of a
    /// `DRIVER_IPECC_HW_STATUS` error.
    pub const HW_STATUS_MASK: u32 = 0xffff;

    /// Create an IPECC error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get an IpeccError from a u32 is to
    /// use `IpeccError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("IpeccError cannot be 0"),
        }
    }

    define_error_constants![
        (
            DRIVER_IPECC_HW_STATUS,
            0x0001_0000,
            "IP latched one or more errors in R_STATUS (bits carried in the low 16 bits)"
        ),
        (
            DRIVER_IPECC_BIGNUM_TOO_LARGE,
            0x0002_0001,
            "Big number is larger than the current nn"
        ),
        (
            DRIVER_IPECC_OUTPUT_BUFFER_TOO_SMALL,
            0x0002_0002,
            "Output buffer cannot hold ceil(nn / 8) bytes"
        ),
        (
            DRIVER_IPECC_NN_TOO_LARGE,
            0x0002_0003,
            "Requested nn exceeds the NNMAX capability of the IP"
        ),
        (
            DRIVER_IPECC_BLINDING_SIZE_INVALID,
            0x0002_0004,
            "Blinding size must be strictly less than nn"
        ),
        (
            DRIVER_IPECC_ZREMASK_PERIOD_INVALID,
            0x0002_0005,
            "Z-remask period must be in 1..=0x10000"
        ),
        (
            DRIVER_IPECC_SHUFFLE_NOT_SUPPORTED,
            0x0002_0006,
            "IP was not synthesized with the shuffling countermeasure"
        ),
        (
            DRIVER_IPECC_DEBUG_ONLY,
            0x0002_0007,
            "Operation is only available on an IP synthesized in debug mode"
        ),
        (
            DRIVER_IPECC_TOKEN_SIZE_MISMATCH,
            0x0002_0008,
            "Masked buffer and token have different sizes"
        ),
        (
            DRIVER_IPECC_DEVICE_UNRESPONSIVE,
            0x0002_0009,
            "IP did not reach the polled state within the configured poll limit"
        ),
        (
            DRIVER_IPECC_TRACE_UNEXPECTED_HALT,
            0x0002_000a,
            "IP halted at a PC or FSM state other than the armed breakpoint"
        ),
        (
            DRIVER_IPECC_TRACE_STEP_LIMIT,
            0x0002_000b,
            "Traced [k]P did not reach the curve-check exit within the step limit"
        ),
        (
            DRIVER_IPECC_INVALID_BREAKPOINT_ID,
            0x0002_000c,
            "Breakpoint identifier must be in 0..=3"
        ),
        (
            DRIVER_IPECC_SMALL_SCALAR_SIZE_INVALID,
            0x0002_000d,
            "Small scalar size must be in 1..=0xffff"
        ),
        (
            DRIVER_IPECC_OPCODE_ADDR_INVALID,
            0x0002_000e,
            "Microcode patch address is beyond the IP instruction memory"
        ),
    ];

    /// Build the error reported when the IP latched `bits` in its status
    /// register.
    ///
    /// # Arguments
    ///
    /// * `bits` - Error bits read from `R_STATUS.ERRID`
    pub fn from_hw_status(bits: u32) -> Self {
        Self(Self::DRIVER_IPECC_HW_STATUS.0 | (bits & Self::HW_STATUS_MASK))
    }

    /// Returns the latched hardware error bits if this error originates from
    /// the IP status register.
    pub fn hw_status_bits(self) -> Option<u32> {
        let val = self.0.get();
        if val & !Self::HW_STATUS_MASK == Self::DRIVER_IPECC_HW_STATUS.0.get() {
            Some(val & Self::HW_STATUS_MASK)
        } else {
            None
        }
    }
}

impl core::fmt::Display for IpeccError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.hw_status_bits() {
            Some(bits) => write!(f, "IPECC hardware error (status bits {bits:#06x})"),
            None => write!(f, "IPECC driver error {:#010x}", self.0.get()),
        }
    }
}

impl From<core::num::NonZeroU32> for crate::IpeccError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::IpeccError(val)
    }
}

impl From<IpeccError> for core::num::NonZeroU32 {
    fn from(val: IpeccError) -> Self {
        val.0
    }
}

impl From<IpeccError> for u32 {
    fn from(val: IpeccError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for IpeccError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(IpeccError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type IpeccResult<T> = Result<T, IpeccError>;
