/*++

Licensed under the Apache-2.0 license.

File Name:

    countermeasures.rs

Abstract:

    File contains the side-channel countermeasure configuration of the
    IPECC: scalar blinding, shuffling, periodic Z-remasking, and the
    debug-only XY-shuffle, AXI-mask and token toggles.

--*/

use crate::Ipecc;
use ipecc_error::{IpeccError, IpeccResult};
use ipecc_registers::{w, Blinding, Mmio, Zremask};

/// Largest Z-remask period, in ladder steps.
const ZREMASK_PERIOD_MAX: u32 = 0x1_0000;

impl<M: Mmio> Ipecc<M> {
    /// Blinds the scalar of every following [k]P with a random number of
    /// `bits` bits. `bits == 0` disables blinding.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_BLINDING_SIZE_INVALID` - `bits` is not below the current prime size
    pub fn enable_blinding(&mut self, bits: u32) -> IpeccResult<()> {
        if bits == 0 {
            return self.disable_blinding();
        }
        if bits >= self.nn() {
            return Err(IpeccError::DRIVER_IPECC_BLINDING_SIZE_INVALID);
        }
        let mut bln = Blinding::default();
        bln.set_en(true);
        bln.set_bits(bits);
        self.write_checked(w::BLINDING, bln.into())
    }

    pub fn disable_blinding(&mut self) -> IpeccResult<()> {
        self.write_checked(w::BLINDING, 0)
    }

    /// # Errors
    ///
    /// * `DRIVER_IPECC_SHUFFLE_NOT_SUPPORTED` - the IP was synthesized without shuffling
    pub fn enable_shuffling(&mut self) -> IpeccResult<()> {
        if !self.capabilities().shf() {
            return Err(IpeccError::DRIVER_IPECC_SHUFFLE_NOT_SUPPORTED);
        }
        self.write_checked(w::SHUFFLE, 1)
    }

    /// Production hardware refuses to turn shuffling off and latches a
    /// shuffle error, which is returned.
    pub fn disable_shuffling(&mut self) -> IpeccResult<()> {
        self.write_checked(w::SHUFFLE, 0)
    }

    /// Re-masks the Z coordinate every `period` ladder steps.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_ZREMASK_PERIOD_INVALID` - `period` is 0 or above 0x10000
    pub fn enable_zremask(&mut self, period: u32) -> IpeccResult<()> {
        if period == 0 || period > ZREMASK_PERIOD_MAX {
            return Err(IpeccError::DRIVER_IPECC_ZREMASK_PERIOD_INVALID);
        }
        let mut zr = Zremask::default();
        zr.set_en(true);
        zr.set_period_minus_one(period - 1);
        self.write_checked(w::ZREMASK, zr.into())
    }

    pub fn disable_zremask(&mut self) -> IpeccResult<()> {
        self.write_checked(w::ZREMASK, 0)
    }

    pub fn enable_xyshuf(&mut self) -> IpeccResult<()> {
        self.debug_toggle(w::DBG_CFG_XYSHUF, true)
    }

    pub fn disable_xyshuf(&mut self) -> IpeccResult<()> {
        self.debug_toggle(w::DBG_CFG_XYSHUF, false)
    }

    pub fn enable_aximsk(&mut self) -> IpeccResult<()> {
        self.debug_toggle(w::DBG_CFG_AXIMSK, true)
    }

    pub fn disable_aximsk(&mut self) -> IpeccResult<()> {
        self.debug_toggle(w::DBG_CFG_AXIMSK, false)
    }

    pub fn enable_token(&mut self) -> IpeccResult<()> {
        self.debug_toggle(w::DBG_CFG_TOKEN, true)
    }

    /// With the token disabled the IP returns [k]P results unmasked, while
    /// [`Ipecc::mul`] still strips a token from them: only low-level
    /// callers reading R1 themselves get correct coordinates.
    pub fn disable_token(&mut self) -> IpeccResult<()> {
        self.debug_toggle(w::DBG_CFG_TOKEN, false)
    }

    fn debug_toggle(&mut self, offset: usize, en: bool) -> IpeccResult<()> {
        self.require_debug()?;
        self.write_checked(offset, u32::from(en))
    }
}
