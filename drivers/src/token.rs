/*++

Licensed under the Apache-2.0 license.

File Name:

    token.rs

Abstract:

    File contains the one-shot token fetched before a [k]P run to strip the
    masking the IP applies to its result.

--*/

use crate::{BigNumReg, Ipecc};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use ipecc_error::{IpeccError, IpeccResult};
use ipecc_registers::{w, Ctrl, Mmio};
use zeroize::Zeroize;

/// Random value masking the coordinates of the next [k]P result.
///
/// The bytes are zeroized when the token is dropped.
#[derive(Default)]
pub(crate) struct Token(Vec<u8>);

impl Token {
    pub(crate) fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// XORs `coord` with the token in place.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_TOKEN_SIZE_MISMATCH` - `coord` and the token differ in length
    pub(crate) fn unmask(&self, coord: &mut [u8]) -> IpeccResult<()> {
        if coord.len() != self.0.len() {
            return Err(IpeccError::DRIVER_IPECC_TOKEN_SIZE_MISMATCH);
        }
        for (c, t) in coord.iter_mut().zip(self.0.iter()) {
            *c ^= t;
        }
        Ok(())
    }
}

impl From<Vec<u8>> for Token {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token").field("len", &self.0.len()).finish()
    }
}

impl<M: Mmio> Ipecc<M> {
    /// Has the IP generate a fresh token and reads it back.
    ///
    /// The IP applies the token to the next [k]P result only; it is erased
    /// on the device once that result has been read.
    pub(crate) fn get_token(&mut self) -> IpeccResult<Token> {
        self.write_checked(w::TOKEN, 1)?;
        let mut token = Token::from(vec![0u8; self.nn_bytes()]);
        self.read_nb(Ctrl::READ_NB | Ctrl::RD_TOKEN, BigNumReg::P.addr(), token.as_mut())?;
        Ok(token)
    }
}
