/*++

Licensed under the Apache-2.0 license.

File Name:

    bignum.rs

Abstract:

    File contains the big-number marshaller: transfers of big-endian byte
    buffers to and from the word-addressed big-number memory of the IPECC.

--*/

use crate::Ipecc;
use ipecc_error::{IpeccError, IpeccResult};
use ipecc_registers::{r, w, Ctrl, Mmio, PRIME_SIZE_MASK};

/// Big-number registers reachable through `W_CTRL.NBADDR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigNumReg {
    P,
    A,
    B,
    Q,
    R0X,
    R0Y,
    R1X,
    R1Y,

    /// Write-only. Shares its address with `R0X` and is masked by the IP
    /// while being written.
    Scalar,
}

impl BigNumReg {
    pub const fn addr(self) -> u32 {
        match self {
            BigNumReg::P => 0,
            BigNumReg::A => 1,
            BigNumReg::B => 2,
            BigNumReg::Q => 3,
            BigNumReg::R0X | BigNumReg::Scalar => 4,
            BigNumReg::R0Y => 5,
            BigNumReg::R1X => 6,
            BigNumReg::R1Y => 7,
        }
    }
}

/// Size in bytes of a big number of `nn` bits.
pub(crate) const fn nn_bytes(nn: u32) -> usize {
    (nn as usize + 7) / 8
}

const fn words_for(bytes: usize, word_bytes: usize) -> usize {
    (bytes + word_bytes - 1) / word_bytes
}

impl<M: Mmio> Ipecc<M> {
    /// Prime size in bits the IP currently works with.
    pub fn nn(&self) -> u32 {
        self.regs.read(r::PRIME_SIZE) & PRIME_SIZE_MASK
    }

    /// Size in bytes of big numbers at the current prime size.
    pub fn nn_bytes(&self) -> usize {
        nn_bytes(self.nn())
    }

    fn word_bytes(&self) -> usize {
        self.regs.layout().word_bytes()
    }

    /// Writes the big-endian number `bytes` to `reg`.
    ///
    /// Exactly as many words as needed for `nn` bits are sent, zero-extended
    /// beyond `bytes`.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_BIGNUM_TOO_LARGE` - `bytes` spans more words than `nn` bits
    pub fn write_bignum(&mut self, bytes: &[u8], reg: BigNumReg) -> IpeccResult<()> {
        self.write_nb(bytes, reg)
    }

    /// Reads `reg` into `out`, most significant byte first. Only the
    /// `out.len()` least significant bytes of the number are kept.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_BIGNUM_TOO_LARGE` - `out` spans more words than `nn` bits
    pub fn read_bignum(&mut self, out: &mut [u8], reg: BigNumReg) -> IpeccResult<()> {
        self.read_nb(Ctrl::READ_NB, reg.addr(), out)
    }

    pub(crate) fn write_nb(&self, bytes: &[u8], reg: BigNumReg) -> IpeccResult<()> {
        let word_bytes = self.word_bytes();
        let nn_words = words_for(self.nn_bytes(), word_bytes);
        if words_for(bytes.len(), word_bytes) > nn_words {
            return Err(IpeccError::DRIVER_IPECC_BIGNUM_TOO_LARGE);
        }

        let ctrl = if reg == BigNumReg::Scalar {
            self.wait_scalar_writable()?;
            Ctrl::WRITE_NB | Ctrl::WRITE_K
        } else {
            Ctrl::WRITE_NB
        };
        self.write_checked(w::CTRL, ctrl.with_nbaddr(reg.addr()))?;

        // Least significant word first; the last byte of a chunk is the
        // least significant byte of its word.
        let mut chunks = bytes.rchunks(word_bytes);
        for _ in 0..nn_words {
            let word = chunks.next().map_or(0, |chunk| {
                chunk
                    .iter()
                    .rev()
                    .enumerate()
                    .fold(0u64, |word, (j, b)| word | (u64::from(*b) << (8 * j)))
            });
            self.wait_not_busy()?;
            self.regs.write_word(w::WRITE_DATA, word);
            self.settle()?;
        }
        Ok(())
    }

    pub(crate) fn read_nb(&self, ctrl: Ctrl, addr: u32, out: &mut [u8]) -> IpeccResult<()> {
        let word_bytes = self.word_bytes();
        let nn_words = words_for(self.nn_bytes(), word_bytes);
        if words_for(out.len(), word_bytes) > nn_words {
            return Err(IpeccError::DRIVER_IPECC_BIGNUM_TOO_LARGE);
        }

        self.write_checked(w::CTRL, ctrl.with_nbaddr(addr))?;

        let mut chunks = out.rchunks_mut(word_bytes);
        for _ in 0..nn_words {
            self.wait_not_busy()?;
            let word = self.regs.read_word(r::READ_DATA);
            self.settle()?;
            if let Some(chunk) = chunks.next() {
                for (j, b) in chunk.iter_mut().rev().enumerate() {
                    *b = (word >> (8 * j)) as u8;
                }
            }
        }
        Ok(())
    }
}
