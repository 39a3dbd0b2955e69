/*++

Licensed under the Apache-2.0 license.

File Name:

    status.rs

Abstract:

    File contains the busy/error protocol of the IPECC: status polling,
    error latch read and acknowledge.

--*/

use crate::{wait, Ipecc};
use ipecc_error::{IpeccError, IpeccResult};
use ipecc_registers::{r, w, Mmio, Status, StatusErr};

const ERROR_NAMES: [(StatusErr, &str); 15] = [
    (StatusErr::IN_PT_NOT_ON_CURVE, "IN_PT_NOT_ON_CURVE"),
    (StatusErr::OUT_PT_NOT_ON_CURVE, "OUT_PT_NOT_ON_CURVE"),
    (StatusErr::COMP, "COMP"),
    (StatusErr::WREG_FBD, "WREG_FBD"),
    (StatusErr::KP_FBD, "KP_FBD"),
    (StatusErr::NNDYN, "NNDYN"),
    (StatusErr::POP_FBD, "POP_FBD"),
    (StatusErr::RDNB_FBD, "RDNB_FBD"),
    (StatusErr::BLN, "BLN"),
    (StatusErr::UNKNOWN_REG, "UNKNOWN_REG"),
    (StatusErr::TOKEN, "TOKEN"),
    (StatusErr::SHUFFLE, "SHUFFLE"),
    (StatusErr::ZREMASK, "ZREMASK"),
    (StatusErr::NOT_ENOUGH_RANDOM_WK, "NOT_ENOUGH_RANDOM_WK"),
    (StatusErr::RREG_FBD, "RREG_FBD"),
];

impl<M: Mmio> Ipecc<M> {
    /// Current content of `R_STATUS`.
    pub fn status(&self) -> Status {
        Status::from(self.regs.read(r::STATUS))
    }

    pub(crate) fn wait_not_busy(&self) -> IpeccResult<()> {
        wait::until_bounded(self.config.poll_limit, || !self.status().busy())
    }

    /// Waits until the IP holds enough random words to mask a scalar;
    /// a scalar written earlier is dropped and latches an error.
    pub(crate) fn wait_scalar_writable(&self) -> IpeccResult<()> {
        wait::until_bounded(self.config.poll_limit, || self.status().enough_rnd_wk())
    }

    /// Acknowledges and returns every error latched in `R_STATUS`.
    pub(crate) fn check_and_ack_errors(&self) -> IpeccResult<()> {
        let raw = self.status().errid();
        if raw == 0 {
            return Ok(());
        }
        let errors = StatusErr::from_bits_truncate(raw);
        for (flag, name) in ERROR_NAMES.iter() {
            if errors.contains(*flag) {
                log::warn!("ipecc: hardware error {name}");
            }
        }
        if errors.bits() != raw {
            log::warn!("ipecc: unnamed hardware error bits {:#06x}", raw & !errors.bits());
        }
        self.regs.write(w::ERR_ACK, raw << 16);
        Err(IpeccError::from_hw_status(raw))
    }

    /// Waits for the IP to go idle, then checks the error latch.
    pub(crate) fn settle(&self) -> IpeccResult<()> {
        self.wait_not_busy()?;
        self.check_and_ack_errors()
    }

    /// Writes `val` to `offset` once the IP is idle, then settles.
    pub(crate) fn write_checked(&self, offset: usize, val: u32) -> IpeccResult<()> {
        self.wait_not_busy()?;
        self.regs.write(offset, val);
        self.settle()
    }
}
