/*++

Licensed under the Apache-2.0 license.

File Name:

    trng.rs

Abstract:

    File contains the debug control of the IPECC TRNG: entropy source
    configuration, post-processing, bypass, raw FIFO access and the
    internal random number diagnostics.

--*/

use crate::Ipecc;
use ipecc_error::IpeccResult;
use ipecc_registers::{r, w, DbgTrngCfg, DbgTrngCtrl, DbgTrngStatus, Mmio};

/// Fill state of the TRNG raw random FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrngRawFifoStatus {
    pub full: bool,

    /// Number of raw bits currently in the FIFO.
    pub write_pointer: u32,
}

/// Internal random numbers waiting in each client FIFO.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IrnCounts {
    pub axi: u32,
    pub efp: u32,
    pub crv: u32,
    pub shf: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrngChannelDiag {
    /// Random numbers served
    pub ok: u32,

    /// Cycles spent waiting for randomness
    pub starved: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrngDiagnostics {
    pub global_starvation: u32,
    pub axi: TrngChannelDiag,
    pub efp: TrngChannelDiag,
    pub crv: TrngChannelDiag,
    pub shf: TrngChannelDiag,
}

impl<M: Mmio> Ipecc<M> {
    /// Every `W_DBG_TRNG_CTRL` write sets all of its fields: an action
    /// resets the post-processing, read port and bypass settings it does
    /// not name.
    fn write_trng_ctrl(&mut self, ctrl: DbgTrngCtrl) -> IpeccResult<()> {
        self.require_debug()?;
        self.wait_not_busy()?;
        self.regs.write(w::DBG_TRNG_CTRL, ctrl.into());
        self.wait_not_busy()
    }

    /// Configures the entropy source: Von Neumann debiasing, access time
    /// `ta` and number of idle cycles between samples.
    pub fn configure_trng(&mut self, debias: bool, ta: u32, idle: u32) -> IpeccResult<()> {
        self.require_debug()?;
        let mut cfg = DbgTrngCfg::default();
        cfg.set_debias(debias);
        cfg.set_ta(ta);
        cfg.set_idle(idle);
        self.wait_not_busy()?;
        self.regs.write(w::DBG_TRNG_CFG, cfg.into());
        self.wait_not_busy()
    }

    pub fn trng_postproc_enable(&mut self) -> IpeccResult<()> {
        self.write_trng_ctrl(DbgTrngCtrl::default())
    }

    /// Stops the post-processing from draining the raw FIFO.
    pub fn trng_postproc_disable(&mut self) -> IpeccResult<()> {
        let mut ctrl = DbgTrngCtrl::default();
        ctrl.set_postproc_disable(true);
        self.write_trng_ctrl(ctrl)
    }

    /// Replaces every internal random number with a constant made of `bit`.
    pub fn trng_bypass(&mut self, bit: bool) -> IpeccResult<()> {
        let mut ctrl = DbgTrngCtrl::default();
        ctrl.set_bypass(true);
        ctrl.set_bypass_val(bit);
        self.write_trng_ctrl(ctrl)
    }

    /// Also re-enables post-processing and the raw FIFO read port.
    pub fn trng_undo_bypass(&mut self) -> IpeccResult<()> {
        self.write_trng_ctrl(DbgTrngCtrl::default())
    }

    pub fn trng_raw_fifo_read_port_enable(&mut self) -> IpeccResult<()> {
        self.write_trng_ctrl(DbgTrngCtrl::default())
    }

    pub fn trng_raw_fifo_read_port_disable(&mut self) -> IpeccResult<()> {
        let mut ctrl = DbgTrngCtrl::default();
        ctrl.set_raw_read_disable(true);
        self.write_trng_ctrl(ctrl)
    }

    /// Empties the raw random FIFO.
    pub fn trng_reset_raw_fifo(&mut self) -> IpeccResult<()> {
        let mut ctrl = DbgTrngCtrl::default();
        ctrl.set_reset_raw_fifo(true);
        self.write_trng_ctrl(ctrl)
    }

    /// Empties the internal random number FIFOs of all clients.
    pub fn trng_reset_irn_fifos(&mut self) -> IpeccResult<()> {
        let mut ctrl = DbgTrngCtrl::default();
        ctrl.set_reset_irn_fifos(true);
        self.write_trng_ctrl(ctrl)
    }

    /// Reads the raw random bit at `addr` in the raw FIFO. The address must
    /// be set again for every read, even of the same bit.
    pub fn trng_read_raw_bit(&mut self, addr: u32) -> IpeccResult<bool> {
        let mut ctrl = DbgTrngCtrl::default();
        ctrl.set_read_raw(true);
        ctrl.set_fifo_addr(addr);
        self.write_trng_ctrl(ctrl)?;
        Ok(self.regs.read(r::DBG_TRNG_RAW_DATA) & 1 != 0)
    }

    pub fn trng_raw_fifo_status(&self) -> IpeccResult<TrngRawFifoStatus> {
        self.require_debug()?;
        let status = DbgTrngStatus::from(self.regs.read(r::DBG_TRNG_STATUS));
        Ok(TrngRawFifoStatus {
            full: status.full(),
            write_pointer: status.wr_ptr(),
        })
    }

    /// Cycles the entropy source took to fill the raw FIFO. Only meaningful
    /// with post-processing disabled.
    pub fn trng_raw_fifo_fillup_time(&self) -> IpeccResult<u32> {
        self.require_debug()?;
        Ok(self.regs.read(r::DBG_RAWDUR))
    }

    pub fn trng_irn_counts(&self) -> IpeccResult<IrnCounts> {
        self.require_debug()?;
        Ok(IrnCounts {
            axi: self.regs.read(r::DBG_IRN_CNT_AXI),
            efp: self.regs.read(r::DBG_IRN_CNT_EFP),
            crv: self.regs.read(r::DBG_IRN_CNT_CRV),
            shf: self.regs.read(r::DBG_IRN_CNT_SHF),
        })
    }

    pub fn trng_diagnostics(&self) -> IpeccResult<TrngDiagnostics> {
        self.require_debug()?;
        let channel = |ok: usize, starved: usize| TrngChannelDiag {
            ok: self.regs.read(ok),
            starved: self.regs.read(starved),
        };
        Ok(TrngDiagnostics {
            global_starvation: self.regs.read(r::DBG_TRNG_DIAG_0),
            axi: channel(r::DBG_TRNG_DIAG_1, r::DBG_TRNG_DIAG_2),
            efp: channel(r::DBG_TRNG_DIAG_3, r::DBG_TRNG_DIAG_4),
            crv: channel(r::DBG_TRNG_DIAG_5, r::DBG_TRNG_DIAG_6),
            shf: channel(r::DBG_TRNG_DIAG_7, r::DBG_TRNG_DIAG_8),
        })
    }

    /// Clears the per-channel counters. The global starvation counter is
    /// not affected.
    pub fn trng_reset_diagnostics(&mut self) -> IpeccResult<()> {
        self.require_debug()?;
        self.regs.write(w::DBG_RESET_TRNG_CNT, 1);
        Ok(())
    }
}
