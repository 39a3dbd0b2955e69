/*++

Licensed under the Apache-2.0 license.

File Name:

    debug.rs

Abstract:

    File contains the debug bank of the IPECC: halt, breakpoints, stepping,
    trigger, microcode patching, Fp memory access and debug capabilities.
    Only available on IPs synthesized in debug mode.

--*/

use crate::{wait, Ipecc};
use ipecc_error::{IpeccError, IpeccResult};
use ipecc_registers::{
    r, w, DbgBkpt, DbgCapabilities1, DbgCapabilities2, DbgStatus, DbgSteps, ExpFlags, FsmState,
    Mmio,
};

/// Number of hardware breakpoints.
const BREAKPOINT_COUNT: u32 = 4;

/// Snapshot of `R_DBG_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugStatus {
    pub halted: bool,

    /// Breakpoint the IP halted on, if any.
    pub breakpoint: Option<u32>,

    /// Address of the last opcode executed.
    pub pc: u32,
    pub state: FsmState,
}

impl From<DbgStatus> for DebugStatus {
    fn from(status: DbgStatus) -> Self {
        Self {
            halted: status.halted(),
            breakpoint: status.bk_hit().then(|| status.bkid()),
            pc: status.pc(),
            state: FsmState::from(status.state()),
        }
    }
}

impl<M: Mmio> Ipecc<M> {
    /// # Errors
    ///
    /// * `DRIVER_IPECC_DEBUG_ONLY` - the IP was synthesized in production mode
    pub(crate) fn require_debug(&self) -> IpeccResult<()> {
        if self.is_debug() {
            Ok(())
        } else {
            Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY)
        }
    }

    /// Halts the next [k]P on its first opcode.
    pub fn halt(&mut self) -> IpeccResult<()> {
        self.require_debug()?;
        self.regs.write(w::DBG_HALT, 1);
        Ok(())
    }

    /// Arms breakpoint `id` on opcode `addr`. A `state` other than
    /// [`FsmState::AnyOrIdle`] restricts it to that FSM state, and inside
    /// the ladder to scalar bit `nbbit`.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_INVALID_BREAKPOINT_ID` - `id` is not in 0..=3
    pub fn set_breakpoint(
        &mut self,
        id: u32,
        addr: u32,
        nbbit: u32,
        state: FsmState,
    ) -> IpeccResult<()> {
        self.require_debug()?;
        if id >= BREAKPOINT_COUNT {
            return Err(IpeccError::DRIVER_IPECC_INVALID_BREAKPOINT_ID);
        }
        let mut bkpt = DbgBkpt::default();
        bkpt.set_en(true);
        bkpt.set_id(id);
        bkpt.set_addr(addr);
        bkpt.set_nbbit(nbbit);
        bkpt.set_state(state.into());
        self.regs.write(w::DBG_BKPT, bkpt.into());
        Ok(())
    }

    pub fn remove_breakpoint(&mut self, id: u32) -> IpeccResult<()> {
        self.require_debug()?;
        if id >= BREAKPOINT_COUNT {
            return Err(IpeccError::DRIVER_IPECC_INVALID_BREAKPOINT_ID);
        }
        let mut bkpt = DbgBkpt::default();
        bkpt.set_id(id);
        self.regs.write(w::DBG_BKPT, bkpt.into());
        Ok(())
    }

    /// Executes `n` opcodes of a halted [k]P, then halts again.
    pub fn run_opcodes(&mut self, n: u32) -> IpeccResult<()> {
        self.require_debug()?;
        let mut steps = DbgSteps::default();
        steps.set_run_nb_op(true);
        steps.set_nb_op(n);
        self.regs.write(w::DBG_STEPS, steps.into());
        Ok(())
    }

    /// Resumes a halted [k]P until the next breakpoint or its end.
    pub fn resume(&mut self) -> IpeccResult<()> {
        self.require_debug()?;
        let mut steps = DbgSteps::default();
        steps.set_resume(true);
        self.regs.write(w::DBG_STEPS, steps.into());
        Ok(())
    }

    pub fn debug_status(&self) -> IpeccResult<DebugStatus> {
        self.require_debug()?;
        Ok(DbgStatus::from(self.regs.read(r::DBG_STATUS)).into())
    }

    /// Polls until a [k]P is halted and returns where it stopped.
    pub fn wait_halted(&self) -> IpeccResult<DebugStatus> {
        self.require_debug()?;
        wait::until_bounded(self.config.poll_limit, || {
            DbgStatus::from(self.regs.read(r::DBG_STATUS)).halted()
        })?;
        self.debug_status()
    }

    /// Ladder flags of the opcode last executed.
    pub fn exception_flags(&self) -> IpeccResult<ExpFlags> {
        self.require_debug()?;
        Ok(ExpFlags::from(self.regs.read(r::DBG_EXP_FLAGS)))
    }

    /// Arms the trigger output for the next [k]P.
    pub fn arm_trigger(&mut self) -> IpeccResult<()> {
        self.require_debug()?;
        self.regs.write(w::DBG_TRIG_ACT, 1);
        Ok(())
    }

    pub fn disarm_trigger(&mut self) -> IpeccResult<()> {
        self.require_debug()?;
        self.regs.write(w::DBG_TRIG_ACT, 0);
        Ok(())
    }

    /// Raises the trigger `time` cycles into the [k]P.
    pub fn set_trigger_up(&mut self, time: u32) -> IpeccResult<()> {
        self.require_debug()?;
        self.regs.write(w::DBG_TRIG_UP, time);
        Ok(())
    }

    /// Lowers the trigger `time` cycles into the [k]P.
    pub fn set_trigger_down(&mut self, time: u32) -> IpeccResult<()> {
        self.require_debug()?;
        self.regs.write(w::DBG_TRIG_DOWN, time);
        Ok(())
    }

    /// Duration of the last point operation.
    pub fn point_op_time(&self) -> IpeccResult<u32> {
        self.require_debug()?;
        Ok(self.regs.read(r::DBG_TIME))
    }

    /// Overwrites the microcode starting at opcode `addr`.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_OPCODE_ADDR_INVALID` - the patch extends past the instruction memory
    pub fn patch_microcode(&mut self, addr: u32, opcodes: &[u32]) -> IpeccResult<()> {
        self.require_debug()?;
        let end = u64::from(addr) + opcodes.len() as u64;
        if end > u64::from(self.nb_opcodes()?) {
            return Err(IpeccError::DRIVER_IPECC_OPCODE_ADDR_INVALID);
        }
        log::debug!("ipecc: patching {} opcodes at {addr:#x}", opcodes.len());
        for (op_addr, opcode) in (addr..).zip(opcodes.iter()) {
            self.regs.write(w::DBG_OP_WADDR, op_addr);
            self.regs.write(w::DBG_OPCODE, *opcode);
        }
        Ok(())
    }

    /// Writes one limb of Fp memory.
    pub fn fp_write(&mut self, addr: u32, limb: u32) -> IpeccResult<()> {
        self.require_debug()?;
        self.regs.write(w::DBG_FP_WADDR, addr);
        self.regs.write(w::DBG_FP_WDATA, limb);
        Ok(())
    }

    /// Reads one limb of Fp memory.
    pub fn fp_read(&self, addr: u32) -> IpeccResult<u32> {
        self.require_debug()?;
        self.read_fp_limb(addr)
    }

    pub(crate) fn read_fp_limb(&self, addr: u32) -> IpeccResult<u32> {
        self.regs.write(w::DBG_FP_RADDR, addr);
        wait::until_bounded(self.config.poll_limit, || {
            self.regs.read(r::DBG_FP_RDATA_RDY) & 1 != 0
        })?;
        Ok(self.regs.read(r::DBG_FP_RDATA))
    }

    /// Width in bits of an Fp memory limb.
    pub fn ww(&self) -> IpeccResult<u32> {
        self.require_debug()?;
        Ok(self.regs.read(r::DBG_CAPABILITIES_0))
    }

    /// Size of the instruction memory, in opcodes.
    pub fn nb_opcodes(&self) -> IpeccResult<u32> {
        Ok(self.debug_capabilities_1()?.nb_opcodes())
    }

    /// Width in bits of an opcode.
    pub fn opcode_size(&self) -> IpeccResult<u32> {
        Ok(self.debug_capabilities_1()?.opcode_size())
    }

    /// Size in bits of the TRNG raw FIFO.
    pub fn trng_raw_ram_size(&self) -> IpeccResult<u32> {
        Ok(self.debug_capabilities_2()?.raw_ram_size())
    }

    /// Width of the internal random numbers used for shuffling.
    pub fn irn_shf_width(&self) -> IpeccResult<u32> {
        Ok(self.debug_capabilities_2()?.irn_shf_width())
    }

    fn debug_capabilities_1(&self) -> IpeccResult<DbgCapabilities1> {
        self.require_debug()?;
        Ok(DbgCapabilities1::from(self.regs.read(r::DBG_CAPABILITIES_1)))
    }

    fn debug_capabilities_2(&self) -> IpeccResult<DbgCapabilities2> {
        self.require_debug()?;
        Ok(DbgCapabilities2::from(self.regs.read(r::DBG_CAPABILITIES_2)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IpeccConfig, WordLayout};
    use ipecc_emu_bus::testing::{FakeBus, Log};
    use ipecc_hw_model::mmio::BusMmio;

    fn fake_ipecc(debug: bool) -> (Ipecc<BusMmio<FakeBus>>, Log) {
        let mut fake_bus = FakeBus::new();
        fake_bus.set_read_value(r::CAPABILITIES as u32, u64::from(debug));
        // 32-bit opcodes, 16 of them
        fake_bus.set_read_value(r::DBG_CAPABILITIES_1 as u32, 0x0020_0010);
        let log = fake_bus.log.clone();
        (
            Ipecc::bind(
                BusMmio::new(fake_bus),
                IpeccConfig::new(WordLayout::W32).with_poll_limit(8),
            ),
            log,
        )
    }

    #[test]
    fn test_debug_status() {
        let status = DebugStatus::from(DbgStatus::from(0xb000_047b));
        assert_eq!(
            status,
            DebugStatus {
                halted: true,
                breakpoint: Some(1),
                pc: 0x47,
                state: FsmState::Zaddu,
            }
        );
        let status = DebugStatus::from(DbgStatus::from(0x0000_0871));
        assert_eq!(status.breakpoint, None);
        assert_eq!(status.state, FsmState::AnyOrIdle);
    }

    #[test]
    fn test_production_rejects() {
        let (mut ipecc, log) = fake_ipecc(false);
        assert_eq!(ipecc.halt(), Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY));
        assert_eq!(
            ipecc.set_breakpoint(0, 0, 0, FsmState::AnyOrIdle),
            Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY)
        );
        assert_eq!(ipecc.ww(), Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY));
        assert_eq!(
            ipecc.patch_microcode(0, &[0]),
            Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY)
        );
        assert!(log.filter("write").is_empty());
    }

    #[test]
    fn test_breakpoint_encoding() {
        let (mut ipecc, log) = fake_ipecc(true);
        ipecc
            .set_breakpoint(2, 0x57, 3, FsmState::Zaddc)
            .unwrap();
        ipecc.remove_breakpoint(2).unwrap();
        assert_eq!(
            ipecc.set_breakpoint(4, 0, 0, FsmState::AnyOrIdle),
            Err(IpeccError::DRIVER_IPECC_INVALID_BREAKPOINT_ID)
        );
        assert_eq!(
            log.filter("write"),
            vec!["write(Word, 0x108, 0xc0030575)", "write(Word, 0x108, 0x4)"]
        );
    }

    #[test]
    fn test_steps_encoding() {
        let (mut ipecc, log) = fake_ipecc(true);
        ipecc.run_opcodes(3).unwrap();
        ipecc.resume().unwrap();
        assert_eq!(
            log.filter("write"),
            vec!["write(Word, 0x110, 0x301)", "write(Word, 0x110, 0x10000000)"]
        );
    }

    #[test]
    fn test_patch_microcode() {
        let (mut ipecc, log) = fake_ipecc(true);
        assert_eq!(ipecc.nb_opcodes(), Ok(16));
        assert_eq!(ipecc.opcode_size(), Ok(32));
        ipecc.patch_microcode(14, &[0xaa, 0xbb]).unwrap();
        assert_eq!(
            ipecc.patch_microcode(15, &[0xaa, 0xbb]),
            Err(IpeccError::DRIVER_IPECC_OPCODE_ADDR_INVALID)
        );
        assert_eq!(
            log.filter("write"),
            vec![
                "write(Word, 0x130, 0xe)",
                "write(Word, 0x138, 0xaa)",
                "write(Word, 0x130, 0xf)",
                "write(Word, 0x138, 0xbb)",
            ]
        );
    }

    #[test]
    fn test_fp_read_handshake() {
        let (ipecc, log) = fake_ipecc(true);
        // DBG_FP_RDATA_RDY never rises on the fake bus.
        assert_eq!(
            ipecc.fp_read(0x40),
            Err(IpeccError::DRIVER_IPECC_DEVICE_UNRESPONSIVE)
        );
        assert_eq!(log.filter("write"), vec!["write(Word, 0x160, 0x40)"]);
        assert_eq!(log.filter("read(Word, 0x170)").len(), 8);

        let mmio = ipecc.into_mmio();
        mmio.with_bus(|bus| {
            bus.set_read_value(r::DBG_FP_RDATA_RDY as u32, 1);
            bus.set_read_value(r::DBG_FP_RDATA as u32, 0xdead_beef);
        });
        let ipecc = Ipecc::bind(mmio, IpeccConfig::new(WordLayout::W32));
        assert_eq!(ipecc.fp_read(0x41), Ok(0xdead_beef));
    }
}
