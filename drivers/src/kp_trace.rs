/*++

Licensed under the Apache-2.0 license.

File Name:

    kp_trace.rs

Abstract:

    File contains the [k]P trace engine: a breakpoint-driven single-step run
    of the Co-Z ladder microcode, reading back the random values and the
    ladder coordinates at the opcodes where they become observable.

--*/

use crate::{wait, DebugStatus, Ipecc};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use ipecc_error::{IpeccError, IpeccResult};
use ipecc_registers::microcode::{addr, slot};
use ipecc_registers::{r, w, Ctrl, DbgStatus, ExpFlags, FsmState, Mmio};

/// Breakpoint the trace engine arms on the first opcode of [k]P.
const ENTRY_BREAKPOINT: u32 = 0;

/// Value held in Fp memory, as `ww`-bit limbs, least significant first.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LargeNumber {
    pub ww: u32,
    pub limbs: Vec<u32>,
}

impl LargeNumber {
    /// Big-endian encoding on exactly `len` bytes, truncating or
    /// zero-extending at the most significant end.
    pub fn to_be_bytes(&self, len: usize) -> Vec<u8> {
        let mask = u32::MAX.checked_shr(32u32.saturating_sub(self.ww)).unwrap_or(0);
        let mut le = Vec::with_capacity(len);
        let mut acc = 0u64;
        let mut acc_bits = 0;
        for limb in self.limbs.iter() {
            acc |= u64::from(limb & mask) << acc_bits;
            acc_bits += self.ww;
            while acc_bits >= 8 {
                le.push(acc as u8);
                acc >>= 8;
                acc_bits -= 8;
            }
        }
        if acc_bits > 0 {
            le.push(acc as u8);
        }
        le.resize(len, 0);
        le.reverse();
        le
    }
}

impl fmt::Display for LargeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = (self.limbs.len() * self.ww as usize + 7) / 8;
        f.write_str("0x")?;
        for b in self.to_be_bytes(len) {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Part of the [k]P microcode a point of interest belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePhase {
    /// Blinding multiplier drawn
    Alpha,

    /// Shuffling masks drawn
    Phi0,
    Phi1,

    /// Initial Z coordinate mask drawn
    Lambda,

    /// Co-Z ladder set up
    Setup,
    Zaddu,
    Zaddc,
    SubtractP,
    Exit,
}

impl TracePhase {
    pub fn name(self) -> &'static str {
        match self {
            TracePhase::Alpha => "alpha",
            TracePhase::Phi0 => "phi0",
            TracePhase::Phi1 => "phi1",
            TracePhase::Lambda => "lambda",
            TracePhase::Setup => "setup",
            TracePhase::Zaddu => "zaddu",
            TracePhase::Zaddc => "zaddc",
            TracePhase::SubtractP => "subtract-p",
            TracePhase::Exit => "exit",
        }
    }
}

/// Microcode positions the trace engine relies on: where [k]P starts and
/// ends, and the opcode address and FSM state pairs at which it takes a
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpTracePoints {
    /// Opcode the engine breaks on before stepping, and the state the IP
    /// must report there
    pub entry: (u32, FsmState),

    /// Last opcode of a run; stepping stops once it has executed
    pub last: (u32, FsmState),

    pub points: Vec<(u32, FsmState, TracePhase)>,
}

impl KpTracePoints {
    pub fn lookup(&self, pc: u32, state: FsmState) -> Option<TracePhase> {
        self.points
            .iter()
            .find(|(p, s, _)| *p == pc && *s == state)
            .map(|(_, _, phase)| *phase)
    }
}

impl Default for KpTracePoints {
    /// Points of interest of the stock microcode.
    fn default() -> Self {
        Self {
            entry: (addr::KP_ENTRY, FsmState::CheckOnCurve),
            last: (addr::KP_LAST, FsmState::Exit),
            points: alloc::vec![
                (addr::ALPHA_READY, FsmState::BlindInit, TracePhase::Alpha),
                (addr::PHI0_READY, FsmState::Setup, TracePhase::Phi0),
                (addr::PHI1_READY, FsmState::Setup, TracePhase::Phi1),
                (addr::LAMBDA_READY, FsmState::Setup, TracePhase::Lambda),
                (addr::SETUP_DONE, FsmState::Setup, TracePhase::Setup),
                (addr::ZADDU_DONE, FsmState::Zaddu, TracePhase::Zaddu),
                (addr::ZADDC_DONE, FsmState::Zaddc, TracePhase::Zaddc),
                (addr::SUBTRACT_P_DONE, FsmState::SubtractP, TracePhase::SubtractP),
                (addr::EXIT_DONE, FsmState::Exit, TracePhase::Exit),
            ],
        }
    }
}

/// Ladder registers at one point of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpTraceStep {
    pub phase: TracePhase,
    pub pc: u32,
    pub state: FsmState,
    pub flags: ExpFlags,
    pub xr0: LargeNumber,
    pub yr0: LargeNumber,
    pub xr1: LargeNumber,
    pub yr1: LargeNumber,
    pub zr01: LargeNumber,
}

/// Execution trace of one [k]P run, filled by [`Ipecc::mul`].
///
/// The options (`log_capacity`, `max_steps`, `points`) persist across runs;
/// everything else is cleared when a run starts.
#[derive(Debug, Default, Clone)]
pub struct KpTrace {
    /// Annotated text log, one line per event
    pub log: String,

    /// Bound on `log.len()`. Lines that would exceed it are dropped.
    pub log_capacity: Option<usize>,
    pub log_truncated: bool,

    pub lambda: Option<LargeNumber>,
    pub phi0: Option<LargeNumber>,
    pub phi1: Option<LargeNumber>,
    pub alpha: Option<LargeNumber>,

    pub steps: Vec<KpTraceStep>,

    /// Opcodes single-stepped
    pub nb_steps: u32,

    /// Prime size during the run
    pub nn: u32,

    /// Bound on `nb_steps`, exceeding it aborts the trace
    pub max_steps: Option<u32>,

    pub points: KpTracePoints,
}

impl KpTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_capacity(self, log_capacity: usize) -> Self {
        Self {
            log_capacity: Some(log_capacity),
            ..self
        }
    }

    pub fn with_max_steps(self, max_steps: u32) -> Self {
        Self {
            max_steps: Some(max_steps),
            ..self
        }
    }

    pub fn with_points(self, points: KpTracePoints) -> Self {
        Self { points, ..self }
    }

    /// Snapshots of `phase`, in execution order.
    pub fn phase_steps(&self, phase: TracePhase) -> impl Iterator<Item = &KpTraceStep> {
        self.steps.iter().filter(move |step| step.phase == phase)
    }

    fn begin(&mut self, nn: u32) {
        self.log.clear();
        self.log_truncated = false;
        self.lambda = None;
        self.phi0 = None;
        self.phi1 = None;
        self.alpha = None;
        self.steps.clear();
        self.nb_steps = 0;
        self.nn = nn;
    }

    fn log_line(&mut self, line: fmt::Arguments<'_>) {
        let line = format!("{line}\n");
        if self
            .log_capacity
            .map_or(false, |cap| self.log.len() + line.len() > cap)
        {
            self.log_truncated = true;
            return;
        }
        self.log.push_str(&line);
    }
}

/// Placement of large numbers in Fp memory for the current prime size.
#[derive(Debug, Clone, Copy)]
struct FpLayout {
    ww: u32,
    limbs: u32,

    /// Distance in limbs between two consecutive slots
    stride: u32,
}

impl FpLayout {
    fn new(nn: u32, ww: u32) -> Self {
        let limbs = (nn + 4 + ww - 1) / ww;
        Self {
            ww,
            limbs,
            stride: limbs.next_power_of_two(),
        }
    }
}

impl<M: Mmio> Ipecc<M> {
    /// Runs [k]P one opcode at a time, with operands already loaded. On
    /// return the run has completed and the result is in R1.
    pub(crate) fn traced_kp(&mut self, trace: &mut KpTrace) -> IpeccResult<()> {
        self.require_debug()?;
        let nn = self.nn();
        let ww = self.ww()?;
        if ww == 0 || ww > 32 {
            return Err(IpeccError::DRIVER_IPECC_TRACE_UNEXPECTED_HALT);
        }
        let layout = FpLayout::new(nn, ww);
        trace.begin(nn);
        trace.log_line(format_args!(
            "[k]P trace: nn = {nn}, ww = {ww}, {} limbs per number",
            layout.limbs
        ));

        let (entry_pc, _) = trace.points.entry;
        self.set_breakpoint(ENTRY_BREAKPOINT, entry_pc, 0, FsmState::AnyOrIdle)?;
        self.wait_not_busy()?;
        self.regs.write(w::CTRL, Ctrl::PT_KP.bits());

        let traced = self.step_through(trace, layout);
        let released = self.release_kp();
        log::debug!("ipecc: traced [k]P done after {} steps", trace.nb_steps);
        traced.and(released)
    }

    /// Lets a halted or finished [k]P run to completion without breaking
    /// again.
    fn release_kp(&mut self) -> IpeccResult<()> {
        self.remove_breakpoint(ENTRY_BREAKPOINT)?;
        self.resume()?;
        self.settle()
    }

    fn step_through(&mut self, trace: &mut KpTrace, layout: FpLayout) -> IpeccResult<()> {
        let Some(entry) = self.wait_kp_halted()? else {
            // [k]P refused to start; report the latched error if any.
            self.settle()?;
            return Err(IpeccError::DRIVER_IPECC_TRACE_UNEXPECTED_HALT);
        };
        if (entry.pc, entry.state) != trace.points.entry {
            log::warn!(
                "ipecc: [k]P halted at {:#05x} in {}",
                entry.pc,
                entry.state.name()
            );
            return Err(IpeccError::DRIVER_IPECC_TRACE_UNEXPECTED_HALT);
        }

        loop {
            if trace.max_steps.map_or(false, |max| trace.nb_steps >= max) {
                trace.log_line(format_args!("step limit reached"));
                return Err(IpeccError::DRIVER_IPECC_TRACE_STEP_LIMIT);
            }
            self.run_opcodes(1)?;
            let Some(status) = self.wait_kp_halted()? else {
                return Err(IpeccError::DRIVER_IPECC_TRACE_UNEXPECTED_HALT);
            };
            trace.nb_steps += 1;

            if let Some(phase) = trace.points.lookup(status.pc, status.state) {
                self.record(trace, phase, status, layout)?;
            }
            if (status.pc, status.state) == trace.points.last {
                return Ok(());
            }
        }
    }

    /// Polls until the running [k]P halts, or returns `None` if it is no
    /// longer running.
    fn wait_kp_halted(&self) -> IpeccResult<Option<DebugStatus>> {
        wait::until_bounded(self.config.poll_limit, || {
            DbgStatus::from(self.regs.read(r::DBG_STATUS)).halted() || !self.status().kp()
        })?;
        let status = self.debug_status()?;
        Ok(status.halted.then_some(status))
    }

    fn read_large_number(&self, slot: u32, layout: FpLayout) -> IpeccResult<LargeNumber> {
        let base = slot * layout.stride;
        let limbs = (base..base + layout.limbs)
            .map(|addr| self.read_fp_limb(addr))
            .collect::<IpeccResult<Vec<u32>>>()?;
        Ok(LargeNumber {
            ww: layout.ww,
            limbs,
        })
    }

    fn record(
        &self,
        trace: &mut KpTrace,
        phase: TracePhase,
        status: DebugStatus,
        layout: FpLayout,
    ) -> IpeccResult<()> {
        let random_slot = match phase {
            TracePhase::Alpha => Some(slot::ALPHA),
            TracePhase::Phi0 => Some(slot::PHI0),
            TracePhase::Phi1 => Some(slot::PHI1),
            TracePhase::Lambda => Some(slot::LAMBDA),
            _ => None,
        };
        if let Some(random_slot) = random_slot {
            let value = self.read_large_number(random_slot, layout)?;
            trace.log_line(format_args!(
                "{:#05x} {}: {} = {value}",
                status.pc,
                status.state.name(),
                phase.name()
            ));
            let field = match phase {
                TracePhase::Alpha => &mut trace.alpha,
                TracePhase::Phi0 => &mut trace.phi0,
                TracePhase::Phi1 => &mut trace.phi1,
                _ => &mut trace.lambda,
            };
            *field = Some(value);
            return Ok(());
        }

        let flags = self.exception_flags()?;
        let step = KpTraceStep {
            phase,
            pc: status.pc,
            state: status.state,
            flags,
            xr0: self.read_large_number(slot::XR0, layout)?,
            yr0: self.read_large_number(slot::YR0, layout)?,
            xr1: self.read_large_number(slot::XR1, layout)?,
            yr1: self.read_large_number(slot::YR1, layout)?,
            zr01: self.read_large_number(slot::ZR01, layout)?,
        };
        trace.log_line(format_args!(
            "{:#05x} {} bit {}: kap={} kapp={} r0z={} r1z={}",
            step.pc,
            step.state.name(),
            flags.jnbbit(),
            u8::from(flags.kap()),
            u8::from(flags.kapp()),
            u8::from(flags.r0z()),
            u8::from(flags.r1z()),
        ));
        trace.log_line(format_args!("  R0 = ({}, {})", step.xr0, step.yr0));
        trace.log_line(format_args!("  R1 = ({}, {})", step.xr1, step.yr1));
        trace.log_line(format_args!("  Z  = {}", step.zr01));
        trace.steps.push(step);
        Ok(())
    }
}
