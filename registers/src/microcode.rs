/*++

Licensed under the Apache-2.0 license.

File Name:

    microcode.rs

Abstract:

    File contains the [k]P microcode layout run by the emulated IP:
    routine placement in instruction memory, the opcode addresses at which
    random values and ladder coordinates become observable, and the Fp
    memory slots holding them. The layout is defined here for the emulator
    and is not taken from an assembled hardware microcode listing; traces
    of a hardware build take its addresses through `KpTracePoints`.

--*/

use crate::FsmState;

/// A contiguous microcode routine executed in a single FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routine {
    /// Address of the first opcode.
    pub start: u32,

    /// Number of opcodes.
    pub len: u32,

    /// FSM state while the routine runs.
    pub state: FsmState,
}

impl Routine {
    pub const fn last(&self) -> u32 {
        self.start + self.len - 1
    }

    pub const fn contains(&self, pc: u32) -> bool {
        pc >= self.start && pc < self.start + self.len
    }
}

/// Input point curve check.
pub const CHECK_ONCURVE: Routine = Routine {
    start: 0x000,
    len: 8,
    state: FsmState::CheckOnCurve,
};

/// Scalar blinding, only run when blinding is enabled.
pub const BLIND_INIT: Routine = Routine {
    start: 0x010,
    len: 4,
    state: FsmState::BlindInit,
};

/// Co-Z ladder setup.
pub const SETUP: Routine = Routine {
    start: 0x020,
    len: 12,
    state: FsmState::Setup,
};

/// Co-Z conjugate-free addition, once per ladder bit.
pub const ZADDU: Routine = Routine {
    start: 0x040,
    len: 8,
    state: FsmState::Zaddu,
};

/// Co-Z conjugate addition, once per ladder bit.
pub const ZADDC: Routine = Routine {
    start: 0x050,
    len: 8,
    state: FsmState::Zaddc,
};

/// Final conditional subtraction of P.
pub const SUBTRACT_P: Routine = Routine {
    start: 0x060,
    len: 4,
    state: FsmState::SubtractP,
};

/// Coordinate recovery and exit.
pub const EXIT: Routine = Routine {
    start: 0x070,
    len: 8,
    state: FsmState::Exit,
};

/// Output point curve check, run in the exit state.
pub const EXIT_CHECK_ONCURVE: Routine = Routine {
    start: 0x080,
    len: 8,
    state: FsmState::Exit,
};

/// Routines of one [k]P run in execution order. `ZADDU` and `ZADDC` repeat
/// once per ladder bit, `BLIND_INIT` is skipped without blinding.
pub const KP_PROGRAM: [Routine; 8] = [
    CHECK_ONCURVE,
    BLIND_INIT,
    SETUP,
    ZADDU,
    ZADDC,
    SUBTRACT_P,
    EXIT,
    EXIT_CHECK_ONCURVE,
];

/// Opcode addresses at which an observable value has just been produced.
pub mod addr {
    use super::*;

    pub const KP_ENTRY: u32 = CHECK_ONCURVE.start;
    pub const SETUP_ENTRY: u32 = SETUP.start;
    pub const ALPHA_READY: u32 = BLIND_INIT.start + 2;
    pub const PHI0_READY: u32 = SETUP.start + 2;
    pub const PHI1_READY: u32 = SETUP.start + 3;
    pub const LAMBDA_READY: u32 = SETUP.start + 5;
    pub const SETUP_DONE: u32 = SETUP.last();
    pub const ZADDU_DONE: u32 = ZADDU.last();
    pub const ZADDC_DONE: u32 = ZADDC.last();
    pub const SUBTRACT_P_DONE: u32 = SUBTRACT_P.last();
    pub const EXIT_DONE: u32 = EXIT.last();
    pub const KP_LAST: u32 = EXIT_CHECK_ONCURVE.last();
}

/// Fp memory slots of the large numbers of interest.
pub mod slot {
    pub const XR0: u32 = 16;
    pub const YR0: u32 = 17;
    pub const XR1: u32 = 18;
    pub const YR1: u32 = 19;
    pub const ZR01: u32 = 26;
    pub const LAMBDA: u32 = 32;
    pub const ALPHA: u32 = 35;
    pub const PHI0: u32 = 36;
    pub const PHI1: u32 = 37;

    /// Number of slots in Fp memory.
    pub const COUNT: u32 = 64;
}
