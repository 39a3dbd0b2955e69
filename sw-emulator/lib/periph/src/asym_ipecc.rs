/*++

Licensed under the Apache-2.0 license.

File Name:

    asym_ipecc.rs

Abstract:

    File contains the IPECC peripheral model: register front-end, big
    number register file, point operations, [k]P sequencer with debug
    halt/step support, TRNG debug bank and error latch.

--*/

use crate::curve::{Curve, Point};
use crate::kp_program::{KpInputs, KpRandoms, KpRun, Position};
use ipecc_emu_bus::{check_alignment, AccessSize, Bus, BusAddr, BusData, BusError};
use ipecc_registers::microcode::slot;
use ipecc_registers::{
    r, w, Capabilities, DbgCapabilities1, DbgCapabilities2, DbgStatus, DbgTrngStatus, ExpFlags,
    FsmState, HwVersion, Status, StatusErr, PRIME_SIZE_MASK, WINDOW_SIZE,
};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tock_registers::register_bitfields;
use tock_registers::LocalRegisterCopy;

use self::debug_fsm::{Context, Events, StateMachine, States};

/// Number of status reads for which a command keeps the IP busy by default.
const DEFAULT_BUSY_LATENCY: u32 = 2;

/// Number of status reads after reset or [k]P before enough random words
/// are available to mask a new scalar.
const RND_WARMUP_READS: u32 = 3;

/// Number of status reads the IP spends initializing after a soft reset.
const INIT_READS: u32 = 2;

/// Opcode width of the instruction memory.
const OPCODE_SIZE: u32 = 32;

/// Capacities of the internal random number FIFOs (AXI, EFP, CRV, SHF).
const IRN_FIFO_DEPTHS: [u32; 4] = [64, 32, 32, 16];

/// Smallest prime size the IP accepts.
const NN_MIN: u32 = 8;

register_bitfields! [
    u32,

    /// Control Register Fields
    Ctrl [
        PT_KP OFFSET(0) NUMBITS(1) [],
        PT_ADD OFFSET(1) NUMBITS(1) [],
        PT_DBL OFFSET(2) NUMBITS(1) [],
        PT_CHK OFFSET(3) NUMBITS(1) [],
        PT_NEG OFFSET(4) NUMBITS(1) [],
        PT_EQU OFFSET(5) NUMBITS(1) [],
        PT_OPP OFFSET(6) NUMBITS(1) [],
        RD_TOKEN OFFSET(12) NUMBITS(1) [],
        WRITE_NB OFFSET(16) NUMBITS(1) [],
        READ_NB OFFSET(17) NUMBITS(1) [],
        WRITE_K OFFSET(18) NUMBITS(1) [],
        NBADDR OFFSET(20) NUMBITS(12) [],
    ],

    /// Single enable bit registers (R0/R1 null, shuffle, IRQ, debug toggles)
    Enable [
        EN OFFSET(0) NUMBITS(1) [],
    ],

    /// Blinding Register Fields
    Blinding [
        EN OFFSET(0) NUMBITS(1) [],
        BITS OFFSET(4) NUMBITS(28) [],
    ],

    /// Z-remask Register Fields
    Zremask [
        EN OFFSET(0) NUMBITS(1) [],
        PERIOD OFFSET(16) NUMBITS(16) [],
    ],

    /// Breakpoint Register Fields
    Bkpt [
        EN OFFSET(0) NUMBITS(1) [],
        ID OFFSET(1) NUMBITS(2) [],
        ADDR OFFSET(4) NUMBITS(12) [],
        NBBIT OFFSET(16) NUMBITS(12) [],
        STATE OFFSET(28) NUMBITS(4) [],
    ],

    /// Step/Resume Register Fields
    Steps [
        RUN_NB_OP OFFSET(0) NUMBITS(1) [],
        NB_OP OFFSET(8) NUMBITS(16) [],
        RESUME OFFSET(28) NUMBITS(1) [],
    ],

    /// TRNG Control Register Fields
    TrngCtrl [
        POSTPROC_DISABLE OFFSET(0) NUMBITS(1) [],
        RESET_RAW_FIFO OFFSET(1) NUMBITS(1) [],
        RESET_IRN_FIFOS OFFSET(2) NUMBITS(1) [],
        READ_RAW OFFSET(4) NUMBITS(1) [],
        FIFO_ADDR OFFSET(8) NUMBITS(20) [],
        RAW_READ_DISABLE OFFSET(28) NUMBITS(1) [],
        BYPASS OFFSET(29) NUMBITS(1) [],
        BYPASS_VAL OFFSET(30) NUMBITS(1) [],
    ],
];

/// Debug run/halt state machine of the [k]P sequencer.
mod debug_fsm {
    use smlang::statemachine;

    statemachine! {
        transitions: {
            // CurrentState Event = NextState
            *Idle + Start = Running,
            Running + Hit = Halted,
            Halted + Step = Running,
            Halted + Resume = Running,
            Running + Done = Idle,
        }
    }

    /// State machine extended variables.
    pub struct Context;

    impl StateMachineContext for Context {}
}

/// Synthesis-time parameters of the modelled IP.
#[derive(Debug, Clone)]
pub struct IpeccParams {
    /// Debug (true) or production (false) synthesis
    pub debug: bool,

    /// Shuffling countermeasure is available
    pub shuffle: bool,

    /// Prime size can be changed at runtime
    pub nndyn: bool,

    /// Big-number words are 64 bits wide
    pub w64: bool,

    /// Largest supported prime size
    pub nnmax: u32,

    /// Prime size after reset
    pub nn: u32,

    pub version_major: u32,
    pub version_minor: u32,

    /// Number of status reads a command keeps the IP busy
    pub busy_latency: u32,

    /// Seed of the TRNG model
    pub rng_seed: u64,

    /// Size of the instruction memory
    pub nb_opcodes: u32,

    /// Limb width of the Fp memory
    pub ww: u32,

    /// Size in bits of the TRNG raw FIFO
    pub raw_ram_size: u32,

    /// Width of the shuffle IRN
    pub irn_shf_width: u32,
}

impl Default for IpeccParams {
    fn default() -> Self {
        Self {
            debug: true,
            shuffle: true,
            nndyn: true,
            w64: false,
            nnmax: 528,
            nn: 256,
            version_major: 1,
            version_minor: 2,
            busy_latency: DEFAULT_BUSY_LATENCY,
            rng_seed: 0,
            nb_opcodes: 1024,
            ww: 32,
            raw_ram_size: 4096,
            irn_shf_width: 9,
        }
    }
}

/// Big-number access selected through `W_CTRL`.
#[derive(Debug, Clone)]
enum NbAccess {
    Write { addr: usize, scalar: bool, index: u32 },
    Read { value: BigUint, index: u32 },
}

#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    addr: u32,
    nbbit: u32,
    state: u32,
}

/// TRNG channel a random value is accounted to.
#[derive(Debug, Clone, Copy)]
enum Channel {
    Axi = 0,
    Efp = 1,
    Crv = 2,
    Shf = 3,
}

/// Big-number register file addresses.
const NB_P: usize = 0;
const NB_A: usize = 1;
const NB_B: usize = 2;
const NB_Q: usize = 3;
const NB_XR0: usize = 4;
const NB_YR0: usize = 5;
const NB_XR1: usize = 6;
const NB_YR1: usize = 7;
const NB_COUNT: usize = 8;

pub struct AsymIpecc {
    params: IpeccParams,
    rng: StdRng,

    nn: u32,
    nb: [BigUint; NB_COUNT],
    scalar: BigUint,
    r0_null: bool,
    r1_null: bool,
    yes: bool,
    errors: StatusErr,
    access: Option<NbAccess>,
    token: Option<BigUint>,

    busy: u32,
    init: u32,
    rnd_warmup: u32,

    blinding: u32,
    shuffle: bool,
    zremask: Option<u32>,
    xyshuf: bool,
    aximsk: bool,
    token_enabled: bool,
    small_scalar: Option<u32>,
    irq: bool,

    kp: Option<KpRun>,
    fsm: StateMachine<Context>,
    halt_pending: bool,
    bkpts: [Option<Breakpoint>; 4],
    bk_hit: Option<u32>,
    last: Option<Position>,
    op_time: u32,
    trig_armed: bool,
    trig_up: u32,
    trig_down: u32,

    imem: Vec<u32>,
    op_waddr: u32,
    fp: Vec<u32>,
    fp_waddr: u32,
    fp_rdata: u32,
    fp_rdy: bool,

    trng_cfg: u32,
    postproc: bool,
    bypass: Option<bool>,
    raw_read_enabled: bool,
    raw_fifo: Vec<bool>,
    raw_data: bool,
    irn_counts: [u32; 4],
    diag_ok: [u32; 4],
    diag_starv: [u32; 4],
    diag_global_starv: u32,
}

impl AsymIpecc {
    /// Create a new instance of the IPECC model, in the state it has right
    /// after power-up (before any soft reset).
    pub fn new(params: IpeccParams) -> Self {
        let stride = fp_stride(params.nnmax, params.ww);
        let mut ip = Self {
            rng: StdRng::seed_from_u64(params.rng_seed),
            nn: params.nn,
            nb: Default::default(),
            scalar: BigUint::zero(),
            r0_null: true,
            r1_null: true,
            yes: false,
            errors: StatusErr::empty(),
            access: None,
            token: None,
            busy: 0,
            init: 0,
            rnd_warmup: RND_WARMUP_READS,
            blinding: 0,
            shuffle: params.shuffle,
            zremask: None,
            xyshuf: false,
            aximsk: true,
            token_enabled: true,
            small_scalar: None,
            irq: false,
            kp: None,
            fsm: StateMachine::new(Context),
            halt_pending: false,
            bkpts: [None; 4],
            bk_hit: None,
            last: None,
            op_time: 0,
            trig_armed: false,
            trig_up: 0,
            trig_down: 0,
            imem: vec![0; params.nb_opcodes as usize],
            op_waddr: 0,
            fp: vec![0; (slot::COUNT * stride) as usize],
            fp_waddr: 0,
            fp_rdata: 0,
            fp_rdy: false,
            trng_cfg: 0,
            postproc: false,
            bypass: None,
            raw_read_enabled: true,
            raw_fifo: Vec::new(),
            raw_data: false,
            irn_counts: IRN_FIFO_DEPTHS,
            diag_ok: [0; 4],
            diag_starv: [0; 4],
            diag_global_starv: 0,
            params,
        };
        ip.fill_raw_fifo();
        ip
    }

    pub fn params(&self) -> &IpeccParams {
        &self.params
    }

    /// Current prime size.
    pub fn nn(&self) -> u32 {
        self.nn
    }

    /// Opcode stored at `addr` of the instruction memory.
    pub fn opcode(&self, addr: u32) -> Option<u32> {
        self.imem.get(addr as usize).copied()
    }

    /// Latched error bits.
    pub fn errors(&self) -> StatusErr {
        self.errors
    }

    pub fn blinding_bits(&self) -> u32 {
        self.blinding
    }

    pub fn is_shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    pub fn zremask_period(&self) -> Option<u32> {
        self.zremask
    }

    pub fn is_xyshuf_enabled(&self) -> bool {
        self.xyshuf
    }

    pub fn is_aximsk_enabled(&self) -> bool {
        self.aximsk
    }

    pub fn is_token_enabled(&self) -> bool {
        self.token_enabled
    }

    pub fn is_irq_enabled(&self) -> bool {
        self.irq
    }

    pub fn is_trng_postproc_enabled(&self) -> bool {
        self.postproc
    }

    /// Configured TRNG `(up, down, armed)` trigger settings.
    pub fn trigger(&self) -> (u32, u32, bool) {
        (self.trig_up, self.trig_down, self.trig_armed)
    }

    /// Raw `W_DBG_TRNG_CFG` value.
    pub fn trng_cfg(&self) -> u32 {
        self.trng_cfg
    }

    /// True while a [k]P run is in progress (running or halted).
    pub fn is_kp_running(&self) -> bool {
        self.kp.is_some()
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.fsm.state(), States::Halted)
    }

    fn word_bits(&self) -> u32 {
        if self.params.w64 {
            64
        } else {
            32
        }
    }

    fn word_mask(&self) -> u64 {
        if self.params.w64 {
            u64::MAX
        } else {
            u64::from(u32::MAX)
        }
    }

    fn curve(&self) -> Curve {
        Curve {
            p: self.nb[NB_P].clone(),
            a: self.nb[NB_A].clone(),
            b: self.nb[NB_B].clone(),
            q: self.nb[NB_Q].clone(),
        }
    }

    fn point(&self, r1: bool) -> Point {
        let (null, x, y) = if r1 {
            (self.r1_null, NB_XR1, NB_YR1)
        } else {
            (self.r0_null, NB_XR0, NB_YR0)
        };
        if null {
            Point::Infinity
        } else {
            Point::Affine {
                x: self.nb[x].clone(),
                y: self.nb[y].clone(),
            }
        }
    }

    fn set_r1(&mut self, pt: &Point) {
        let (x, y) = pt.coords();
        self.nb[NB_XR1] = x;
        self.nb[NB_YR1] = y;
        self.r1_null = pt.is_infinity();
    }

    fn latch(&mut self, err: StatusErr) {
        self.errors |= err;
    }

    fn start_busy(&mut self) {
        self.busy = self.params.busy_latency;
    }

    fn soft_reset(&mut self) {
        self.nn = self.params.nn;
        self.scalar = BigUint::zero();
        self.r0_null = true;
        self.r1_null = true;
        self.yes = false;
        self.errors = StatusErr::empty();
        self.access = None;
        self.token = None;
        self.init = INIT_READS;
        self.rnd_warmup = RND_WARMUP_READS;
        self.blinding = 0;
        self.shuffle = self.params.shuffle;
        self.zremask = None;
        self.small_scalar = None;
        self.irq = false;
        self.kp = None;
        self.fsm = StateMachine::new(Context);
        self.halt_pending = false;
        self.bkpts = [None; 4];
        self.bk_hit = None;
        self.last = None;
    }

    fn random_bits(&mut self, bits: u32, channel: Channel) -> BigUint {
        let nbytes = ((bits + 7) / 8) as usize;
        let mut bytes = vec![0u8; nbytes];
        match self.bypass {
            Some(true) => bytes.fill(0xff),
            Some(false) => {}
            None => self.rng.fill(&mut bytes[..]),
        }
        let excess = nbytes as u32 * 8 - bits;
        if let Some(msb) = bytes.first_mut() {
            *msb &= 0xffu8.checked_shr(excess).unwrap_or(0);
        }
        let ch = channel as usize;
        self.diag_ok[ch] = self.diag_ok[ch].wrapping_add(nbytes as u32);
        self.irn_counts[ch] = self.irn_counts[ch].saturating_sub(1);
        BigUint::from_bytes_be(&bytes)
    }

    fn random_below_p(&mut self, channel: Channel) -> BigUint {
        let v = self.random_bits(self.nn, channel);
        if self.nb[NB_P].is_zero() {
            v
        } else {
            v % &self.nb[NB_P]
        }
    }

    fn fill_raw_fifo(&mut self) {
        let size = self.params.raw_ram_size as usize;
        self.raw_fifo = (0..size).map(|_| self.rng.gen::<bool>()).collect();
    }

    fn status(&mut self) -> u32 {
        let mut s = Status::default();
        s.set_busy(self.busy > 0 || self.init > 0 || self.kp.is_some());
        s.set_kp(self.kp.is_some());
        s.set_init(self.init > 0);
        s.set_enough_rnd_wk(self.rnd_warmup == 0);
        s.set_yes(self.yes);
        s.set_r0_is_null(self.r0_null);
        s.set_r1_is_null(self.r1_null);
        s.set_errid(self.errors.bits());

        self.busy = self.busy.saturating_sub(1);
        self.init = self.init.saturating_sub(1);
        self.rnd_warmup = self.rnd_warmup.saturating_sub(1);
        if self.busy == 0 && self.kp.is_none() {
            self.irn_counts = IRN_FIFO_DEPTHS;
        }
        s.into()
    }

    fn on_write_ctrl(&mut self, val: u32) {
        let ctrl = LocalRegisterCopy::<u32, Ctrl::Register>::new(val);
        if self.kp.is_some() {
            self.latch(StatusErr::KP_FBD);
            return;
        }
        self.start_busy();
        let addr = ctrl.read(Ctrl::NBADDR) as usize;

        if ctrl.is_set(Ctrl::WRITE_NB) {
            let scalar = ctrl.is_set(Ctrl::WRITE_K);
            if !scalar && addr >= NB_COUNT {
                self.latch(StatusErr::UNKNOWN_REG);
                self.access = None;
                return;
            }
            if scalar && self.rnd_warmup > 0 {
                self.latch(StatusErr::NOT_ENOUGH_RANDOM_WK);
                self.access = None;
                return;
            }
            if scalar {
                self.scalar = BigUint::zero();
            } else {
                self.nb[addr] = BigUint::zero();
                match addr {
                    NB_XR0 | NB_YR0 => self.r0_null = false,
                    NB_XR1 | NB_YR1 => self.r1_null = false,
                    _ => {}
                }
            }
            self.access = Some(NbAccess::Write {
                addr,
                scalar,
                index: 0,
            });
        } else if ctrl.is_set(Ctrl::READ_NB) {
            let value = if ctrl.is_set(Ctrl::RD_TOKEN) {
                self.token.clone().unwrap_or_default()
            } else if addr < NB_COUNT {
                self.nb[addr].clone()
            } else {
                self.latch(StatusErr::UNKNOWN_REG);
                self.access = None;
                return;
            };
            self.access = Some(NbAccess::Read { value, index: 0 });
        } else if ctrl.is_set(Ctrl::PT_KP) {
            self.access = None;
            self.start_kp();
        } else {
            self.access = None;
            self.point_op(ctrl);
        }
    }

    fn point_op(&mut self, ctrl: LocalRegisterCopy<u32, Ctrl::Register>) {
        let curve = self.curve();
        let r0 = self.point(false);
        let r1 = self.point(true);
        if ctrl.is_set(Ctrl::PT_ADD) {
            self.set_r1(&curve.add(&r0, &r1));
        } else if ctrl.is_set(Ctrl::PT_DBL) {
            self.set_r1(&curve.double(&r0));
        } else if ctrl.is_set(Ctrl::PT_NEG) {
            self.set_r1(&curve.neg(&r0));
        } else if ctrl.is_set(Ctrl::PT_CHK) {
            self.yes = curve.is_on_curve(&r0);
        } else if ctrl.is_set(Ctrl::PT_EQU) {
            self.yes = r0 == r1;
        } else if ctrl.is_set(Ctrl::PT_OPP) {
            self.yes = r0 == curve.neg(&r1);
        }
        self.op_time = 1;
    }

    fn start_kp(&mut self) {
        let curve = self.curve();
        let point = self.point(true);
        if !curve.is_on_curve(&point) {
            self.latch(StatusErr::IN_PT_NOT_ON_CURVE);
            return;
        }

        let (scalar, nbits, alpha) = match self.small_scalar.take() {
            Some(size) => {
                let mask = (BigUint::from(1u32) << size) - 1u32;
                (&self.scalar & mask, size, None)
            }
            None if self.blinding > 0 => {
                let alpha = self.random_bits(self.blinding, Channel::Axi);
                let blinded = &self.scalar + &alpha * &curve.q;
                let nbits = (self.nn + self.blinding).max(blinded.bits() as u32);
                (blinded, nbits, Some(alpha))
            }
            None => {
                let nbits = self.nn.max(self.scalar.bits() as u32);
                (self.scalar.clone(), nbits, None)
            }
        };
        let randoms = KpRandoms {
            alpha,
            phi0: self.random_below_p(Channel::Efp),
            phi1: self.random_below_p(Channel::Efp),
            lambda: self.random_below_p(Channel::Efp),
        };
        if self.shuffle {
            self.random_bits(self.params.irn_shf_width, Channel::Shf);
        }
        if self.xyshuf {
            self.random_bits(1, Channel::Crv);
        }

        self.kp = Some(KpRun::new(KpInputs {
            curve: &curve,
            point,
            scalar,
            nbits,
            randoms,
        }));
        self.op_time = 0;
        self.bk_hit = None;
        let _ = self.fsm.process_event(Events::Start);
        let halt_now = std::mem::take(&mut self.halt_pending);
        self.run(if halt_now { Some(1) } else { None });
    }

    fn breakpoint_hit(&self, pos: &Position) -> Option<u32> {
        self.bkpts.iter().enumerate().find_map(|(id, bkpt)| {
            let bkpt = bkpt.as_ref()?;
            if bkpt.addr != pos.pc {
                return None;
            }
            if bkpt.state != 0 {
                if bkpt.state != u32::from(pos.state) {
                    return None;
                }
                let ladder = matches!(pos.state, FsmState::Zaddu | FsmState::Zaddc);
                if ladder && bkpt.nbbit != pos.flags.jnbbit() {
                    return None;
                }
            }
            Some(id as u32)
        })
    }

    /// Runs the sequencer until a breakpoint, until `budget` opcodes have
    /// been executed, or until the end of the program.
    fn run(&mut self, budget: Option<u32>) {
        let mut executed = 0u32;
        loop {
            let Some(pos) = self.kp.as_mut().and_then(|kp| kp.advance()).cloned() else {
                self.finish_kp();
                return;
            };
            self.op_time += 1;
            executed += 1;
            for write in pos.writes.iter() {
                self.fp_store(write.slot, &write.value);
            }
            let hit = self.breakpoint_hit(&pos);
            self.last = Some(pos);
            if hit.is_some() || budget.map_or(false, |n| executed >= n) {
                self.bk_hit = hit;
                let _ = self.fsm.process_event(Events::Hit);
                return;
            }
        }
    }

    fn finish_kp(&mut self) {
        let Some(kp) = self.kp.take() else {
            return;
        };
        let token = if self.token_enabled {
            self.token.take().unwrap_or_default()
        } else {
            self.token = None;
            BigUint::zero()
        };
        let (x, y) = kp.result.coords();
        self.nb[NB_XR1] = x ^ &token;
        self.nb[NB_YR1] = y ^ &token;
        self.r1_null = kp.result.is_infinity();
        self.rnd_warmup = RND_WARMUP_READS;
        self.last = None;
        self.start_busy();
        let _ = self.fsm.process_event(Events::Done);
    }

    fn limb_count(&self) -> u32 {
        (self.nn + 4 + self.params.ww - 1) / self.params.ww
    }

    fn fp_store(&mut self, slot: u32, value: &BigUint) {
        let n = self.limb_count();
        let stride = n.next_power_of_two();
        let digits = value.to_u32_digits();
        for i in 0..n {
            let addr = (slot * stride + i) as usize;
            if let Some(limb) = self.fp.get_mut(addr) {
                *limb = digits.get(i as usize).copied().unwrap_or(0);
            }
        }
    }

    fn on_write_steps(&mut self, val: u32) {
        let steps = LocalRegisterCopy::<u32, Steps::Register>::new(val);
        if !self.is_halted() {
            return;
        }
        if steps.is_set(Steps::RESUME) {
            let _ = self.fsm.process_event(Events::Resume);
            self.bk_hit = None;
            self.run(None);
        } else if steps.is_set(Steps::RUN_NB_OP) {
            let n = steps.read(Steps::NB_OP).max(1);
            let _ = self.fsm.process_event(Events::Step);
            self.bk_hit = None;
            self.run(Some(n));
        }
    }

    fn on_write_bkpt(&mut self, val: u32) {
        let bkpt = LocalRegisterCopy::<u32, Bkpt::Register>::new(val);
        let id = bkpt.read(Bkpt::ID) as usize;
        self.bkpts[id] = if bkpt.is_set(Bkpt::EN) {
            Some(Breakpoint {
                addr: bkpt.read(Bkpt::ADDR),
                nbbit: bkpt.read(Bkpt::NBBIT),
                state: bkpt.read(Bkpt::STATE),
            })
        } else {
            None
        };
    }

    fn on_write_trng_ctrl(&mut self, val: u32) {
        let ctrl = LocalRegisterCopy::<u32, TrngCtrl::Register>::new(val);
        self.postproc = !ctrl.is_set(TrngCtrl::POSTPROC_DISABLE);
        self.raw_read_enabled = !ctrl.is_set(TrngCtrl::RAW_READ_DISABLE);
        self.bypass = if ctrl.is_set(TrngCtrl::BYPASS) {
            Some(ctrl.is_set(TrngCtrl::BYPASS_VAL))
        } else {
            None
        };
        if ctrl.is_set(TrngCtrl::RESET_RAW_FIFO) {
            self.raw_fifo.clear();
        }
        if ctrl.is_set(TrngCtrl::RESET_IRN_FIFOS) {
            self.irn_counts = [0; 4];
        }
        if ctrl.is_set(TrngCtrl::READ_RAW) && self.raw_read_enabled {
            let addr = ctrl.read(TrngCtrl::FIFO_ADDR) as usize;
            self.raw_data = self.raw_fifo.get(addr).copied().unwrap_or(false);
        }
    }

    fn trng_status(&mut self) -> u32 {
        let mut s = DbgTrngStatus::default();
        s.set_full(self.raw_fifo.len() as u32 >= self.params.raw_ram_size);
        s.set_wr_ptr(self.raw_fifo.len() as u32);
        if self.raw_fifo.len() < self.params.raw_ram_size as usize {
            self.fill_raw_fifo();
        }
        s.into()
    }

    fn debug_status(&self) -> u32 {
        let mut s = DbgStatus::default();
        s.set_halted(self.is_halted());
        if let Some(id) = self.bk_hit {
            s.set_bk_hit(true);
            s.set_bkid(id);
        }
        if let Some(pos) = &self.last {
            s.set_pc(pos.pc);
            s.set_state(pos.state.into());
        }
        s.into()
    }

    fn capabilities(&self) -> u32 {
        let mut caps = Capabilities::default();
        caps.set_dbg_n_prod(self.params.debug);
        caps.set_shf(self.params.shuffle);
        caps.set_nndyn(self.params.nndyn);
        caps.set_w64(self.params.w64);
        caps.set_nnmax(self.params.nnmax);
        caps.into()
    }

    fn read_data(&mut self) -> u64 {
        let bits = self.word_bits();
        let mask = self.word_mask();
        match &mut self.access {
            Some(NbAccess::Read { value, index }) => {
                let word = (&*value >> (*index * bits)).iter_u64_digits().next().unwrap_or(0);
                *index += 1;
                word & mask
            }
            _ => {
                self.latch(StatusErr::RDNB_FBD);
                0
            }
        }
    }

    fn write_data(&mut self, val: u64) {
        let bits = self.word_bits();
        let word = BigUint::from(val & self.word_mask());
        match &mut self.access {
            Some(NbAccess::Write {
                addr,
                scalar,
                index,
            }) => {
                let shifted = word << (*index * bits);
                if *scalar {
                    self.scalar |= shifted;
                } else {
                    self.nb[*addr] |= shifted;
                }
                *index += 1;
            }
            _ => self.latch(StatusErr::WREG_FBD),
        }
        self.start_busy();
    }

    fn read_debug(&mut self, offset: usize) -> Result<u64, BusError> {
        let val = match offset {
            r::DBG_CAPABILITIES_0 => self.params.ww,
            r::DBG_CAPABILITIES_1 => {
                let mut caps = DbgCapabilities1::default();
                caps.set_nb_opcodes(self.params.nb_opcodes);
                caps.set_opcode_size(OPCODE_SIZE);
                caps.into()
            }
            r::DBG_CAPABILITIES_2 => {
                let mut caps = DbgCapabilities2::default();
                caps.set_raw_ram_size(self.params.raw_ram_size);
                caps.set_irn_shf_width(self.params.irn_shf_width);
                caps.into()
            }
            r::DBG_STATUS => self.debug_status(),
            r::DBG_TIME => self.op_time,
            r::DBG_RAWDUR => self.params.raw_ram_size * 4,
            r::DBG_EXP_FLAGS => self
                .last
                .as_ref()
                .map_or(ExpFlags::default(), |pos| pos.flags)
                .into(),
            r::DBG_TRNG_STATUS => self.trng_status(),
            r::DBG_TRNG_RAW_DATA => u32::from(self.raw_data),
            r::DBG_FP_RDATA => self.fp_rdata,
            r::DBG_IRN_CNT_AXI => self.irn_counts[Channel::Axi as usize],
            r::DBG_IRN_CNT_EFP => self.irn_counts[Channel::Efp as usize],
            r::DBG_IRN_CNT_CRV => self.irn_counts[Channel::Crv as usize],
            r::DBG_IRN_CNT_SHF => self.irn_counts[Channel::Shf as usize],
            r::DBG_FP_RDATA_RDY => u32::from(self.fp_rdy),
            r::DBG_TRNG_DIAG_0 => self.diag_global_starv,
            r::DBG_TRNG_DIAG_1 => self.diag_ok[Channel::Axi as usize],
            r::DBG_TRNG_DIAG_2 => self.diag_starv[Channel::Axi as usize],
            r::DBG_TRNG_DIAG_3 => self.diag_ok[Channel::Efp as usize],
            r::DBG_TRNG_DIAG_4 => self.diag_starv[Channel::Efp as usize],
            r::DBG_TRNG_DIAG_5 => self.diag_ok[Channel::Crv as usize],
            r::DBG_TRNG_DIAG_6 => self.diag_starv[Channel::Crv as usize],
            r::DBG_TRNG_DIAG_7 => self.diag_ok[Channel::Shf as usize],
            r::DBG_TRNG_DIAG_8 => self.diag_starv[Channel::Shf as usize],
            _ => Err(BusError::LoadAccessFault)?,
        };
        Ok(u64::from(val))
    }

    fn read_reg(&mut self, offset: usize) -> Result<u64, BusError> {
        let val = match offset {
            r::STATUS => u64::from(self.status()),
            r::READ_DATA => self.read_data(),
            r::CAPABILITIES => u64::from(self.capabilities()),
            r::PRIME_SIZE => u64::from(self.nn),
            r::HW_VERSION => {
                let mut version = HwVersion::default();
                version.set_major(self.params.version_major);
                version.set_minor(self.params.version_minor);
                u64::from(u32::from(version))
            }
            _ if offset >= r::DBG_CAPABILITIES_0 => {
                let val = self.read_debug(offset)?;
                if self.params.debug {
                    val
                } else {
                    0
                }
            }
            _ => Err(BusError::LoadAccessFault)?,
        };
        Ok(val)
    }

    fn write_debug(&mut self, offset: usize, val: u32) -> Result<(), BusError> {
        let en = LocalRegisterCopy::<u32, Enable::Register>::new(val).is_set(Enable::EN);
        match offset {
            w::DBG_HALT => {
                if en {
                    self.halt_pending = true;
                }
            }
            w::DBG_BKPT => self.on_write_bkpt(val),
            w::DBG_STEPS => self.on_write_steps(val),
            w::DBG_TRIG_ACT => self.trig_armed = en,
            w::DBG_TRIG_UP => self.trig_up = val,
            w::DBG_TRIG_DOWN => self.trig_down = val,
            w::DBG_OP_WADDR => self.op_waddr = val,
            w::DBG_OPCODE => {
                if let Some(op) = self.imem.get_mut(self.op_waddr as usize) {
                    *op = val;
                }
            }
            w::DBG_TRNG_CTRL => self.on_write_trng_ctrl(val),
            w::DBG_TRNG_CFG => self.trng_cfg = val,
            w::DBG_FP_WADDR => self.fp_waddr = val,
            w::DBG_FP_WDATA => {
                if let Some(limb) = self.fp.get_mut(self.fp_waddr as usize) {
                    *limb = val;
                }
            }
            w::DBG_FP_RADDR => {
                self.fp_rdata = self.fp.get(val as usize).copied().unwrap_or(0);
                self.fp_rdy = true;
            }
            w::DBG_CFG_XYSHUF => self.xyshuf = en,
            w::DBG_CFG_AXIMSK => self.aximsk = en,
            w::DBG_CFG_TOKEN => self.token_enabled = en,
            w::DBG_RESET_TRNG_CNT => {
                self.diag_ok = [0; 4];
                self.diag_starv = [0; 4];
            }
            _ => Err(BusError::StoreAccessFault)?,
        }
        Ok(())
    }

    fn write_reg(&mut self, offset: usize, val: u64) -> Result<(), BusError> {
        let val32 = val as u32;
        let en = LocalRegisterCopy::<u32, Enable::Register>::new(val32).is_set(Enable::EN);
        match offset {
            w::CTRL => self.on_write_ctrl(val32),
            w::WRITE_DATA => self.write_data(val),
            w::R0_NULL => {
                self.r0_null = en;
                self.start_busy();
            }
            w::R1_NULL => {
                self.r1_null = en;
                self.start_busy();
            }
            w::PRIME_SIZE => {
                let nn = val32 & PRIME_SIZE_MASK;
                if !self.params.nndyn || nn < NN_MIN || nn > self.params.nnmax {
                    self.latch(StatusErr::NNDYN);
                } else {
                    self.nn = nn;
                }
                self.start_busy();
            }
            w::BLINDING => {
                let bln = LocalRegisterCopy::<u32, Blinding::Register>::new(val32);
                if !bln.is_set(Blinding::EN) {
                    self.blinding = 0;
                } else if bln.read(Blinding::BITS) >= self.nn || bln.read(Blinding::BITS) == 0 {
                    self.latch(StatusErr::BLN);
                } else {
                    self.blinding = bln.read(Blinding::BITS);
                }
                self.start_busy();
            }
            w::SHUFFLE => {
                if en && !self.params.shuffle {
                    self.latch(StatusErr::SHUFFLE);
                } else if !en && !self.params.debug {
                    self.latch(StatusErr::SHUFFLE);
                } else {
                    self.shuffle = en;
                }
                self.start_busy();
            }
            w::ZREMASK => {
                let zr = LocalRegisterCopy::<u32, Zremask::Register>::new(val32);
                self.zremask = if zr.is_set(Zremask::EN) {
                    Some(zr.read(Zremask::PERIOD) + 1)
                } else {
                    None
                };
                self.start_busy();
            }
            w::TOKEN => {
                let token = self.random_bits(self.nn, Channel::Axi);
                self.token = Some(token);
                self.start_busy();
            }
            w::IRQ => self.irq = en,
            w::ERR_ACK => {
                self.errors &= !StatusErr::from_ack_value(val32);
            }
            w::SMALL_SCALAR => {
                self.small_scalar = Some(val32 & ipecc_registers::SMALL_SCALAR_MASK);
                self.start_busy();
            }
            w::SOFT_RESET => self.soft_reset(),
            _ if offset >= w::DBG_HALT => {
                if self.params.debug {
                    self.write_debug(offset, val32)?;
                }
            }
            _ => Err(BusError::StoreAccessFault)?,
        }
        Ok(())
    }

    fn check_offset(size: AccessSize, addr: BusAddr, err: BusError) -> Result<usize, BusError> {
        check_alignment(size, addr, err)?;
        let offset = addr as usize;
        if offset % 8 != 0 || offset >= WINDOW_SIZE {
            return Err(err);
        }
        Ok(offset)
    }
}

/// Distance in limbs between two consecutive Fp memory slots.
fn fp_stride(nn: u32, ww: u32) -> u32 {
    ((nn + 4 + ww - 1) / ww).next_power_of_two()
}

impl Bus for AsymIpecc {
    /// Word accesses carry the value in the low half; double-word accesses
    /// carry it with the 32-bit halves swapped.
    fn read(&mut self, size: AccessSize, addr: BusAddr) -> Result<BusData, BusError> {
        let offset = Self::check_offset(size, addr, BusError::LoadAccessFault)?;
        let val = self.read_reg(offset)?;
        Ok(match size {
            AccessSize::Word => val & u64::from(u32::MAX),
            AccessSize::DoubleWord => val.rotate_left(32),
        })
    }

    fn write(&mut self, size: AccessSize, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        let offset = Self::check_offset(size, addr, BusError::StoreAccessFault)?;
        let val = match size {
            AccessSize::Word => val & u64::from(u32::MAX),
            AccessSize::DoubleWord => val.rotate_left(32),
        };
        self.write_reg(offset, val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::tests::p256;
    use ipecc_registers::{microcode::addr, Ctrl as CtrlFlags};

    const WORD: AccessSize = AccessSize::Word;

    fn wr(ip: &mut AsymIpecc, offset: usize, val: u32) {
        ip.write(WORD, offset as u32, u64::from(val)).unwrap();
    }

    fn rd(ip: &mut AsymIpecc, offset: usize) -> u32 {
        ip.read(WORD, offset as u32).unwrap() as u32
    }

    fn settle(ip: &mut AsymIpecc) -> Status {
        for _ in 0..16 {
            let status = Status::from(rd(ip, r::STATUS));
            if !status.busy() && status.enough_rnd_wk() {
                return status;
            }
        }
        panic!("model stuck busy");
    }

    fn write_nb(ip: &mut AsymIpecc, ctrl: CtrlFlags, addr: u32, value: &BigUint) {
        settle(ip);
        wr(ip, w::CTRL, ctrl.with_nbaddr(addr));
        for digit in value.to_u32_digits().iter().chain(std::iter::repeat(&0)).take(8) {
            wr(ip, w::WRITE_DATA, *digit);
        }
    }

    fn read_nb(ip: &mut AsymIpecc, ctrl: CtrlFlags, addr: u32) -> BigUint {
        settle(ip);
        wr(ip, w::CTRL, ctrl.with_nbaddr(addr));
        let digits: Vec<u32> = (0..8).map(|_| rd(ip, r::READ_DATA)).collect();
        BigUint::from_slice(&digits)
    }

    fn setup(ip: &mut AsymIpecc) -> Point {
        let (curve, g) = p256();
        wr(ip, w::SOFT_RESET, 1);
        for (addr, v) in [(0, &curve.p), (1, &curve.a), (2, &curve.b), (3, &curve.q)] {
            write_nb(ip, CtrlFlags::WRITE_NB, addr, v);
        }
        g
    }

    fn load_r1(ip: &mut AsymIpecc, pt: &Point) {
        let (x, y) = pt.coords();
        write_nb(ip, CtrlFlags::WRITE_NB, 6, &x);
        write_nb(ip, CtrlFlags::WRITE_NB, 7, &y);
    }

    #[test]
    fn test_status_after_reset() {
        let mut ip = AsymIpecc::new(IpeccParams::default());
        wr(&mut ip, w::SOFT_RESET, 1);
        let status = Status::from(rd(&mut ip, r::STATUS));
        assert!(status.busy());
        assert!(status.init());
        let status = settle(&mut ip);
        assert!(status.r0_is_null());
        assert!(status.r1_is_null());
        assert_eq!(status.errid(), 0);
        assert_eq!(rd(&mut ip, r::PRIME_SIZE), 256);
    }

    #[test]
    fn test_double_word_access_swaps_halves() {
        let mut ip = AsymIpecc::new(IpeccParams::default());
        let raw = ip.read(AccessSize::DoubleWord, r::PRIME_SIZE as u32).unwrap();
        assert_eq!(raw, 256u64 << 32);
        ip.write(AccessSize::DoubleWord, w::PRIME_SIZE as u32, 384u64 << 32)
            .unwrap();
        assert_eq!(ip.nn(), 384);
        assert_eq!(
            ip.read(WORD, 0x004),
            Err(BusError::LoadAccessFault)
        );
    }

    #[test]
    fn test_kp_with_token() {
        let mut ip = AsymIpecc::new(IpeccParams::default());
        let g = setup(&mut ip);
        let (curve, _) = p256();
        load_r1(&mut ip, &g);
        write_nb(&mut ip, CtrlFlags::WRITE_NB | CtrlFlags::WRITE_K, 4, &BigUint::from(3u32));

        settle(&mut ip);
        wr(&mut ip, w::TOKEN, 1);
        let token = read_nb(&mut ip, CtrlFlags::READ_NB | CtrlFlags::RD_TOKEN, 0);
        assert!(!token.is_zero());

        settle(&mut ip);
        wr(&mut ip, w::CTRL, CtrlFlags::PT_KP.bits());
        let status = settle(&mut ip);
        assert_eq!(status.errid(), 0);
        assert!(!status.r1_is_null());

        let x = read_nb(&mut ip, CtrlFlags::READ_NB, 6) ^ &token;
        let y = read_nb(&mut ip, CtrlFlags::READ_NB, 7) ^ &token;
        let expected = curve.scalar_mul(&BigUint::from(3u32), &g, 256);
        assert_eq!(Point::Affine { x, y }, expected);
    }

    #[test]
    fn test_kp_rejects_point_off_curve() {
        let mut ip = AsymIpecc::new(IpeccParams::default());
        setup(&mut ip);
        load_r1(
            &mut ip,
            &Point::Affine {
                x: BigUint::from(1u32),
                y: BigUint::from(2u32),
            },
        );
        settle(&mut ip);
        wr(&mut ip, w::CTRL, CtrlFlags::PT_KP.bits());
        let status = settle(&mut ip);
        assert_eq!(status.errors(), StatusErr::IN_PT_NOT_ON_CURVE);

        wr(&mut ip, w::ERR_ACK, StatusErr::IN_PT_NOT_ON_CURVE.ack_value());
        assert_eq!(settle(&mut ip).errid(), 0);
    }

    #[test]
    fn test_scalar_write_needs_randomness() {
        let mut ip = AsymIpecc::new(IpeccParams::default());
        wr(&mut ip, w::SOFT_RESET, 1);
        wr(
            &mut ip,
            w::CTRL,
            (CtrlFlags::WRITE_NB | CtrlFlags::WRITE_K).with_nbaddr(4),
        );
        assert_eq!(ip.errors(), StatusErr::NOT_ENOUGH_RANDOM_WK);
    }

    #[test]
    fn test_breakpoint_step_resume() {
        let mut ip = AsymIpecc::new(IpeccParams::default());
        let g = setup(&mut ip);
        load_r1(&mut ip, &g);
        write_nb(&mut ip, CtrlFlags::WRITE_NB | CtrlFlags::WRITE_K, 4, &BigUint::from(2u32));
        settle(&mut ip);

        wr(&mut ip, w::DBG_BKPT, 0x1 | (addr::KP_ENTRY << 4));
        wr(&mut ip, w::CTRL, CtrlFlags::PT_KP.bits());
        assert!(ip.is_halted());
        let status = DbgStatus::from(rd(&mut ip, r::DBG_STATUS));
        assert!(status.halted() && status.bk_hit());
        assert_eq!(status.pc(), addr::KP_ENTRY);
        assert_eq!(FsmState::from(status.state()), FsmState::CheckOnCurve);

        wr(&mut ip, w::DBG_STEPS, 0x1 | (3 << 8));
        let status = DbgStatus::from(rd(&mut ip, r::DBG_STATUS));
        assert!(status.halted() && !status.bk_hit());
        assert_eq!(status.pc(), addr::KP_ENTRY + 3);
        assert!(Status::from(rd(&mut ip, r::STATUS)).busy());

        wr(&mut ip, w::DBG_BKPT, 0);
        wr(&mut ip, w::DBG_STEPS, 1 << 28);
        assert!(!ip.is_halted());
        assert!(!ip.is_kp_running());
        assert!(!settle(&mut ip).r1_is_null());
    }

    #[test]
    fn test_production_locks() {
        let mut ip = AsymIpecc::new(IpeccParams {
            debug: false,
            ..Default::default()
        });
        wr(&mut ip, w::SOFT_RESET, 1);
        settle(&mut ip);
        wr(&mut ip, w::SHUFFLE, 0);
        assert_eq!(ip.errors(), StatusErr::SHUFFLE);
        assert!(ip.is_shuffle_enabled());

        wr(&mut ip, w::DBG_CFG_XYSHUF, 1);
        assert!(!ip.is_xyshuf_enabled());
        assert_eq!(rd(&mut ip, r::DBG_CAPABILITIES_0), 0);
    }

    #[test]
    fn test_fp_memory_handshake() {
        let mut ip = AsymIpecc::new(IpeccParams::default());
        wr(&mut ip, w::DBG_FP_WADDR, 0x21);
        wr(&mut ip, w::DBG_FP_WDATA, 0xdead_beef);
        wr(&mut ip, w::DBG_FP_RADDR, 0x21);
        assert_eq!(rd(&mut ip, r::DBG_FP_RDATA_RDY), 1);
        assert_eq!(rd(&mut ip, r::DBG_FP_RDATA), 0xdead_beef);
    }
}
