/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the IPECC register map: slot offsets, bit layouts of the
    control, status, countermeasure and debug registers, and the main FSM
    state codes.

--*/
#![no_std]

#[macro_use]
extern crate bitfield;
#[macro_use]
extern crate bitflags;

pub mod microcode;
mod mmio;

pub use mmio::{Mmio, RealMmio};

/// Write-only register slots.
pub mod w {
    pub const CTRL: usize = 0x000;
    pub const WRITE_DATA: usize = 0x008;
    pub const R0_NULL: usize = 0x010;
    pub const R1_NULL: usize = 0x018;
    pub const PRIME_SIZE: usize = 0x020;
    pub const BLINDING: usize = 0x028;
    pub const SHUFFLE: usize = 0x030;
    pub const ZREMASK: usize = 0x038;
    pub const TOKEN: usize = 0x040;
    pub const IRQ: usize = 0x048;
    pub const ERR_ACK: usize = 0x050;
    pub const SMALL_SCALAR: usize = 0x058;
    pub const SOFT_RESET: usize = 0x060;

    pub const DBG_HALT: usize = 0x100;
    pub const DBG_BKPT: usize = 0x108;
    pub const DBG_STEPS: usize = 0x110;
    pub const DBG_TRIG_ACT: usize = 0x118;
    pub const DBG_TRIG_UP: usize = 0x120;
    pub const DBG_TRIG_DOWN: usize = 0x128;
    pub const DBG_OP_WADDR: usize = 0x130;
    pub const DBG_OPCODE: usize = 0x138;
    pub const DBG_TRNG_CTRL: usize = 0x140;
    pub const DBG_TRNG_CFG: usize = 0x148;
    pub const DBG_FP_WADDR: usize = 0x150;
    pub const DBG_FP_WDATA: usize = 0x158;
    pub const DBG_FP_RADDR: usize = 0x160;
    pub const DBG_CFG_XYSHUF: usize = 0x168;
    pub const DBG_CFG_AXIMSK: usize = 0x170;
    pub const DBG_CFG_TOKEN: usize = 0x178;
    pub const DBG_RESET_TRNG_CNT: usize = 0x180;
}

/// Read-only register slots.
pub mod r {
    pub const STATUS: usize = 0x000;
    pub const READ_DATA: usize = 0x008;
    pub const CAPABILITIES: usize = 0x010;
    pub const PRIME_SIZE: usize = 0x018;
    pub const HW_VERSION: usize = 0x020;

    pub const DBG_CAPABILITIES_0: usize = 0x100;
    pub const DBG_CAPABILITIES_1: usize = 0x108;
    pub const DBG_CAPABILITIES_2: usize = 0x110;
    pub const DBG_STATUS: usize = 0x118;
    pub const DBG_TIME: usize = 0x120;
    pub const DBG_RAWDUR: usize = 0x128;
    pub const DBG_EXP_FLAGS: usize = 0x130;
    pub const DBG_TRNG_STATUS: usize = 0x138;
    pub const DBG_TRNG_RAW_DATA: usize = 0x140;
    pub const DBG_FP_RDATA: usize = 0x148;
    pub const DBG_IRN_CNT_AXI: usize = 0x150;
    pub const DBG_IRN_CNT_EFP: usize = 0x158;
    pub const DBG_IRN_CNT_CRV: usize = 0x160;
    pub const DBG_IRN_CNT_SHF: usize = 0x168;
    pub const DBG_FP_RDATA_RDY: usize = 0x170;
    pub const DBG_TRNG_DIAG_0: usize = 0x178;
    pub const DBG_TRNG_DIAG_1: usize = 0x180;
    pub const DBG_TRNG_DIAG_2: usize = 0x188;
    pub const DBG_TRNG_DIAG_3: usize = 0x190;
    pub const DBG_TRNG_DIAG_4: usize = 0x198;
    pub const DBG_TRNG_DIAG_5: usize = 0x1a0;
    pub const DBG_TRNG_DIAG_6: usize = 0x1a8;
    pub const DBG_TRNG_DIAG_7: usize = 0x1b0;
    pub const DBG_TRNG_DIAG_8: usize = 0x1b8;
}

/// Size in bytes of the register window.
pub const WINDOW_SIZE: usize = 0x200;

bitflags! {
    /// Command and big-number access bits of `W_CTRL`.
    pub struct Ctrl: u32 {
        const PT_KP = 1 << 0;
        const PT_ADD = 1 << 1;
        const PT_DBL = 1 << 2;
        const PT_CHK = 1 << 3;
        const PT_NEG = 1 << 4;
        const PT_EQU = 1 << 5;
        const PT_OPP = 1 << 6;
        const RD_TOKEN = 1 << 12;
        const WRITE_NB = 1 << 16;
        const READ_NB = 1 << 17;
        const WRITE_K = 1 << 18;
    }
}

impl Ctrl {
    pub const NBADDR_POS: u32 = 20;
    pub const NBADDR_MASK: u32 = 0xfff;

    /// Raw `W_CTRL` value selecting big-number address `addr`.
    pub fn with_nbaddr(self, addr: u32) -> u32 {
        self.bits() | ((addr & Self::NBADDR_MASK) << Self::NBADDR_POS)
    }

    /// Big-number address carried by a raw `W_CTRL` value.
    pub fn nbaddr(raw: u32) -> u32 {
        (raw >> Self::NBADDR_POS) & Self::NBADDR_MASK
    }
}

bitflags! {
    /// Error latch reported in `R_STATUS.ERRID` and cleared through `W_ERR_ACK`.
    pub struct StatusErr: u32 {
        const IN_PT_NOT_ON_CURVE = 1 << 0;
        const OUT_PT_NOT_ON_CURVE = 1 << 1;
        const COMP = 1 << 2;
        const WREG_FBD = 1 << 3;
        const KP_FBD = 1 << 4;
        const NNDYN = 1 << 5;
        const POP_FBD = 1 << 6;
        const RDNB_FBD = 1 << 7;
        const BLN = 1 << 8;
        const UNKNOWN_REG = 1 << 9;
        const TOKEN = 1 << 10;
        const SHUFFLE = 1 << 11;
        const ZREMASK = 1 << 12;
        const NOT_ENOUGH_RANDOM_WK = 1 << 13;
        const RREG_FBD = 1 << 14;
    }
}

impl StatusErr {
    /// `W_ERR_ACK` value clearing exactly these bits.
    pub fn ack_value(self) -> u32 {
        (self.bits() & 0xffff) << 16
    }

    /// Bits acknowledged by a raw `W_ERR_ACK` value.
    pub fn from_ack_value(raw: u32) -> Self {
        Self::from_bits_truncate(raw >> 16)
    }
}

/// Implements the raw `u32` conversions of a register wrapper.
macro_rules! register_u32 {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<u32> for $name {
                fn from(val: u32) -> Self {
                    Self(val)
                }
            }

            impl From<$name> for u32 {
                fn from(val: $name) -> Self {
                    val.0
                }
            }
        )*
    };
}

bitfield! {
    /// `R_STATUS`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct Status(u32);

    /// A command or register access is in progress
    pub busy, set_busy: 0;

    /// A [k]P computation is running
    pub kp, set_kp: 4;

    /// Montgomery constants are being computed
    pub mty, set_mty: 5;

    /// A point operation other than [k]P is running
    pub pop, set_pop: 6;

    /// A big-number read or write is in progress
    pub r_or_w, set_r_or_w: 7;

    /// The IP is initializing after reset
    pub init, set_init: 8;

    /// A dynamic prime size change is in progress
    pub nndynact, set_nndynact: 9;

    /// Enough random words are available to mask the scalar
    pub enough_rnd_wk, set_enough_rnd_wk: 10;

    /// Answer of the last CHK, EQU or OPP command
    pub yes, set_yes: 11;

    /// R0 is the point at infinity
    pub r0_is_null, set_r0_is_null: 12;

    /// R1 is the point at infinity
    pub r1_is_null, set_r1_is_null: 13;

    /// A token is being generated
    pub token_gen, set_token_gen: 14;

    /// Latched error bits, see [`StatusErr`]
    pub u32, errid, set_errid: 31, 16;
}

impl Status {
    /// Latched error bits as flags.
    pub fn errors(&self) -> StatusErr {
        StatusErr::from_bits_truncate(self.errid())
    }
}

bitfield! {
    /// `R_CAPABILITIES`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct Capabilities(u32);

    /// IP was synthesized in debug (not production) mode
    pub dbg_n_prod, set_dbg_n_prod: 0;

    /// Shuffling countermeasure is available
    pub shf, set_shf: 4;

    /// Prime size can be changed at runtime
    pub nndyn, set_nndyn: 8;

    /// Big-number words are 64 bits wide
    pub w64, set_w64: 9;

    /// Largest supported prime size in bits
    pub u32, nnmax, set_nnmax: 31, 12;
}

bitfield! {
    /// `R_HW_VERSION`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct HwVersion(u32);

    pub u32, major, set_major: 31, 16;
    pub u32, minor, set_minor: 15, 0;
}

bitfield! {
    /// `W_BLINDING`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct Blinding(u32);

    pub en, set_en: 0;

    /// Number of random bits added to the scalar
    pub u32, bits, set_bits: 31, 4;
}

bitfield! {
    /// `W_ZREMASK`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct Zremask(u32);

    pub en, set_en: 0;

    /// Re-masking period in ladder steps, minus one
    pub u32, period_minus_one, set_period_minus_one: 31, 16;
}

bitfield! {
    /// `W_DBG_BKPT`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DbgBkpt(u32);

    pub en, set_en: 0;
    pub u32, id, set_id: 2, 1;
    pub u32, addr, set_addr: 15, 4;

    /// Scalar bit index the breakpoint is restricted to
    pub u32, nbbit, set_nbbit: 27, 16;

    /// FSM state the breakpoint is restricted to (0 = any)
    pub u32, state, set_state: 31, 28;
}

bitfield! {
    /// `W_DBG_STEPS`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DbgSteps(u32);

    pub run_nb_op, set_run_nb_op: 0;
    pub u32, nb_op, set_nb_op: 23, 8;
    pub resume, set_resume: 28;
}

bitfield! {
    /// `R_DBG_STATUS`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DbgStatus(u32);

    pub halted, set_halted: 0;
    pub u32, bkid, set_bkid: 2, 1;
    pub bk_hit, set_bk_hit: 3;
    pub u32, pc, set_pc: 15, 4;
    pub u32, state, set_state: 31, 28;
}

bitfield! {
    /// `R_DBG_EXP_FLAGS`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct ExpFlags(u32);

    pub r0z, set_r0z: 0;
    pub r1z, set_r1z: 1;
    pub kap, set_kap: 2;
    pub kapp, set_kapp: 3;
    pub zu, set_zu: 4;
    pub zc, set_zc: 5;

    /// Index of the scalar bit being processed
    pub u32, jnbbit, set_jnbbit: 31, 16;
}

bitfield! {
    /// `W_DBG_TRNG_CTRL`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DbgTrngCtrl(u32);

    pub postproc_disable, set_postproc_disable: 0;
    pub reset_raw_fifo, set_reset_raw_fifo: 1;
    pub reset_irn_fifos, set_reset_irn_fifos: 2;
    pub read_raw, set_read_raw: 4;
    pub u32, fifo_addr, set_fifo_addr: 27, 8;
    pub raw_read_disable, set_raw_read_disable: 28;
    pub bypass, set_bypass: 29;
    pub bypass_val, set_bypass_val: 30;
}

bitfield! {
    /// `W_DBG_TRNG_CFG`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DbgTrngCfg(u32);

    pub debias, set_debias: 0;
    pub u32, ta, set_ta: 19, 4;
    pub u32, idle, set_idle: 23, 20;
    pub use_pseudo, set_use_pseudo: 31;
}

bitfield! {
    /// `R_DBG_TRNG_STATUS`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DbgTrngStatus(u32);

    pub full, set_full: 0;
    pub u32, wr_ptr, set_wr_ptr: 31, 8;
}

bitfield! {
    /// `R_DBG_CAPABILITIES_1`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DbgCapabilities1(u32);

    pub u32, nb_opcodes, set_nb_opcodes: 15, 0;
    pub u32, opcode_size, set_opcode_size: 31, 16;
}

bitfield! {
    /// `R_DBG_CAPABILITIES_2`
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DbgCapabilities2(u32);

    pub u32, raw_ram_size, set_raw_ram_size: 15, 0;
    pub u32, irn_shf_width, set_irn_shf_width: 31, 16;
}

register_u32!(
    Status,
    Capabilities,
    HwVersion,
    Blinding,
    Zremask,
    DbgBkpt,
    DbgSteps,
    DbgStatus,
    ExpFlags,
    DbgTrngCtrl,
    DbgTrngCfg,
    DbgTrngStatus,
    DbgCapabilities1,
    DbgCapabilities2,
);

/// `W_SMALL_SCALAR` field mask.
pub const SMALL_SCALAR_MASK: u32 = 0xffff;

/// `W_PRIME_SIZE` / `R_PRIME_SIZE` field mask.
pub const PRIME_SIZE_MASK: u32 = 0xffff;

/// Main FSM state codes reported in debug status and used as breakpoint
/// qualifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FsmState {
    AnyOrIdle = 0,
    Cstmty = 1,
    CheckOnCurve = 2,
    BlindInit = 3,
    BlindBit = 4,
    BlindExit = 5,
    Adpa = 6,
    Setup = 7,
    Double = 8,
    Itoh = 10,
    Zaddu = 11,
    Zaddc = 12,
    SubtractP = 13,
    Exit = 14,
    /// Code 9 (retired) or 15.
    Unknown = 15,
}

impl FsmState {
    pub fn name(self) -> &'static str {
        match self {
            FsmState::AnyOrIdle => "IDLE",
            FsmState::Cstmty => "CSTMTY",
            FsmState::CheckOnCurve => "CHECKONCURVE",
            FsmState::BlindInit => "BLINDINIT",
            FsmState::BlindBit => "BLINDBIT",
            FsmState::BlindExit => "BLINDEXIT",
            FsmState::Adpa => "ADPA",
            FsmState::Setup => "SETUP",
            FsmState::Double => "DOUBLE",
            FsmState::Itoh => "ITOH",
            FsmState::Zaddu => "ZADDU",
            FsmState::Zaddc => "ZADDC",
            FsmState::SubtractP => "SUBTRACTP",
            FsmState::Exit => "EXIT",
            FsmState::Unknown => "UNKNOWN",
        }
    }
}

impl From<u32> for FsmState {
    fn from(val: u32) -> Self {
        match val & 0xf {
            0 => FsmState::AnyOrIdle,
            1 => FsmState::Cstmty,
            2 => FsmState::CheckOnCurve,
            3 => FsmState::BlindInit,
            4 => FsmState::BlindBit,
            5 => FsmState::BlindExit,
            6 => FsmState::Adpa,
            7 => FsmState::Setup,
            8 => FsmState::Double,
            10 => FsmState::Itoh,
            11 => FsmState::Zaddu,
            12 => FsmState::Zaddc,
            13 => FsmState::SubtractP,
            14 => FsmState::Exit,
            _ => FsmState::Unknown,
        }
    }
}

impl From<FsmState> for u32 {
    fn from(val: FsmState) -> Self {
        val as u32
    }
}
