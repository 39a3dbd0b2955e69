/*++

Licensed under the Apache-2.0 license.

File Name:

    ipecc.rs

Abstract:

    File contains the IPECC context: initialization, curve setup, point
    infinity flags and the point operation commands (ADD, DBL, NEG, CHK,
    EQU, OPP, KP).

--*/

use crate::regs::RegisterBlock;
use crate::{BigNumReg, IpeccConfig, KpTrace};
use alloc::vec;
use alloc::vec::Vec;
use ipecc_error::{IpeccError, IpeccResult};
use ipecc_registers::{r, w, Capabilities, Ctrl, HwVersion, Mmio, SMALL_SCALAR_MASK};

/// Point slot of the IP register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointIdx {
    R0,
    R1,
}

impl PointIdx {
    fn coords(self) -> (BigNumReg, BigNumReg) {
        match self {
            PointIdx::R0 => (BigNumReg::R0X, BigNumReg::R0Y),
            PointIdx::R1 => (BigNumReg::R1X, BigNumReg::R1Y),
        }
    }

    fn null_reg(self) -> usize {
        match self {
            PointIdx::R0 => w::R0_NULL,
            PointIdx::R1 => w::R1_NULL,
        }
    }
}

/// Affine point operand, coordinates big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EccPoint<'a> {
    pub x: &'a [u8],
    pub y: &'a [u8],
}

impl<'a> EccPoint<'a> {
    pub const fn new(x: &'a [u8], y: &'a [u8]) -> Self {
        Self { x, y }
    }
}

/// Point read back from the IP. Coordinates are `nn_bytes()` long and
/// meaningless when `is_infinity` is set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EccPointOut {
    pub x: Vec<u8>,
    pub y: Vec<u8>,
    pub is_infinity: bool,
}

impl EccPointOut {
    pub fn as_point(&self) -> EccPoint<'_> {
        EccPoint::new(&self.x, &self.y)
    }
}

/// Infinity flags of R0 and R1, saved around coordinate writes.
#[derive(Debug, Clone, Copy)]
struct InfinityFlags {
    r0: bool,
    r1: bool,
}

/// Driver context bound to one IPECC instance.
///
/// Point operations leave the infinity flag of each slot as it was before
/// the operands were written: a caller loading a finite point into a slot
/// last flagged infinite must clear the flag first, see
/// [`Ipecc::clear_point_infinity`].
pub struct Ipecc<M: Mmio> {
    pub(crate) regs: RegisterBlock<M>,
    pub(crate) config: IpeccConfig,
}

impl<M: Mmio> Ipecc<M> {
    /// Binds the driver to `mmio` without touching the device.
    pub fn bind(mmio: M, config: IpeccConfig) -> Self {
        Self {
            regs: RegisterBlock::new(mmio, config.word_layout),
            config,
        }
    }

    /// Binds the driver to `mmio`, soft-resets the IP and applies the
    /// initial TRNG configuration.
    pub fn init(mmio: M, config: IpeccConfig) -> IpeccResult<Self> {
        let mut ipecc = Self::bind(mmio, config);
        ipecc.reset()?;
        ipecc.configure_initial_trng()?;
        Ok(ipecc)
    }

    /// Soft-resets the IP and waits for it to come out of initialization.
    pub fn reset(&mut self) -> IpeccResult<()> {
        log::debug!("ipecc: soft reset");
        self.regs.write(w::SOFT_RESET, 1);
        self.wait_not_busy()
    }

    /// Enables TRNG post-processing on debug hardware, where it is off
    /// after reset. Production hardware needs nothing.
    pub fn configure_initial_trng(&mut self) -> IpeccResult<()> {
        if self.is_debug() {
            self.trng_postproc_enable()?;
        }
        Ok(())
    }

    pub fn mmio(&self) -> &M {
        self.regs.mmio()
    }

    pub fn into_mmio(self) -> M {
        self.regs.into_mmio()
    }

    pub fn config(&self) -> &IpeccConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from(self.regs.read(r::CAPABILITIES))
    }

    /// Whether the IP was synthesized in debug (as opposed to production)
    /// mode.
    pub fn is_debug(&self) -> bool {
        self.capabilities().dbg_n_prod()
    }

    /// Hardware `(major, minor)` version.
    pub fn version(&self) -> (u32, u32) {
        let version = HwVersion::from(self.regs.read(r::HW_VERSION));
        (version.major(), version.minor())
    }

    /// Sets the prime size in bits. Without the dynamic prime size
    /// capability the IP keeps its synthesized size and nothing is written.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_NN_TOO_LARGE` - `nn` exceeds the IP's NNMAX
    pub fn set_nn(&mut self, nn: u32) -> IpeccResult<()> {
        let caps = self.capabilities();
        if nn > caps.nnmax() {
            return Err(IpeccError::DRIVER_IPECC_NN_TOO_LARGE);
        }
        if caps.nndyn() {
            self.write_checked(w::PRIME_SIZE, nn)?;
        }
        Ok(())
    }

    /// Loads the curve `y^2 = x^3 + a*x + b` over Fp, of order `q`. The
    /// prime size is set from the longest of `p` and `q`.
    pub fn set_curve(&mut self, a: &[u8], b: &[u8], p: &[u8], q: &[u8]) -> IpeccResult<()> {
        let nn = 8 * p.len().max(q.len()) as u32;
        log::debug!("ipecc: set curve, nn = {nn}");
        self.set_nn(nn)?;
        self.write_nb(p, BigNumReg::P)?;
        self.write_nb(a, BigNumReg::A)?;
        self.write_nb(b, BigNumReg::B)?;
        self.write_nb(q, BigNumReg::Q)
    }

    /// Restricts the next [k]P to the `bits` least significant bits of the
    /// scalar. Applies to a single [k]P.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_SMALL_SCALAR_SIZE_INVALID` - `bits` is 0 or does not fit the register
    pub fn set_small_scalar_size(&mut self, bits: u32) -> IpeccResult<()> {
        if bits == 0 || bits > SMALL_SCALAR_MASK {
            return Err(IpeccError::DRIVER_IPECC_SMALL_SCALAR_SIZE_INVALID);
        }
        self.write_checked(w::SMALL_SCALAR, bits)
    }

    /// Enables the completion interrupt. The driver itself always polls.
    pub fn enable_irq(&mut self) -> IpeccResult<()> {
        self.write_checked(w::IRQ, 1)
    }

    pub fn point_is_infinity(&self, idx: PointIdx) -> IpeccResult<bool> {
        self.wait_not_busy()?;
        let status = self.status();
        Ok(match idx {
            PointIdx::R0 => status.r0_is_null(),
            PointIdx::R1 => status.r1_is_null(),
        })
    }

    pub fn set_point_infinity(&mut self, idx: PointIdx) -> IpeccResult<()> {
        self.write_checked(idx.null_reg(), 1)
    }

    pub fn clear_point_infinity(&mut self, idx: PointIdx) -> IpeccResult<()> {
        self.write_checked(idx.null_reg(), 0)
    }

    /// Reads the point held in `idx` into `x` and `y`, and returns the
    /// number of bytes written to each.
    ///
    /// # Errors
    ///
    /// * `DRIVER_IPECC_OUTPUT_BUFFER_TOO_SMALL` - `x` or `y` is shorter than `nn_bytes()`
    pub fn read_point_into(
        &mut self,
        idx: PointIdx,
        x: &mut [u8],
        y: &mut [u8],
    ) -> IpeccResult<usize> {
        let len = self.nn_bytes();
        let (Some(x), Some(y)) = (x.get_mut(..len), y.get_mut(..len)) else {
            return Err(IpeccError::DRIVER_IPECC_OUTPUT_BUFFER_TOO_SMALL);
        };
        let (reg_x, reg_y) = idx.coords();
        self.read_nb(Ctrl::READ_NB, reg_x.addr(), x)?;
        self.read_nb(Ctrl::READ_NB, reg_y.addr(), y)?;
        Ok(len)
    }

    /// Reads the point held in `idx`.
    pub fn read_point(&mut self, idx: PointIdx) -> IpeccResult<EccPointOut> {
        let len = self.nn_bytes();
        let mut out = EccPointOut {
            x: vec![0; len],
            y: vec![0; len],
            is_infinity: false,
        };
        self.read_point_into(idx, &mut out.x, &mut out.y)?;
        out.is_infinity = self.point_is_infinity(idx)?;
        Ok(out)
    }

    /// Returns `p + q`.
    pub fn add(&mut self, p: EccPoint, q: EccPoint) -> IpeccResult<EccPointOut> {
        log::debug!("ipecc: ADD");
        self.load_points(&[(p, PointIdx::R0), (q, PointIdx::R1)])?;
        self.exec(Ctrl::PT_ADD)?;
        self.read_point(PointIdx::R1)
    }

    /// Returns `2 * p`.
    pub fn double(&mut self, p: EccPoint) -> IpeccResult<EccPointOut> {
        log::debug!("ipecc: DBL");
        self.load_points(&[(p, PointIdx::R0)])?;
        self.exec(Ctrl::PT_DBL)?;
        self.read_point(PointIdx::R1)
    }

    /// Returns `-p`.
    pub fn neg(&mut self, p: EccPoint) -> IpeccResult<EccPointOut> {
        log::debug!("ipecc: NEG");
        self.load_points(&[(p, PointIdx::R0)])?;
        self.exec(Ctrl::PT_NEG)?;
        self.read_point(PointIdx::R1)
    }

    pub fn is_on_curve(&mut self, p: EccPoint) -> IpeccResult<bool> {
        log::debug!("ipecc: CHK");
        self.load_points(&[(p, PointIdx::R0)])?;
        self.exec(Ctrl::PT_CHK)?;
        Ok(self.status().yes())
    }

    /// Whether `p == q`.
    pub fn eq(&mut self, p: EccPoint, q: EccPoint) -> IpeccResult<bool> {
        log::debug!("ipecc: EQU");
        self.load_points(&[(p, PointIdx::R0), (q, PointIdx::R1)])?;
        self.exec(Ctrl::PT_EQU)?;
        Ok(self.status().yes())
    }

    /// Whether `p == -q`.
    pub fn opp(&mut self, p: EccPoint, q: EccPoint) -> IpeccResult<bool> {
        log::debug!("ipecc: OPP");
        self.load_points(&[(p, PointIdx::R0), (q, PointIdx::R1)])?;
        self.exec(Ctrl::PT_OPP)?;
        Ok(self.status().yes())
    }

    /// Returns `[k]p`, with `p` loaded in R1.
    ///
    /// With `trace`, the run is single-stepped on debug hardware and
    /// `trace` receives its annotated execution trace.
    pub fn mul(
        &mut self,
        p: EccPoint,
        k: &[u8],
        trace: Option<&mut KpTrace>,
    ) -> IpeccResult<EccPointOut> {
        log::debug!("ipecc: KP, traced = {}", trace.is_some());
        if trace.is_some() {
            self.require_debug()?;
        }
        let flags = self.infinity_flags()?;
        let token = self.get_token()?;
        self.write_nb(k, BigNumReg::Scalar)?;
        self.write_nb(p.x, BigNumReg::R1X)?;
        self.write_nb(p.y, BigNumReg::R1Y)?;
        self.restore_infinity_flags(flags)?;

        match trace {
            Some(trace) => self.traced_kp(trace)?,
            None => self.exec(Ctrl::PT_KP)?,
        }

        let mut out = self.read_point(PointIdx::R1)?;
        token.unmask(&mut out.x)?;
        token.unmask(&mut out.y)?;
        Ok(out)
    }

    fn infinity_flags(&self) -> IpeccResult<InfinityFlags> {
        self.wait_not_busy()?;
        let status = self.status();
        Ok(InfinityFlags {
            r0: status.r0_is_null(),
            r1: status.r1_is_null(),
        })
    }

    fn restore_infinity_flags(&self, flags: InfinityFlags) -> IpeccResult<()> {
        self.write_checked(w::R0_NULL, u32::from(flags.r0))?;
        self.write_checked(w::R1_NULL, u32::from(flags.r1))
    }

    /// Writes the coordinates of each point to its slot. Coordinate writes
    /// clear the slot's infinity flag on the IP, so both flags are saved
    /// first and restored afterwards.
    fn load_points(&self, points: &[(EccPoint, PointIdx)]) -> IpeccResult<()> {
        let flags = self.infinity_flags()?;
        for (point, idx) in points {
            let (reg_x, reg_y) = idx.coords();
            self.write_nb(point.x, reg_x)?;
            self.write_nb(point.y, reg_y)?;
        }
        self.restore_infinity_flags(flags)
    }

    /// Issues a point command and waits for its completion.
    pub(crate) fn exec(&self, cmd: Ctrl) -> IpeccResult<()> {
        self.write_checked(w::CTRL, cmd.bits())
    }
}
