/*++

Licensed under the Apache-2.0 license.

File Name:

    kp_program.rs

Abstract:

    File contains the opcode-level model of one [k]P run: the sequence of
    program counter / FSM state positions the microcode walks through, and
    the Fp memory writes that become observable at each of them.

--*/

use crate::curve::{Curve, Point};
use ipecc_registers::microcode::{self, addr, slot, Routine};
use ipecc_registers::{ExpFlags, FsmState};
use num_bigint::BigUint;

/// A value written to a Fp memory slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpWrite {
    pub slot: u32,
    pub value: BigUint,
}

/// One opcode position of the run.
#[derive(Debug, Clone)]
pub struct Position {
    pub pc: u32,
    pub state: FsmState,
    pub flags: ExpFlags,

    /// Writes visible once the sequencer has arrived at this position.
    pub writes: Vec<FpWrite>,
}

/// Random values consumed by one run.
#[derive(Debug, Clone, Default)]
pub struct KpRandoms {
    /// Blinding multiplier, present when blinding is active.
    pub alpha: Option<BigUint>,
    pub phi0: BigUint,
    pub phi1: BigUint,
    pub lambda: BigUint,
}

/// Everything the microcode needs to start a [k]P run.
pub struct KpInputs<'a> {
    pub curve: &'a Curve,
    pub point: Point,
    pub scalar: BigUint,

    /// Number of ladder iterations.
    pub nbits: u32,
    pub randoms: KpRandoms,
}

/// A [k]P run: the positions still to be visited and the final result.
#[derive(Debug, Clone)]
pub struct KpRun {
    positions: Vec<Position>,
    next: usize,
    pub result: Point,
}

struct Builder {
    positions: Vec<Position>,
    r0: Point,
    r1: Point,
    jnbbit: u32,
    kap: bool,
    kapp: bool,
}

impl Builder {
    fn flags(&self, state: FsmState) -> ExpFlags {
        let mut flags = ExpFlags::default();
        flags.set_r0z(self.r0.is_infinity());
        flags.set_r1z(self.r1.is_infinity());
        flags.set_kap(self.kap);
        flags.set_kapp(self.kapp);
        flags.set_zu(state == FsmState::Zaddu);
        flags.set_zc(state == FsmState::Zaddc);
        flags.set_jnbbit(self.jnbbit);
        flags
    }

    /// Append every opcode of `routine`, attaching `writes` to the opcode
    /// at `at`.
    fn routine(&mut self, routine: Routine, at: &[(u32, Vec<FpWrite>)]) {
        for pc in routine.start..=routine.last() {
            let writes = at
                .iter()
                .filter(|(a, _)| *a == pc)
                .flat_map(|(_, w)| w.iter().cloned())
                .collect();
            self.positions.push(Position {
                pc,
                state: routine.state,
                flags: self.flags(routine.state),
                writes,
            });
        }
    }

    fn ladder_writes(r0: &Point, r1: &Point) -> Vec<FpWrite> {
        let (xr0, yr0) = r0.coords();
        let (xr1, yr1) = r1.coords();
        vec![
            FpWrite { slot: slot::XR0, value: xr0 },
            FpWrite { slot: slot::YR0, value: yr0 },
            FpWrite { slot: slot::XR1, value: xr1 },
            FpWrite { slot: slot::YR1, value: yr1 },
            FpWrite { slot: slot::ZR01, value: BigUint::from(1u32) },
        ]
    }
}

impl KpRun {
    /// Lays out the full run for `inputs`.
    pub fn new(inputs: KpInputs<'_>) -> Self {
        let curve = inputs.curve;
        let mut b = Builder {
            positions: Vec::new(),
            r0: Point::Infinity,
            r1: inputs.point.clone(),
            jnbbit: inputs.nbits.saturating_sub(1),
            kap: false,
            kapp: false,
        };

        b.routine(microcode::CHECK_ONCURVE, &[]);
        if let Some(alpha) = &inputs.randoms.alpha {
            let w = vec![FpWrite { slot: slot::ALPHA, value: alpha.clone() }];
            b.routine(microcode::BLIND_INIT, &[(addr::ALPHA_READY, w)]);
        }
        let setup = [
            (
                addr::PHI0_READY,
                vec![FpWrite { slot: slot::PHI0, value: inputs.randoms.phi0.clone() }],
            ),
            (
                addr::PHI1_READY,
                vec![FpWrite { slot: slot::PHI1, value: inputs.randoms.phi1.clone() }],
            ),
            (
                addr::LAMBDA_READY,
                vec![FpWrite { slot: slot::LAMBDA, value: inputs.randoms.lambda.clone() }],
            ),
            (addr::SETUP_DONE, Builder::ladder_writes(&b.r0, &b.r1)),
        ];
        b.routine(microcode::SETUP, &setup);

        for j in (0..inputs.nbits).rev() {
            b.kapp = b.kap;
            b.kap = inputs.scalar.bit(u64::from(j));
            b.jnbbit = j;
            let [(a0, a1), (d0, d1)] = curve.ladder_step(&b.r0, &b.r1, b.kap);
            b.routine(
                microcode::ZADDU,
                &[(addr::ZADDU_DONE, Builder::ladder_writes(&a0, &a1))],
            );
            b.r0 = a0;
            b.r1 = a1;
            b.routine(
                microcode::ZADDC,
                &[(addr::ZADDC_DONE, Builder::ladder_writes(&d0, &d1))],
            );
            b.r0 = d0;
            b.r1 = d1;
        }

        let result = b.r0.clone();
        let done = Builder::ladder_writes(&b.r0, &b.r1);
        b.routine(microcode::SUBTRACT_P, &[(addr::SUBTRACT_P_DONE, done)]);
        let exit = Builder::ladder_writes(&b.r1, &result);
        b.routine(microcode::EXIT, &[(addr::EXIT_DONE, exit)]);
        b.routine(microcode::EXIT_CHECK_ONCURVE, &[]);

        Self {
            positions: b.positions,
            next: 0,
            result,
        }
    }

    /// Total number of opcode positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position the sequencer last arrived at.
    pub fn current(&self) -> Option<&Position> {
        self.next.checked_sub(1).and_then(|i| self.positions.get(i))
    }

    /// Position the sequencer will arrive at next.
    pub fn peek(&self) -> Option<&Position> {
        self.positions.get(self.next)
    }

    /// Arrive at the next position and return it, or `None` once the run
    /// has completed.
    pub fn advance(&mut self) -> Option<&Position> {
        let pos = self.positions.get(self.next)?;
        self.next += 1;
        Some(pos)
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::tests::p256;

    fn run(scalar: u32, nbits: u32, alpha: bool) -> KpRun {
        let (curve, g) = p256();
        KpRun::new(KpInputs {
            curve: &curve,
            point: g,
            scalar: BigUint::from(scalar),
            nbits,
            randoms: KpRandoms {
                alpha: alpha.then(|| BigUint::from(7u32)),
                ..Default::default()
            },
        })
    }

    #[test]
    fn test_layout() {
        let run = run(5, 4, false);
        // check + setup + 4 * (zaddu + zaddc) + subtract + exit + check
        assert_eq!(run.len(), 8 + 12 + 4 * 16 + 4 + 8 + 8);
        assert_eq!(run.peek().map(|p| p.pc), Some(addr::KP_ENTRY));

        let with_blinding = self::run(5, 4, true);
        assert_eq!(with_blinding.len(), run.len() + 4);
    }

    #[test]
    fn test_advance_to_end() {
        let (curve, g) = p256();
        let mut run = run(5, 4, false);
        let mut last = None;
        let mut zaddc_snapshots = 0;
        while let Some(pos) = run.advance() {
            if pos.pc == addr::ZADDC_DONE {
                zaddc_snapshots += 1;
                assert_eq!(pos.writes.len(), 5);
            }
            last = Some((pos.pc, pos.state));
        }
        assert!(run.is_done());
        assert_eq!(zaddc_snapshots, 4);
        assert_eq!(last, Some((addr::KP_LAST, FsmState::Exit)));
        assert_eq!(run.result, curve.scalar_mul(&BigUint::from(5u32), &g, 4));
    }

    #[test]
    fn test_flags_track_scalar_bits() {
        let mut run = run(0b10, 2, false);
        let mut seen = Vec::new();
        while let Some(pos) = run.advance() {
            if pos.pc == addr::ZADDU_DONE {
                seen.push((pos.flags.jnbbit(), pos.flags.kap(), pos.flags.zu()));
            }
        }
        assert_eq!(seen, vec![(1, true, true), (0, false, true)]);
    }
}
