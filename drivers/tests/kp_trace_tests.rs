// Licensed under the Apache-2.0 license

mod common;

use common::*;
use ipecc_drivers::{IpeccError, KpTrace, KpTracePoints, TracePhase};
use ipecc_hw_model::InitParams;
use ipecc_registers::microcode::addr;
use ipecc_registers::FsmState;

#[test]
fn test_traced_matches_untraced() {
    let mut ipecc = p256_ipecc(InitParams::default());
    clear_infinity(&mut ipecc);
    let plain = ipecc.mul(G, &[3], None).unwrap();

    clear_infinity(&mut ipecc);
    let mut trace = KpTrace::new();
    let traced = ipecc.mul(G, &[3], Some(&mut trace)).unwrap();
    assert_eq!(traced, plain);
    assert!(!ipecc.mmio().bus().bus.is_kp_running());

    assert_eq!(trace.nn, 256);
    assert!(trace.log.starts_with("[k]P trace: nn = 256, ww = 32"));
    assert!(!trace.log_truncated);
    assert!(trace.lambda.is_some());
    assert!(trace.phi0.is_some());
    assert!(trace.phi1.is_some());
    assert!(trace.alpha.is_none());

    assert_eq!(trace.phase_steps(TracePhase::Zaddu).count(), 256);
    assert_eq!(trace.phase_steps(TracePhase::Zaddc).count(), 256);
    assert_eq!(trace.phase_steps(TracePhase::Setup).count(), 1);

    let last = trace.phase_steps(TracePhase::Zaddc).last().unwrap();
    assert_eq!(last.state, FsmState::Zaddc);
    assert_eq!(last.flags.jnbbit(), 0);
    assert!(last.flags.kap());
    assert_eq!(last.xr0.to_be_bytes(32), plain.x);
    assert_eq!(last.yr0.to_be_bytes(32), plain.y);

    // The first ladder bit doubles the point at infinity.
    let first = trace.phase_steps(TracePhase::Zaddu).next().unwrap();
    assert_eq!(first.flags.jnbbit(), 255);
    assert!(!first.flags.kap());
}

#[test]
fn test_trace_with_blinding() {
    let mut ipecc = p256_ipecc(InitParams::default());
    ipecc.enable_blinding(128).unwrap();
    clear_infinity(&mut ipecc);
    let plain = ipecc.mul(G, &SCALAR, None).unwrap();

    clear_infinity(&mut ipecc);
    let mut trace = KpTrace::new();
    let traced = ipecc.mul(G, &SCALAR, Some(&mut trace)).unwrap();
    assert_eq!(traced, plain);
    assert!(trace.alpha.is_some());
    assert_eq!(trace.phase_steps(TracePhase::Zaddu).count(), 384);
    assert_eq!(trace.phase_steps(TracePhase::Zaddc).count(), 384);
}

#[test]
fn test_trace_reused() {
    let mut ipecc = p256_ipecc(InitParams::default());
    let mut trace = KpTrace::new();
    clear_infinity(&mut ipecc);
    ipecc.mul(G, &[2], Some(&mut trace)).unwrap();
    let nb_steps = trace.nb_steps;

    clear_infinity(&mut ipecc);
    let out = ipecc.mul(G, &[2], Some(&mut trace)).unwrap();
    assert_eq!(out.x, G2_X);
    assert_eq!(trace.nb_steps, nb_steps);
    assert_eq!(trace.phase_steps(TracePhase::Zaddu).count(), 256);
    assert_eq!(trace.log.matches("[k]P trace").count(), 1);
}

#[test]
fn test_trace_step_limit() {
    let mut ipecc = p256_ipecc(InitParams::default());
    clear_infinity(&mut ipecc);
    let mut trace = KpTrace::new().with_max_steps(10);
    assert_eq!(
        ipecc.mul(G, &[3], Some(&mut trace)),
        Err(IpeccError::DRIVER_IPECC_TRACE_STEP_LIMIT)
    );
    assert_eq!(trace.nb_steps, 10);
    assert!(!ipecc.mmio().bus().bus.is_kp_running());

    // The aborted run does not leave the IP stuck.
    clear_infinity(&mut ipecc);
    let out = ipecc.mul(G, &[2], None).unwrap();
    assert_eq!(out.x, G2_X);
    assert_eq!(out.y, G2_Y);
}

#[test]
fn test_trace_log_capacity() {
    let mut ipecc = p256_ipecc(InitParams::default());
    clear_infinity(&mut ipecc);
    let mut trace = KpTrace::new().with_log_capacity(1024);
    let out = ipecc.mul(G, &[2], Some(&mut trace)).unwrap();
    assert_eq!(out.x, G2_X);
    assert!(trace.log_truncated);
    assert!(trace.log.len() <= 1024);
    assert_eq!(trace.phase_steps(TracePhase::Zaddc).count(), 256);
}

#[test]
fn test_trace_off_curve() {
    let mut ipecc = p256_ipecc(InitParams::default());
    clear_infinity(&mut ipecc);
    let mut trace = KpTrace::new();
    assert_eq!(
        ipecc.mul(OFF_CURVE, &[3], Some(&mut trace)),
        Err(IpeccError::from_hw_status(
            ipecc_registers::StatusErr::IN_PT_NOT_ON_CURVE.bits()
        ))
    );
    assert!(trace.steps.is_empty());
    assert!(ipecc.mmio().bus().bus.errors().is_empty());
}

#[test]
fn test_trace_needs_debug() {
    let mut ipecc = p256_ipecc(InitParams {
        debug: false,
        ..Default::default()
    });
    clear_infinity(&mut ipecc);
    let mut trace = KpTrace::new();
    assert_eq!(
        ipecc.mul(G, &[3], Some(&mut trace)),
        Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY)
    );
    assert!(trace.log.is_empty());
}

/// Trace points entering the ladder at the setup routine.
fn setup_entry_points() -> KpTracePoints {
    KpTracePoints {
        entry: (addr::SETUP_ENTRY, FsmState::Setup),
        ..Default::default()
    }
}

#[test]
fn test_trace_custom_entry() {
    let mut ipecc = p256_ipecc(InitParams::default());
    clear_infinity(&mut ipecc);
    let mut trace = KpTrace::new().with_points(setup_entry_points());
    let out = ipecc.mul(G, &[2], Some(&mut trace)).unwrap();
    assert_eq!(out.x, G2_X);
    assert!(trace.phi0.is_some());
    assert_eq!(trace.phase_steps(TracePhase::Zaddu).count(), 256);
}

#[test]
fn test_trace_unexpected_entry_halt() {
    let mut ipecc = p256_ipecc(InitParams::default());
    clear_infinity(&mut ipecc);

    // A pending halt stops [k]P on its first opcode, ahead of the entry
    // breakpoint.
    ipecc.halt().unwrap();
    let mut trace = KpTrace::new().with_points(setup_entry_points());
    assert_eq!(
        ipecc.mul(G, &[3], Some(&mut trace)),
        Err(IpeccError::DRIVER_IPECC_TRACE_UNEXPECTED_HALT)
    );
    assert_eq!(trace.nb_steps, 0);
    assert!(trace.steps.is_empty());
    {
        let model = ipecc.mmio().bus();
        assert!(!model.bus.is_kp_running());
        assert!(!model.bus.is_halted());
        assert!(model.bus.errors().is_empty());
    }
    assert!(!ipecc.debug_status().unwrap().halted);

    clear_infinity(&mut ipecc);
    let out = ipecc.mul(G, &[2], None).unwrap();
    assert_eq!(out.x, G2_X);
    assert_eq!(out.y, G2_Y);
}
