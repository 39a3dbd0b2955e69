/*++

Licensed under the Apache-2.0 license.

File Name:

    debug_tests.rs

Abstract:

    File contains test cases for the debug register bank of the emulated
    IPECC: microcode and Fp memory access, trigger, capabilities and TRNG
    control.

--*/

mod common;

use common::*;
use ipecc_drivers::{IpeccError, IrnCounts, TrngRawFifoStatus};
use ipecc_hw_model::InitParams;
use ipecc_registers::FsmState;

#[test]
fn test_debug_capabilities() {
    let ipecc = p256_ipecc(InitParams::default());
    assert_eq!(ipecc.ww(), Ok(32));
    assert_eq!(ipecc.nb_opcodes(), Ok(1024));
    assert_eq!(ipecc.opcode_size(), Ok(32));
    assert_eq!(ipecc.trng_raw_ram_size(), Ok(4096));
    assert_eq!(ipecc.irn_shf_width(), Ok(9));
}

#[test]
fn test_patch_microcode() {
    let mut ipecc = p256_ipecc(InitParams::default());
    ipecc.patch_microcode(0x3fe, &[0xdead_beef, 0x1234]).unwrap();
    {
        let model = ipecc.mmio().bus();
        assert_eq!(model.bus.opcode(0x3fe), Some(0xdead_beef));
        assert_eq!(model.bus.opcode(0x3ff), Some(0x1234));
    }
    assert_eq!(
        ipecc.patch_microcode(0x3ff, &[1, 2]),
        Err(IpeccError::DRIVER_IPECC_OPCODE_ADDR_INVALID)
    );
    assert_eq!(ipecc.mmio().bus().bus.opcode(0x3ff), Some(0x1234));
}

#[test]
fn test_fp_memory() {
    let mut ipecc = p256_ipecc(InitParams::default());
    ipecc.fp_write(0x21, 0xcafe_f00d).unwrap();
    ipecc.fp_write(0x22, 7).unwrap();
    assert_eq!(ipecc.fp_read(0x21), Ok(0xcafe_f00d));
    assert_eq!(ipecc.fp_read(0x22), Ok(7));
}

#[test]
fn test_trigger() {
    let mut ipecc = p256_ipecc(InitParams::default());
    ipecc.set_trigger_up(100).unwrap();
    ipecc.set_trigger_down(250).unwrap();
    ipecc.arm_trigger().unwrap();
    assert_eq!(ipecc.mmio().bus().bus.trigger(), (100, 250, true));
    ipecc.disarm_trigger().unwrap();
    assert_eq!(ipecc.mmio().bus().bus.trigger(), (100, 250, false));
}

#[test]
fn test_point_op_time() {
    let mut ipecc = p256_ipecc(InitParams::default());
    clear_infinity(&mut ipecc);
    ipecc.double(G).unwrap();
    assert_eq!(ipecc.point_op_time(), Ok(1));

    clear_infinity(&mut ipecc);
    ipecc.mul(G, &[2], None).unwrap();
    assert!(ipecc.point_op_time().unwrap() > 512);
}

#[test]
fn test_idle_debug_status() {
    let mut ipecc = p256_ipecc(InitParams::default());
    let status = ipecc.debug_status().unwrap();
    assert!(!status.halted);
    assert_eq!(status.breakpoint, None);

    // Without a running [k]P there is nothing to step.
    ipecc.run_opcodes(1).unwrap();
    ipecc.resume().unwrap();
    assert!(!ipecc.debug_status().unwrap().halted);
    assert_eq!(
        ipecc.set_breakpoint(4, 0, 0, FsmState::AnyOrIdle),
        Err(IpeccError::DRIVER_IPECC_INVALID_BREAKPOINT_ID)
    );
}

#[test]
fn test_trng_postproc() {
    let mut ipecc = p256_ipecc(InitParams::default());
    assert!(ipecc.mmio().bus().bus.is_trng_postproc_enabled());
    ipecc.trng_postproc_disable().unwrap();
    assert!(!ipecc.mmio().bus().bus.is_trng_postproc_enabled());
    ipecc.trng_postproc_enable().unwrap();
    assert!(ipecc.mmio().bus().bus.is_trng_postproc_enabled());
}

#[test]
fn test_configure_trng() {
    let mut ipecc = p256_ipecc(InitParams::default());
    ipecc.configure_trng(true, 0x20, 5).unwrap();
    assert_eq!(ipecc.mmio().bus().bus.trng_cfg(), 0x0050_0201);
}

#[test]
fn test_trng_raw_fifo() {
    let mut ipecc = p256_ipecc(InitParams::default());
    assert_eq!(
        ipecc.trng_raw_fifo_status(),
        Ok(TrngRawFifoStatus {
            full: true,
            write_pointer: 4096,
        })
    );
    assert_eq!(ipecc.trng_raw_fifo_fillup_time(), Ok(16384));

    // Read a few bits; they are random, only the reads must succeed.
    for addr in 0..8 {
        ipecc.trng_read_raw_bit(addr).unwrap();
    }

    ipecc.trng_reset_raw_fifo().unwrap();
    assert_eq!(
        ipecc.trng_raw_fifo_status(),
        Ok(TrngRawFifoStatus {
            full: false,
            write_pointer: 0,
        })
    );
    assert!(ipecc.trng_raw_fifo_status().unwrap().full);
}

#[test]
fn test_trng_bypass() {
    let mut ipecc = p256_ipecc(InitParams::default());
    ipecc.trng_bypass(false).unwrap();
    clear_infinity(&mut ipecc);
    let out = ipecc.mul(G, &SCALAR, None).unwrap();

    ipecc.trng_undo_bypass().unwrap();
    clear_infinity(&mut ipecc);
    assert_eq!(ipecc.mul(G, &SCALAR, None).unwrap(), out);
}

#[test]
fn test_trng_irn_counts() {
    let mut ipecc = p256_ipecc(InitParams::default());
    assert_eq!(
        ipecc.trng_irn_counts(),
        Ok(IrnCounts {
            axi: 64,
            efp: 32,
            crv: 32,
            shf: 16,
        })
    );
    let full = ipecc.trng_irn_counts().unwrap();

    // The FIFOs refill as soon as the IP is idle again.
    ipecc.trng_reset_irn_fifos().unwrap();
    assert_eq!(ipecc.trng_irn_counts(), Ok(full));
}

#[test]
fn test_trng_diagnostics() {
    let mut ipecc = p256_ipecc(InitParams::default());
    clear_infinity(&mut ipecc);
    ipecc.mul(G, &SCALAR, None).unwrap();
    let diag = ipecc.trng_diagnostics().unwrap();
    assert!(diag.axi.ok > 0);
    assert!(diag.efp.ok > 0);

    ipecc.trng_reset_diagnostics().unwrap();
    let diag = ipecc.trng_diagnostics().unwrap();
    assert_eq!(diag.axi.ok, 0);
    assert_eq!(diag.efp.ok, 0);
}

#[test]
fn test_production_has_no_debug_bank() {
    let mut ipecc = p256_ipecc(InitParams {
        debug: false,
        ..Default::default()
    });
    assert_eq!(ipecc.ww(), Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY));
    assert_eq!(
        ipecc.fp_write(0, 0),
        Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY)
    );
    assert_eq!(ipecc.fp_read(0), Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY));
    assert_eq!(
        ipecc.arm_trigger(),
        Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY)
    );
    assert_eq!(
        ipecc.trng_raw_fifo_status(),
        Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY)
    );
    assert_eq!(
        ipecc.configure_trng(false, 1, 1),
        Err(IpeccError::DRIVER_IPECC_DEBUG_ONLY)
    );
}
