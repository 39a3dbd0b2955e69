/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains the P-256 test vectors and the emulated IPECC setup shared
    by the driver integration tests.

--*/

#![allow(dead_code)]

use hex_literal::hex;
use ipecc_drivers::{EccPoint, Ipecc, IpeccConfig, PointIdx, WordLayout};
use ipecc_hw_model::{init_logging, new_emulated, InitParams, ModelEmulated};
use log::LevelFilter;
use num_bigint::BigUint;

pub const P256_P: [u8; 32] =
    hex!("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff");
pub const P256_A: [u8; 32] =
    hex!("ffffffff00000001000000000000000000000000fffffffffffffffffffffffc");
pub const P256_B: [u8; 32] =
    hex!("5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b");
pub const P256_Q: [u8; 32] =
    hex!("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551");

pub const G_X: [u8; 32] = hex!("6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296");
pub const G_Y: [u8; 32] = hex!("4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5");

pub const G2_X: [u8; 32] =
    hex!("7cf27b188d034f7e8a52380304b51ac3c08969e277f21b35a60b48fc47669978");
pub const G2_Y: [u8; 32] =
    hex!("07775510db8ed040293d9ac69f7430dbba7dade63ce982299e04b79d227873d1");

pub const G: EccPoint<'static> = EccPoint::new(&G_X, &G_Y);
pub const G2: EccPoint<'static> = EccPoint::new(&G2_X, &G2_Y);

/// Point that fails the P-256 curve equation.
pub const OFF_CURVE: EccPoint<'static> = EccPoint::new(&[0x01], &[0x02]);

pub const SCALAR: [u8; 32] =
    hex!("c51e4753afdec1e6b6c6a5b992f43f8dd0c7a8933072708b6522468b2ffb06fd");

/// Emulated IP, initialized and loaded with P-256.
pub fn p256_ipecc(params: InitParams) -> Ipecc<ModelEmulated> {
    init_logging(LevelFilter::Warn);
    let layout = if params.w64 {
        WordLayout::W64
    } else {
        WordLayout::W32
    };
    let model = new_emulated(params).unwrap();
    let mut ipecc = Ipecc::init(model, IpeccConfig::new(layout)).unwrap();
    ipecc.set_curve(&P256_A, &P256_B, &P256_P, &P256_Q).unwrap();
    ipecc
}

/// Flags both point slots as holding finite points.
pub fn clear_infinity(ipecc: &mut Ipecc<ModelEmulated>) {
    ipecc.clear_point_infinity(PointIdx::R0).unwrap();
    ipecc.clear_point_infinity(PointIdx::R1).unwrap();
}

/// `p - v`, big-endian on 32 bytes.
pub fn p256_sub_from_p(v: &[u8]) -> Vec<u8> {
    let diff = BigUint::from_bytes_be(&P256_P) - BigUint::from_bytes_be(v);
    be_bytes(&diff, 32)
}

pub fn be_bytes(v: &BigUint, len: usize) -> Vec<u8> {
    let bytes = v.to_bytes_be();
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}
