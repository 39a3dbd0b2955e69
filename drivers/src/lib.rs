/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the IPECC driver library.

--*/

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

mod regs;
mod wait;

mod bignum;
mod config;
mod countermeasures;
mod debug;
mod ipecc;
mod kp_trace;
mod status;
mod token;
mod trng;

pub use bignum::BigNumReg;
pub use config::IpeccConfig;
pub use debug::DebugStatus;
pub use ipecc::{EccPoint, EccPointOut, Ipecc, PointIdx};
pub use ipecc_error::{IpeccError, IpeccResult};
pub use kp_trace::{KpTrace, KpTracePoints, KpTraceStep, LargeNumber, TracePhase};
pub use regs::WordLayout;
pub use trng::{IrnCounts, TrngChannelDiag, TrngDiagnostics, TrngRawFifoStatus};
