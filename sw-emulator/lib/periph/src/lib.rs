/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the IPECC Emulator Peripheral library.

--*/
mod asym_ipecc;
pub mod curve;
pub mod kp_program;

pub use asym_ipecc::{AsymIpecc, IpeccParams};
