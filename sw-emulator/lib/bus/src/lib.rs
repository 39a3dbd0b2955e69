/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the IPECC Emulator Bus library.

--*/
mod bus;
pub mod testing;

pub use crate::bus::{check_alignment, AccessSize, Bus, BusAddr, BusData, BusError};
