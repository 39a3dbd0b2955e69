// Licensed under the Apache-2.0 license

//! Test-side models of an IPECC instance: the behavioural emulator reached
//! through an `ipecc_registers::Mmio` transport.

use std::path::Path;

pub use ipecc_emu_bus::Bus;
use ipecc_emu_periph::{AsymIpecc, IpeccParams};
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod bus_logger;
pub mod mmio;

pub use bus_logger::{reg_name, BusLogger, LogFile, NullBus};
use mmio::BusMmio;

/// Transport to an emulated IPECC, as handed to the driver.
pub type ModelEmulated = BusMmio<BusLogger<AsymIpecc>>;

/// Synthesis and simulation parameters of the emulated IP.
#[derive(Debug, Clone)]
pub struct InitParams<'a> {
    /// Debug (true) or production (false) synthesis
    pub debug: bool,

    /// Shuffling countermeasure is available
    pub shuffle: bool,

    /// Prime size can be changed at runtime
    pub nndyn: bool,

    /// Big-number words are 64 bits wide, and accessed with 64-bit
    /// transactions
    pub w64: bool,

    pub nnmax: u32,

    /// Prime size after reset
    pub nn: u32,

    /// Hardware `(major, minor)` version
    pub version: (u32, u32),

    /// Number of status reads each command keeps the IP busy
    pub busy_latency: u32,

    pub rng_seed: u64,

    /// File receiving a line per register access
    pub bus_log: Option<&'a Path>,
}

impl Default for InitParams<'_> {
    fn default() -> Self {
        let emu = IpeccParams::default();
        Self {
            debug: emu.debug,
            shuffle: emu.shuffle,
            nndyn: emu.nndyn,
            w64: emu.w64,
            nnmax: emu.nnmax,
            nn: emu.nn,
            version: (emu.version_major, emu.version_minor),
            busy_latency: emu.busy_latency,
            rng_seed: emu.rng_seed,
            bus_log: None,
        }
    }
}

impl From<&InitParams<'_>> for IpeccParams {
    fn from(params: &InitParams<'_>) -> Self {
        Self {
            debug: params.debug,
            shuffle: params.shuffle,
            nndyn: params.nndyn,
            w64: params.w64,
            nnmax: params.nnmax,
            nn: params.nn,
            version_major: params.version.0,
            version_minor: params.version.1,
            busy_latency: params.busy_latency,
            rng_seed: params.rng_seed,
            ..Default::default()
        }
    }
}

/// Build an emulated IPECC in its power-up state.
pub fn new_emulated(params: InitParams) -> std::io::Result<ModelEmulated> {
    let mut logger = BusLogger::new(AsymIpecc::new(IpeccParams::from(&params)));
    if let Some(path) = params.bus_log {
        logger.log = Some(LogFile::open(path)?);
    }
    Ok(BusMmio::new(logger))
}

/// Route `log` output of the driver and the bus logger to stderr. Safe to
/// call from every test; only the first call installs the logger.
pub fn init_logging(level: LevelFilter) {
    let _ = SimpleLogger::new().with_level(level).init();
}
