// Licensed under the Apache-2.0 license

use std::{
    cell::RefCell,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    rc::Rc,
};

use ipecc_emu_bus::{AccessSize, Bus, BusAddr, BusData, BusError};
use ipecc_registers::{r, w};

#[derive(Clone)]
pub struct LogFile(Rc<RefCell<BufWriter<File>>>);
impl LogFile {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self(Rc::new(RefCell::new(BufWriter::new(File::create(
            path,
        )?)))))
    }
}
impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

/// Name of the register at `addr`, for reads or writes.
pub fn reg_name(addr: BusAddr, write: bool) -> &'static str {
    let offset = addr as usize;
    if write {
        match offset {
            w::CTRL => "W_CTRL",
            w::WRITE_DATA => "W_WRITE_DATA",
            w::R0_NULL => "W_R0_NULL",
            w::R1_NULL => "W_R1_NULL",
            w::PRIME_SIZE => "W_PRIME_SIZE",
            w::BLINDING => "W_BLINDING",
            w::SHUFFLE => "W_SHUFFLE",
            w::ZREMASK => "W_ZREMASK",
            w::TOKEN => "W_TOKEN",
            w::IRQ => "W_IRQ",
            w::ERR_ACK => "W_ERR_ACK",
            w::SMALL_SCALAR => "W_SMALL_SCALAR",
            w::SOFT_RESET => "W_SOFT_RESET",
            w::DBG_HALT => "W_DBG_HALT",
            w::DBG_BKPT => "W_DBG_BKPT",
            w::DBG_STEPS => "W_DBG_STEPS",
            w::DBG_FP_RADDR => "W_DBG_FP_RADDR",
            w::DBG_TRNG_CTRL => "W_DBG_TRNG_CTRL",
            _ if offset >= w::DBG_HALT => "W_DBG_*",
            _ => "W_?",
        }
    } else {
        match offset {
            r::STATUS => "R_STATUS",
            r::READ_DATA => "R_READ_DATA",
            r::CAPABILITIES => "R_CAPABILITIES",
            r::PRIME_SIZE => "R_PRIME_SIZE",
            r::HW_VERSION => "R_HW_VERSION",
            r::DBG_STATUS => "R_DBG_STATUS",
            r::DBG_EXP_FLAGS => "R_DBG_EXP_FLAGS",
            r::DBG_FP_RDATA => "R_DBG_FP_RDATA",
            r::DBG_FP_RDATA_RDY => "R_DBG_FP_RDATA_RDY",
            _ if offset >= r::DBG_CAPABILITIES_0 => "R_DBG_*",
            _ => "R_?",
        }
    }
}

/// A Bus implementation that returns errors for every access.
pub struct NullBus();
impl Bus for NullBus {
    fn read(&mut self, _size: AccessSize, _addr: BusAddr) -> Result<BusData, BusError> {
        Err(BusError::LoadAccessFault)
    }

    fn write(&mut self, _size: AccessSize, _addr: BusAddr, _val: BusData) -> Result<(), BusError> {
        Err(BusError::StoreAccessFault)
    }
}

/// Forwards every access to `bus`, tracing it through the `log` facade and,
/// when a log file is attached, to that file.
pub struct BusLogger<TBus: Bus> {
    pub bus: TBus,
    pub log: Option<LogFile>,
}
impl<TBus: Bus> BusLogger<TBus> {
    pub fn new(bus: TBus) -> Self {
        Self { bus, log: None }
    }

    pub fn log_read(&mut self, size: AccessSize, addr: BusAddr, result: Result<BusData, BusError>) {
        let name = reg_name(addr, false);
        let size = size.bytes() * 8;
        match result {
            Ok(val) => log::trace!("read{size} {name} (0x{addr:03x}) -> 0x{val:x}"),
            Err(e) => log::trace!("read{size} {name} (0x{addr:03x}) ***FAULT {e:?}"),
        }
        if let Some(log) = &mut self.log {
            let _ = match result {
                Ok(val) => writeln!(log, " read{size} {name} *0x{addr:03x} -> 0x{val:x}"),
                Err(e) => writeln!(log, " read{size} {name} *0x{addr:03x} ***FAULT {e:?}"),
            };
        }
    }

    pub fn log_write(
        &mut self,
        size: AccessSize,
        addr: BusAddr,
        val: BusData,
        result: Result<(), BusError>,
    ) {
        let name = reg_name(addr, true);
        let size = size.bytes() * 8;
        match result {
            Ok(()) => log::trace!("write{size} {name} (0x{addr:03x}) <- 0x{val:x}"),
            Err(e) => log::trace!("write{size} {name} (0x{addr:03x}) <- 0x{val:x} ***FAULT {e:?}"),
        }
        if let Some(log) = &mut self.log {
            let _ = match result {
                Ok(()) => writeln!(log, "write{size} {name} *0x{addr:03x} <- 0x{val:x}"),
                Err(e) => writeln!(
                    log,
                    "write{size} {name} *0x{addr:03x} <- 0x{val:x} ***FAULT {e:?}"
                ),
            };
        }
    }
}
impl<TBus: Bus> Bus for BusLogger<TBus> {
    fn read(&mut self, size: AccessSize, addr: BusAddr) -> Result<BusData, BusError> {
        let result = self.bus.read(size, addr);
        self.log_read(size, addr, result);
        result
    }

    fn write(&mut self, size: AccessSize, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        let result = self.bus.write(size, addr, val);
        self.log_write(size, addr, val, result);
        result
    }

    fn poll(&mut self) {
        self.bus.poll();
    }
}
