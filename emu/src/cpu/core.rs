use std::io;

use crate::bus::{Bus, SystemBus};
use crate::config::{KERNEL_BASE, MEM_SIZE};
use crate::console;
use crate::decoder::Instruction;
use crate::loader::{self, Image, LoadError};
use crate::memory::Memory;
use crate::uart::Uart;

use super::csr::{CsrFile, CSR_SIE, CSR_SIP, CSR_SSTATUS};
use super::regs::RegisterFile;
use super::types::{Mode, Trap};

/// Stack pointer.
const REG_SP: u8 = 2;

/// A single RV64 hart together with the bus it drives.
pub struct Cpu {
    pub(crate) regs: RegisterFile,
    pub pc: u64,
    /// Current privilege mode (Machine/Supervisor/User).
    pub mode: Mode,
    pub(crate) csrs: CsrFile,
    pub bus: SystemBus,
    /// Fetches at or beyond `base + extent` end the program.
    extent: u64,
}

impl Cpu {
    /// Build a machine with the default RAM size and a console on the host's
    /// stdin/stdout, then load `code` into it.
    pub fn new(code: &[u8]) -> Result<Self, LoadError> {
        Self::with_ram(code, MEM_SIZE)
    }

    /// Like [`Cpu::new`] with `mem_size` bytes of RAM.
    pub fn with_ram(code: &[u8], mem_size: usize) -> Result<Self, LoadError> {
        let uart = Uart::stdout();
        if let Some(port) = uart.input_port() {
            console::spawn_input(port, io::stdin())?;
        }
        let mut bus = SystemBus::new(Memory::new(KERNEL_BASE, mem_size), uart)?;
        let image = loader::load_image(code, &mut bus)?;
        Ok(Self::with_bus(bus, image))
    }

    /// Start executing `image` on an already populated bus.
    pub fn with_bus(bus: SystemBus, image: Image) -> Self {
        let mut regs = RegisterFile::new();
        regs.write(REG_SP, bus.memory.end());
        Self {
            regs,
            pc: image.entry,
            mode: Mode::Machine,
            csrs: CsrFile::new(),
            bus,
            extent: image.extent,
        }
    }

    pub fn read_reg(&self, idx: u8) -> u64 {
        self.regs.read(idx)
    }

    pub fn write_reg(&mut self, idx: u8, val: u64) {
        self.regs.write(idx, val);
    }

    /// Read a register by `xN` or ABI name.
    pub fn reg_by_name(&self, name: &str) -> Option<u64> {
        self.regs.read_by_name(name)
    }

    pub fn regs(&self) -> &[u64; 32] {
        self.regs.as_array()
    }

    pub fn read_csr(&self, addr: u16) -> Result<u64, Trap> {
        self.csrs.load(addr as u64)
    }

    pub fn write_csr(&mut self, addr: u16, val: u64) -> Result<(), Trap> {
        if matches!(addr, CSR_SSTATUS | CSR_SIE | CSR_SIP) {
            log::debug!("csr {:#05x} <- {:#x} (aliased)", addr, val);
        }
        self.csrs.store(addr as u64, val)
    }

    fn fetch(&self) -> Result<u32, Trap> {
        let pc = self.pc;
        if !self.bus.is_ram(pc) {
            return Err(Trap::InvalidAddress(pc));
        }
        if pc - self.bus.dram_base() >= self.extent {
            return Err(Trap::EndOfProgram);
        }
        self.bus.read32(pc)
    }

    /// Run one fetch/decode/execute cycle.
    pub fn step(&mut self) -> Result<(), Trap> {
        let raw = self.fetch()?;
        let inst = Instruction::parse(raw);
        let op = inst.op()?;
        log::trace!("{:#010x}: {:08x} {}", self.pc, raw, op.mnemonic());
        self.execute(&inst, op)
    }

    /// Step until the program runs off the end of its image. Returns the
    /// number of instructions retired; any other trap aborts the run.
    pub fn run(&mut self) -> Result<u64, Trap> {
        let mut retired = 0u64;
        let result = loop {
            match self.step() {
                Ok(()) => retired += 1,
                Err(Trap::EndOfProgram) => break Ok(retired),
                Err(trap) => break Err(trap),
            }
        };
        self.bus.uart.flush();
        match &result {
            Ok(n) => log::info!("program finished after {} instructions", n),
            Err(trap) => log::error!(
                "run aborted at pc={:#x} after {} instructions: {}",
                self.pc,
                retired,
                trap
            ),
        }
        result
    }
}
