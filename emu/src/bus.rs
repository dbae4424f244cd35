use thiserror::Error;

use crate::config::{UART_BASE, UART_SIZE};
use crate::cpu::Trap;
use crate::memory::Memory;
use crate::uart::Uart;

/// System bus trait for memory and MMIO access.
///
/// Implementors provide the sized `load`/`store`; the fixed-width helpers
/// are derived from them.
pub trait Bus {
    fn load(&self, addr: u64, size: u64) -> Result<u64, Trap>;
    fn store(&mut self, addr: u64, size: u64, value: u64) -> Result<(), Trap>;

    fn read8(&self, addr: u64) -> Result<u8, Trap> {
        self.load(addr, 1).map(|v| v as u8)
    }

    fn read16(&self, addr: u64) -> Result<u16, Trap> {
        self.load(addr, 2).map(|v| v as u16)
    }

    fn read32(&self, addr: u64) -> Result<u32, Trap> {
        self.load(addr, 4).map(|v| v as u32)
    }

    fn read64(&self, addr: u64) -> Result<u64, Trap> {
        self.load(addr, 8)
    }

    fn write8(&mut self, addr: u64, val: u8) -> Result<(), Trap> {
        self.store(addr, 1, val as u64)
    }

    fn write16(&mut self, addr: u64, val: u16) -> Result<(), Trap> {
        self.store(addr, 2, val as u64)
    }

    fn write32(&mut self, addr: u64, val: u32) -> Result<(), Trap> {
        self.store(addr, 4, val as u64)
    }

    fn write64(&mut self, addr: u64, val: u64) -> Result<(), Trap> {
        self.store(addr, 8, val)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("RAM {base:#x}+{size:#x} overlaps the console window")]
    Overlap { base: u64, size: u64 },
}

/// RAM plus the console, on two fixed, disjoint windows.
pub struct SystemBus {
    pub memory: Memory,
    pub uart: Uart,
}

enum Region {
    Ram,
    Uart(u64),
}

impl SystemBus {
    pub fn new(memory: Memory, uart: Uart) -> Result<Self, BusError> {
        let base = memory.base();
        let size = memory.size() as u64;
        let end = base.saturating_add(size);
        if base < UART_BASE + UART_SIZE && UART_BASE < end {
            return Err(BusError::Overlap { base, size });
        }
        Ok(Self { memory, uart })
    }

    pub fn dram_base(&self) -> u64 {
        self.memory.base()
    }

    pub fn dram_size(&self) -> usize {
        self.memory.size()
    }

    /// Whether `addr` lies in RAM.
    pub fn is_ram(&self, addr: u64) -> bool {
        self.memory.contains(addr)
    }

    fn route(&self, addr: u64) -> Result<Region, Trap> {
        if self.memory.contains(addr) {
            Ok(Region::Ram)
        } else if (UART_BASE..UART_BASE + UART_SIZE).contains(&addr) {
            Ok(Region::Uart(addr - UART_BASE))
        } else {
            Err(Trap::InvalidAddress(addr))
        }
    }
}

impl Bus for SystemBus {
    fn load(&self, addr: u64, size: u64) -> Result<u64, Trap> {
        let val = match self.route(addr)? {
            Region::Ram => self.memory.load(addr, size)?,
            Region::Uart(offset) => self.uart.load(offset, size)?,
        };
        Ok(val)
    }

    fn store(&mut self, addr: u64, size: u64, value: u64) -> Result<(), Trap> {
        match self.route(addr)? {
            Region::Ram => self.memory.store(addr, size, value)?,
            Region::Uart(offset) => self.uart.store(offset, size, value)?,
        }
        Ok(())
    }
}
