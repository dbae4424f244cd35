use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use super::types::Trap;

/// Number of addressable CSRs (12-bit address space).
pub const CSR_COUNT: usize = 4096;

/// Flat CSR storage with the supervisor views layered on top.
///
/// `sstatus`, `sie` and `sip` have no storage of their own: every access is
/// projected onto `mstatus`, `mie` and `mip`.
pub struct CsrFile {
    storage: Box<[u64; CSR_COUNT]>,
}

impl CsrFile {
    pub fn new() -> Self {
        Self {
            storage: Box::new([0; CSR_COUNT]),
        }
    }

    pub fn export(&self) -> HashMap<u16, u64> {
        let mut map = HashMap::new();
        for (idx, &val) in self.storage.iter().enumerate() {
            if val != 0 {
                map.insert(idx as u16, val);
            }
        }
        map
    }

    pub fn import(&mut self, map: &HashMap<u16, u64>) {
        self.storage.fill(0);
        for (&addr, &val) in map.iter() {
            let idx = addr as usize;
            if idx < CSR_COUNT {
                self.storage[idx] = val;
            }
        }
    }

    fn check(addr: u64) -> Result<usize, Trap> {
        if addr >= CSR_COUNT as u64 {
            return Err(Trap::InvalidAddress(addr));
        }
        Ok(addr as usize)
    }

    pub fn load(&self, addr: u64) -> Result<u64, Trap> {
        let idx = Self::check(addr)?;
        let mideleg = self.storage[CSR_MIDELEG as usize];
        let val = match idx as u16 {
            CSR_SIE => self.storage[CSR_MIE as usize] & mideleg,
            CSR_SIP => self.storage[CSR_MIP as usize] & mideleg,
            CSR_SSTATUS => self.storage[CSR_MSTATUS as usize] & SSTATUS_MASK,
            _ => self.storage[idx],
        };
        Ok(val)
    }

    pub fn store(&mut self, addr: u64, val: u64) -> Result<(), Trap> {
        let idx = Self::check(addr)?;
        let mideleg = self.storage[CSR_MIDELEG as usize];
        match idx as u16 {
            CSR_SIE => {
                let mie = &mut self.storage[CSR_MIE as usize];
                *mie = (*mie & !mideleg) | (val & mideleg);
            }
            CSR_SIP => {
                let mip = &mut self.storage[CSR_MIP as usize];
                *mip = (*mip & !mideleg) | (val & mideleg);
            }
            CSR_SSTATUS => {
                let mstatus = &mut self.storage[CSR_MSTATUS as usize];
                *mstatus = (*mstatus & !SSTATUS_MASK) | (val & SSTATUS_MASK);
            }
            _ => self.storage[idx] = val,
        }
        Ok(())
    }
}

impl Default for CsrFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for CsrFile {
    type Output = u64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.storage[index]
    }
}

impl IndexMut<usize> for CsrFile {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.storage[index]
    }
}

// Machine information registers
pub const CSR_MVENDORID: u16 = 0xF11;
pub const CSR_MARCHID: u16 = 0xF12;
pub const CSR_MIMPID: u16 = 0xF13;
pub const CSR_MHARTID: u16 = 0xF14;
pub const CSR_MCONFIGPTR: u16 = 0xF15;

// Machine trap setup
pub const CSR_MSTATUS: u16 = 0x300;
pub const CSR_MISA: u16 = 0x301;
pub const CSR_MEDELEG: u16 = 0x302;
pub const CSR_MIDELEG: u16 = 0x303;
pub const CSR_MIE: u16 = 0x304;
pub const CSR_MTVEC: u16 = 0x305;
pub const CSR_MCOUNTEREN: u16 = 0x306;
pub const CSR_MSTATUSH: u16 = 0x310; // RV32 only

// Machine trap handling
pub const CSR_MSCRATCH: u16 = 0x340;
pub const CSR_MEPC: u16 = 0x341;
pub const CSR_MCAUSE: u16 = 0x342;
pub const CSR_MTVAL: u16 = 0x343;
pub const CSR_MIP: u16 = 0x344;
pub const CSR_MTINST: u16 = 0x34A;
pub const CSR_MTVAL2: u16 = 0x34B;

// Supervisor trap setup
pub const CSR_SSTATUS: u16 = 0x100;
pub const CSR_SEDELEG: u16 = 0x102;
pub const CSR_SIDELEG: u16 = 0x103;
pub const CSR_SIE: u16 = 0x104;
pub const CSR_STVEC: u16 = 0x105;
pub const CSR_SCOUNTEREN: u16 = 0x106;

// Supervisor trap handling
pub const CSR_SSCRATCH: u16 = 0x140;
pub const CSR_SEPC: u16 = 0x141;
pub const CSR_SCAUSE: u16 = 0x142;
pub const CSR_STVAL: u16 = 0x143;
pub const CSR_SIP: u16 = 0x144;

// Supervisor protection and translation (stored, never walked)
pub const CSR_SATP: u16 = 0x180;

// mstatus / sstatus fields
pub const MASK_SIE: u64 = 1 << 1;
pub const MASK_MIE: u64 = 1 << 3;
pub const MASK_SPIE: u64 = 1 << 5;
pub const MASK_UBE: u64 = 1 << 6;
pub const MASK_MPIE: u64 = 1 << 7;
pub const MASK_SPP: u64 = 1 << 8;
pub const MASK_VS: u64 = 0b11 << 9;
pub const MASK_MPP: u64 = 0b11 << 11;
pub const MASK_FS: u64 = 0b11 << 13;
pub const MASK_XS: u64 = 0b11 << 15;
pub const MASK_MPRV: u64 = 1 << 17;
pub const MASK_SUM: u64 = 1 << 18;
pub const MASK_MXR: u64 = 1 << 19;
pub const MASK_TVM: u64 = 1 << 20;
pub const MASK_TW: u64 = 1 << 21;
pub const MASK_TSR: u64 = 1 << 22;
pub const MASK_UXL: u64 = 0b11 << 32;
pub const MASK_SXL: u64 = 0b11 << 34;
pub const MASK_SBE: u64 = 1 << 36;
pub const MASK_MBE: u64 = 1 << 37;
pub const MASK_SD: u64 = 1 << 63;

/// Bits of `mstatus` visible through `sstatus`.
pub const SSTATUS_MASK: u64 = MASK_SIE
    | MASK_SPIE
    | MASK_UBE
    | MASK_SPP
    | MASK_FS
    | MASK_XS
    | MASK_SUM
    | MASK_MXR
    | MASK_UXL
    | MASK_SD;
