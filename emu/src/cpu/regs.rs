use crate::config::ABI_NAMES;

/// The 32 integer registers. `x0` is hard-wired to zero.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    regs: [u64; 32],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self { regs: [0; 32] }
    }

    #[inline]
    pub fn read(&self, idx: u8) -> u64 {
        self.regs[(idx & 0x1F) as usize]
    }

    /// Writes to `x0` are discarded.
    #[inline]
    pub fn write(&mut self, idx: u8, val: u64) {
        let idx = (idx & 0x1F) as usize;
        if idx != 0 {
            self.regs[idx] = val;
        }
    }

    pub fn as_array(&self) -> &[u64; 32] {
        &self.regs
    }

    pub fn load_array(&mut self, regs: [u64; 32]) {
        self.regs = regs;
        self.regs[0] = 0;
    }

    /// Resolve `x0`..`x31` or an ABI mnemonic (case-insensitive) to an index.
    /// `fp` is accepted as an alias of `s0`.
    pub fn lookup(name: &str) -> Option<u8> {
        let name = name.trim().to_ascii_lowercase();
        if let Some(num) = name.strip_prefix('x') {
            if let Ok(idx) = num.parse::<u8>() {
                return (idx < 32).then_some(idx);
            }
        }
        if name == "fp" {
            return Some(8);
        }
        ABI_NAMES
            .iter()
            .position(|abi| *abi == name)
            .map(|idx| idx as u8)
    }

    pub fn read_by_name(&self, name: &str) -> Option<u64> {
        Self::lookup(name).map(|idx| self.read(idx))
    }

    pub fn abi_name(idx: u8) -> &'static str {
        ABI_NAMES[(idx & 0x1F) as usize]
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
