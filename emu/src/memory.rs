use thiserror::Error;

/// Device-local memory access errors.
///
/// These are mapped into architectural traps by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("out-of-bounds memory access at {0:#x}")]
    OutOfBounds(u64),

    #[error("invalid access width: {0} bytes")]
    InvalidWidth(u64),
}

/// Flat RAM backing store, addressed by full physical address.
pub struct Memory {
    base: u64,
    data: Vec<u8>,
}

impl Memory {
    /// Create a zero-initialised RAM region of `size` bytes at `base`.
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// One past the last valid address.
    pub fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    #[inline]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Validate an access and return its offset into the backing store.
    pub fn check(&self, addr: u64, size: u64) -> Result<usize, MemoryError> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(MemoryError::InvalidWidth(size));
        }
        let off = addr
            .checked_sub(self.base)
            .ok_or(MemoryError::OutOfBounds(addr))?;
        match off.checked_add(size) {
            Some(last) if last <= self.data.len() as u64 => Ok(off as usize),
            _ => Err(MemoryError::OutOfBounds(addr)),
        }
    }

    pub fn load(&self, addr: u64, size: u64) -> Result<u64, MemoryError> {
        let off = self.check(addr, size)?;
        let mut buf = [0u8; 8];
        buf[..size as usize].copy_from_slice(&self.data[off..off + size as usize]);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn store(&mut self, addr: u64, size: u64, value: u64) -> Result<(), MemoryError> {
        let off = self.check(addr, size)?;
        let bytes = value.to_le_bytes();
        self.data[off..off + size as usize].copy_from_slice(&bytes[..size as usize]);
        Ok(())
    }

    /// Copy a block into RAM, e.g. a program image or segment.
    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(addr, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    pub fn zero_range(&mut self, addr: u64, len: usize) -> Result<(), MemoryError> {
        let range = self.range(addr, len)?;
        self.data[range].fill(0);
        Ok(())
    }

    fn range(&self, addr: u64, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let off = addr
            .checked_sub(self.base)
            .ok_or(MemoryError::OutOfBounds(addr))? as usize;
        match off.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(off..end),
            _ => Err(MemoryError::OutOfBounds(addr)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Replace the whole contents; the length must match the capacity.
    pub fn restore_bytes(&mut self, bytes: &[u8]) -> Result<(), MemoryError> {
        if bytes.len() != self.data.len() {
            return Err(MemoryError::OutOfBounds(self.base + bytes.len() as u64));
        }
        self.data.copy_from_slice(bytes);
        Ok(())
    }
}
