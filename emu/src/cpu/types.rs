use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::MemoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    User,
    Supervisor,
    Machine,
}

impl Mode {
    /// Encode privilege mode into the MPP/SPP field encoding.
    pub fn to_mpp(self) -> u64 {
        match self {
            Mode::User => 0b00,
            Mode::Supervisor => 0b01,
            Mode::Machine => 0b11,
        }
    }

    /// Decode MPP/SPP field into a privilege mode.
    pub fn from_mpp(bits: u64) -> Mode {
        match bits & 0b11 {
            0b00 => Mode::User,
            0b01 => Mode::Supervisor,
            // 0b10 is reserved; treat as Machine for WARL coercion.
            _ => Mode::Machine,
        }
    }
}

/// Everything that can stop an instruction from completing.
///
/// All variants except [`Trap::EndOfProgram`] are fatal to the run: there is
/// no trap delivery back into the guest, so the run loop hands them straight
/// to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Trap {
    #[error("illegal instruction {0:#010x}")]
    IllegalInstruction(u32),

    /// Access outside RAM, the console window or the CSR index range.
    #[error("invalid address {0:#x}")]
    InvalidAddress(u64),

    #[error("invalid access width: {0} bytes")]
    InvalidAccessWidth(u64),

    /// Fetch ran past the loaded image. Not an error; ends the run cleanly.
    #[error("end of program")]
    EndOfProgram,
}

impl From<MemoryError> for Trap {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::OutOfBounds(addr) => Trap::InvalidAddress(addr),
            MemoryError::InvalidWidth(size) => Trap::InvalidAccessWidth(size),
        }
    }
}
