pub mod core;
pub mod csr;
pub mod execution;
pub mod regs;
pub mod types;

pub use core::Cpu;
pub use regs::RegisterFile;
pub use types::{Mode, Trap};
