pub mod bus;
pub mod config;
pub mod console;
pub mod cpu;
pub mod decoder;
pub mod loader;
pub mod memory;
pub mod snapshot;
pub mod uart;

pub use cpu::{Cpu, Mode, Trap};
