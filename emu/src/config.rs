//! Fixed machine layout.
//!
//! These values are part of the guest-visible contract: images are linked
//! against `KERNEL_BASE` and drivers poke the console at `UART_BASE`.

/// Default RAM capacity in bytes (128 MiB).
pub const MEM_SIZE: usize = 128 * 1024 * 1024;

/// Physical address of the first byte of RAM; images are loaded here.
pub const KERNEL_BASE: u64 = 0x8000_0000;

/// Base of the 16550 console MMIO window.
pub const UART_BASE: u64 = 0x1000_0000;
/// Size of the console MMIO window.
pub const UART_SIZE: u64 = 0x100;
/// Interrupt line wired to the console.
pub const UART_IRQ: u32 = 10;

/// ABI mnemonics of the integer registers, indexed by register number.
pub const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", //
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5", //
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", //
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];
