//! Program image loading: flat binaries and ELF executables.

use std::io;

use goblin::elf::{program_header::PT_LOAD, Elf};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::bus::{BusError, SystemBus};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("ELF parse error: {0}")]
    Elf(#[from] goblin::error::Error),

    #[error("segment exceeds file bounds (offset {0:#x})")]
    Truncated(u64),

    #[error("segment {addr:#x}+{len:#x} lies outside RAM")]
    OutOfRange { addr: u64, len: u64 },

    #[error("bus layout: {0}")]
    Layout(#[from] BusError),
}

/// Where a loaded program starts and how far its code and data reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image {
    pub entry: u64,
    /// Bytes from the RAM base to the end of the highest loaded byte.
    pub extent: u64,
}

/// Copy `bytes` into RAM. ELF executables are placed segment by segment;
/// anything else is treated as a flat image at the RAM base.
pub fn load_image(bytes: &[u8], bus: &mut SystemBus) -> Result<Image, LoadError> {
    let image = if bytes.starts_with(ELF_MAGIC) {
        load_elf(bytes, bus)?
    } else {
        load_raw(bytes, bus)?
    };

    let digest = hex::encode(Sha256::digest(bytes));
    log::info!(
        "loaded {} bytes, entry={:#x}, extent={:#x}, sha256={}",
        bytes.len(),
        image.entry,
        image.extent,
        digest
    );
    Ok(image)
}

fn load_raw(bytes: &[u8], bus: &mut SystemBus) -> Result<Image, LoadError> {
    let base = bus.dram_base();
    bus.memory
        .write_bytes(base, bytes)
        .map_err(|_| LoadError::OutOfRange {
            addr: base,
            len: bytes.len() as u64,
        })?;
    Ok(Image {
        entry: base,
        extent: bytes.len() as u64,
    })
}

fn load_elf(buffer: &[u8], bus: &mut SystemBus) -> Result<Image, LoadError> {
    let elf = Elf::parse(buffer)?;
    let base = bus.dram_base();
    let mut extent = 0u64;

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_memsz == 0 {
            continue;
        }

        let file_size = ph.p_filesz as usize;
        let mem_size = ph.p_memsz as usize;
        let file_offset = ph.p_offset as usize;

        let file_end = file_offset
            .checked_add(file_size)
            .filter(|&end| end <= buffer.len())
            .ok_or(LoadError::Truncated(ph.p_offset))?;

        let target_addr = if ph.p_paddr != 0 {
            ph.p_paddr
        } else {
            ph.p_vaddr
        };
        let out_of_range = || LoadError::OutOfRange {
            addr: target_addr,
            len: ph.p_memsz,
        };

        bus.memory
            .write_bytes(target_addr, &buffer[file_offset..file_end])
            .map_err(|_| out_of_range())?;
        if mem_size > file_size {
            bus.memory
                .zero_range(target_addr + file_size as u64, mem_size - file_size)
                .map_err(|_| out_of_range())?;
        }

        log::debug!(
            "segment {:#x}: {:#x} file bytes, {:#x} in memory",
            target_addr,
            file_size,
            mem_size
        );
        extent = extent.max(target_addr - base + ph.p_memsz);
    }

    Ok(Image {
        entry: elf.entry,
        extent,
    })
}
