use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::cpu::{Cpu, Mode};

/// Version identifier for snapshot compatibility checks.
pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    Version { expected: String, found: String },

    #[error("snapshot RAM layout mismatch: machine {machine_base:#x}+{machine_size:#x}, snapshot {base:#x}+{size:#x}")]
    Layout {
        machine_base: u64,
        machine_size: u64,
        base: u64,
        size: u64,
    },

    #[error("snapshot memory hash mismatch")]
    Hash,
}

/// Full machine snapshot: hart, console and RAM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub cpu: CpuSnapshot,
    pub uart: UartSnapshot,
    pub memory: MemRegionSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub pc: u64,
    pub mode: Mode,
    pub regs: [u64; 32],
    /// Non-zero CSRs only.
    pub csrs: HashMap<u16, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UartSnapshot {
    pub regs: Vec<u8>,
    pub pending_output: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemRegionSnapshot {
    pub base: u64,
    pub size: u64,
    /// Hex SHA-256 of `data`.
    pub hash: String,
    pub data: Vec<u8>,
}

fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

impl Snapshot {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

impl Cpu {
    /// Capture the complete machine state.
    pub fn snapshot(&self) -> Snapshot {
        let cpu = CpuSnapshot {
            pc: self.pc,
            mode: self.mode,
            regs: *self.regs.as_array(),
            csrs: self.csrs.export(),
        };

        let uart = UartSnapshot {
            regs: self.bus.uart.registers(),
            pending_output: self.bus.uart.pending_output(),
        };

        let data = self.bus.memory.as_bytes().to_vec();
        let memory = MemRegionSnapshot {
            base: self.bus.memory.base(),
            size: data.len() as u64,
            hash: digest(&data),
            data,
        };

        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            cpu,
            uart,
            memory,
        }
    }

    /// Restore state from a snapshot taken on a machine with the same RAM
    /// layout. Nothing is modified if validation fails.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                expected: SNAPSHOT_VERSION.to_string(),
                found: snapshot.version.clone(),
            });
        }

        let region = &snapshot.memory;
        let machine_base = self.bus.memory.base();
        let machine_size = self.bus.memory.size() as u64;
        if region.base != machine_base
            || region.size != machine_size
            || region.data.len() as u64 != machine_size
        {
            return Err(SnapshotError::Layout {
                machine_base,
                machine_size,
                base: region.base,
                size: region.size,
            });
        }
        if digest(&region.data) != region.hash {
            return Err(SnapshotError::Hash);
        }

        self.bus
            .memory
            .restore_bytes(&region.data)
            .map_err(|_| SnapshotError::Layout {
                machine_base,
                machine_size,
                base: region.base,
                size: region.size,
            })?;

        self.pc = snapshot.cpu.pc;
        self.mode = snapshot.cpu.mode;
        self.regs.load_array(snapshot.cpu.regs);
        self.csrs.import(&snapshot.cpu.csrs);

        self.bus
            .uart
            .restore(&snapshot.uart.regs, &snapshot.uart.pending_output);

        log::debug!("restored snapshot at pc={:#x}", self.pc);
        Ok(())
    }
}
