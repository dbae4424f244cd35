use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::UART_SIZE;
use crate::memory::MemoryError;

// Registers (offset)
pub const RHR: u64 = 0x00; // Receive Holding (Read)
pub const THR: u64 = 0x00; // Transmit Holding (Write)
pub const IER: u64 = 0x01; // Interrupt Enable
pub const ISR: u64 = 0x02; // Interrupt Status (Read)
pub const FCR: u64 = 0x02; // FIFO Control (Write)
pub const LCR: u64 = 0x03; // Line Control
pub const MCR: u64 = 0x04; // Modem Control
pub const LSR: u64 = 0x05; // Line Status
pub const MSR: u64 = 0x06; // Modem Status
pub const SPR: u64 = 0x07; // Scratch Pad

pub const IER_RX_ENABLE: u8 = 1 << 0;
pub const IER_TX_ENABLE: u8 = 1 << 1;
pub const FCR_FIFO_ENABLE: u8 = 1 << 0;
pub const FCR_FIFO_CLEAR: u8 = 0b11 << 1;
pub const LCR_EIGHT_BITS: u8 = 0b11;
pub const LCR_BAUD_LATCH: u8 = 1 << 7;
pub const LSR_RX_READY: u8 = 1 << 0;
pub const LSR_TX_IDLE: u8 = 1 << 5;

/// Staged output is forced out once it reaches this many bytes.
pub const OUTPUT_THRESHOLD: usize = 32;

const REG_COUNT: usize = UART_SIZE as usize;

/// Register file and output staging, protected by the device lock.
struct UartState {
    regs: [u8; REG_COUNT],
    output: Vec<u8>,
}

/// 16550-style console.
///
/// Input arrives from a separate thread through an [`InputPort`]. The port
/// may only fill the receive holding register after taking a credit, and a
/// credit is issued each time the guest consumes a pending byte, so at most
/// one input byte is ever unread. Credits are always sent with the register
/// lock released.
pub struct Uart {
    state: Arc<Mutex<UartState>>,
    sink: Mutex<Box<dyn Write + Send>>,
    credit_tx: SyncSender<()>,
    credit_rx: Mutex<Option<Receiver<()>>>,
}

/// Producer side of the console input rendezvous.
pub struct InputPort {
    state: Arc<Mutex<UartState>>,
    credits: Receiver<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Uart {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        let mut regs = [0u8; REG_COUNT];
        regs[LSR as usize] = LSR_TX_IDLE;

        let (credit_tx, credit_rx) = mpsc::sync_channel(1);
        // The slot starts empty, so the first byte needs no consumer.
        let _ = credit_tx.try_send(());

        Self {
            state: Arc::new(Mutex::new(UartState {
                regs,
                output: Vec::with_capacity(OUTPUT_THRESHOLD),
            })),
            sink: Mutex::new(sink),
            credit_tx,
            credit_rx: Mutex::new(Some(credit_rx)),
        }
    }

    /// Console writing to the host's standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Hand out the input side. Only one port exists per device; later calls
    /// return `None`.
    pub fn input_port(&self) -> Option<InputPort> {
        lock(&self.credit_rx).take().map(|credits| InputPort {
            state: Arc::clone(&self.state),
            credits,
        })
    }

    pub fn load(&self, offset: u64, size: u64) -> Result<u64, MemoryError> {
        if size != 1 {
            return Err(MemoryError::InvalidWidth(size));
        }
        let idx = (offset as usize) % REG_COUNT;

        let (val, consumed) = {
            let mut state = lock(&self.state);
            let val = state.regs[idx];
            let mut consumed = false;
            if offset == RHR {
                consumed = state.regs[LSR as usize] & LSR_RX_READY != 0;
                state.regs[LSR as usize] &= !LSR_RX_READY;
            }
            (val, consumed)
        };

        if consumed {
            // Full means a credit is already outstanding.
            let _ = self.credit_tx.try_send(());
        }
        Ok(val as u64)
    }

    pub fn store(&self, offset: u64, size: u64, value: u64) -> Result<(), MemoryError> {
        if size != 1 {
            return Err(MemoryError::InvalidWidth(size));
        }
        let val = (value & 0xff) as u8;
        let mut state = lock(&self.state);

        if offset == THR {
            log::trace!(
                "uart tx '{}' ({:#04x})",
                if val.is_ascii_graphic() { val as char } else { '.' },
                val
            );
            state.output.push(val);
            if val == b'\n' || state.output.len() >= OUTPUT_THRESHOLD {
                self.drain(&mut state);
            }
        } else {
            state.regs[(offset as usize) % REG_COUNT] = val;
        }
        Ok(())
    }

    fn drain(&self, state: &mut UartState) {
        if state.output.is_empty() {
            return;
        }
        let mut sink = lock(&self.sink);
        if let Err(e) = sink.write_all(&state.output).and_then(|_| sink.flush()) {
            log::warn!("console output failed: {}", e);
        }
        state.output.clear();
    }

    /// Push out whatever is staged, e.g. a trailing partial line.
    pub fn flush(&self) {
        let mut state = lock(&self.state);
        self.drain(&mut state);
    }

    /// Deliver a byte from the host without going through the input thread.
    /// Returns `false` if the previous byte has not been read yet.
    pub fn push_input(&self, byte: u8) -> bool {
        let mut state = lock(&self.state);
        fill_slot(&mut state, byte)
    }

    pub fn pending_output(&self) -> Vec<u8> {
        lock(&self.state).output.clone()
    }

    /// Register file contents, read without side effects.
    pub fn registers(&self) -> Vec<u8> {
        lock(&self.state).regs.to_vec()
    }

    /// Replace the register file and staged output. An empty restored slot
    /// releases an input thread still waiting on the byte it replaced.
    pub fn restore(&self, regs: &[u8], pending_output: &[u8]) {
        let slot_empty = {
            let mut state = lock(&self.state);
            let len = regs.len().min(REG_COUNT);
            state.regs[..len].copy_from_slice(&regs[..len]);
            state.output.clear();
            state.output.extend_from_slice(pending_output);
            state.regs[LSR as usize] & LSR_RX_READY == 0
        };

        if slot_empty {
            let _ = self.credit_tx.try_send(());
        }
    }
}

fn fill_slot(state: &mut UartState, byte: u8) -> bool {
    if state.regs[LSR as usize] & LSR_RX_READY != 0 {
        return false;
    }
    state.regs[RHR as usize] = byte;
    state.regs[LSR as usize] |= LSR_RX_READY;
    true
}

impl InputPort {
    /// Block until the guest is ready for another byte, then make `byte`
    /// readable. Returns `false` once the device is gone.
    pub fn deliver(&self, byte: u8) -> bool {
        loop {
            if self.credits.recv().is_err() {
                return false;
            }
            // A byte pushed directly by the host may have taken the slot; its
            // consumption issues the next credit.
            if fill_slot(&mut lock(&self.state), byte) {
                return true;
            }
        }
    }
}
