//! Host side of the console: the input thread and raw terminal mode.

use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crate::uart::InputPort;

/// Spawn the background thread feeding `reader` into the console one byte at
/// a time.
///
/// The thread lives until the reader hits EOF or fails, or the device is
/// dropped. Panics inside it are caught and logged.
pub fn spawn_input<R>(port: InputPort, reader: R) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| input_loop(&port, reader)));
            if let Err(payload) = result {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("console input thread panicked: {}", msg);
            }
        })
}

fn input_loop<R: Read>(port: &InputPort, mut reader: R) {
    let mut buffer = [0u8; 1];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                log::warn!("console input closed");
                break;
            }
            Ok(_) => {
                if !port.deliver(buffer[0]) {
                    log::debug!("console device gone; stopping input");
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                log::error!("console input failed: {}", e);
                break;
            }
        }
    }
}

/// RAII guard for Unix raw terminal mode on stdin.
#[cfg(unix)]
pub struct RawModeGuard {
    original: libc::termios,
}

#[cfg(unix)]
impl RawModeGuard {
    pub fn new() -> io::Result<Self> {
        use std::mem::MaybeUninit;
        use std::os::unix::io::AsRawFd;

        let fd = io::stdin().as_raw_fd();
        let mut original = MaybeUninit::<libc::termios>::uninit();

        // SAFETY: tcgetattr fully initialises `original` when it returns 0.
        let original = unsafe {
            if libc::tcgetattr(fd, original.as_mut_ptr()) != 0 {
                return Err(io::Error::last_os_error());
            }
            original.assume_init()
        };

        let mut raw = original;
        // Disable canonical mode and echo
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        // Read returns after 1 byte
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;

        // SAFETY: `raw` is a valid termios derived from the current settings.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { original })
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        let fd = io::stdin().as_raw_fd();
        // SAFETY: restores the settings captured in `new`.
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, &self.original);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uart::{tests::SharedSink, Uart, LSR, LSR_RX_READY, RHR};
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn wait_rx_ready(uart: &Uart) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while uart.load(LSR, 1).unwrap() as u8 & LSR_RX_READY == 0 {
            assert!(Instant::now() < deadline, "input never arrived");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn input_arrives_one_byte_at_a_time() {
        let uart = Uart::new(Box::new(SharedSink::default()));
        let handle = spawn_input(uart.input_port().unwrap(), Cursor::new(b"hi".to_vec())).unwrap();

        wait_rx_ready(&uart);
        // The second byte must not overwrite the unread first one.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(uart.registers()[RHR as usize], b'h');
        assert_eq!(uart.load(RHR, 1).unwrap(), b'h' as u64);

        wait_rx_ready(&uart);
        assert_eq!(uart.load(RHR, 1).unwrap(), b'i' as u64);

        // EOF ends the thread without touching the device.
        handle.join().unwrap();
        assert_eq!(uart.load(LSR, 1).unwrap() as u8 & LSR_RX_READY, 0);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    struct PanickingReader;

    impl Read for PanickingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            panic!("reader exploded");
        }
    }

    #[test]
    fn reader_faults_stay_in_the_input_thread() {
        let uart = Uart::new(Box::new(SharedSink::default()));
        let port = uart.input_port().unwrap();
        spawn_input(port, FailingReader).unwrap().join().unwrap();

        let uart = Uart::new(Box::new(SharedSink::default()));
        let port = uart.input_port().unwrap();
        // The panic is caught, so join sees a clean exit.
        assert!(spawn_input(port, PanickingReader).unwrap().join().is_ok());
    }
}
