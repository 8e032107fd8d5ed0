//! In-memory serial port.
//!
//! `MockPort` behaves like a device on the other end of a cable: bytes pushed
//! with [`MockPort::push_line`] become readable, everything written is
//! recorded. Clones share the same state, so a test keeps one handle while the
//! link owns another.
//!
//! ```
//! use firmlink::port::mock::MockPort;
//! use firmlink::link::SerialLink;
//!
//! let device = MockPort::new("MOCK0");
//! let link = SerialLink::from_port(Box::new(device.clone())).unwrap();
//!
//! link.write_line("13:ON\n").unwrap();
//! assert_eq!(device.written_lines(), vec!["13:ON".to_string()]);
//!
//! device.push_line("LED ON");
//! assert_eq!(link.read_line().unwrap().as_deref(), Some("LED ON"));
//! ```

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::Result;
use crate::port::{DEFAULT_BAUD, Port};

#[derive(Debug, Default)]
struct MockState {
    rx: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    fail_writes: bool,
    closed: bool,
}

/// Scripted in-memory transport.
#[derive(Clone)]
pub struct MockPort {
    name: String,
    baud_rate: u32,
    timeout: Duration,
    shared: Arc<(Mutex<MockState>, Condvar)>,
}

impl MockPort {
    /// Create a mock port with a short read timeout.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            baud_rate: DEFAULT_BAUD,
            timeout: Duration::from_millis(20),
            shared: Arc::new((Mutex::new(MockState::default()), Condvar::new())),
        }
    }

    /// Set the read timeout used when no data is queued.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.shared
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue raw bytes as if the device had sent them.
    pub fn push_bytes(&self, data: &[u8]) {
        self.state()
            .rx
            .extend(data);
        self.shared
            .1
            .notify_all();
    }

    /// Queue a newline-terminated text line.
    pub fn push_line(&self, line: &str) {
        let mut data = line
            .as_bytes()
            .to_vec();
        data.push(b'\n');
        self.push_bytes(&data);
    }

    /// Every buffer passed to `write`, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state()
            .writes
            .clone()
    }

    /// Written data split into lines without terminators.
    pub fn written_lines(&self) -> Vec<String> {
        let bytes: Vec<u8> = self
            .state()
            .writes
            .concat();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Make subsequent writes fail with `BrokenPipe`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state()
            .fail_writes = fail;
    }

    /// Whether any handle closed the port.
    pub fn is_closed(&self) -> bool {
        self.state()
            .closed
    }
}

impl Port for MockPort {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_port(&self) -> Result<Box<dyn Port>> {
        Ok(Box::new(self.clone()))
    }

    fn close(&mut self) -> Result<()> {
        self.state()
            .closed = true;
        self.shared
            .1
            .notify_all();
        Ok(())
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (lock, ready) = &*self.shared;
        let state = lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (mut state, _) = ready
            .wait_timeout_while(state, self.timeout, |s| s.rx.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);

        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        if state
            .rx
            .is_empty()
        {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }

        let n = buf
            .len()
            .min(state.rx.len());
        for (slot, byte) in buf
            .iter_mut()
            .zip(state.rx.drain(..n))
        {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        state
            .writes
            .push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_times_out_when_empty() {
        let mut port = MockPort::new("MOCK0").with_timeout(Duration::from_millis(5));
        let mut buf = [0u8; 8];
        let err = port
            .read(&mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_clones_share_queue() {
        let device = MockPort::new("MOCK0");
        let mut link_side = device.clone();
        device.push_bytes(b"abc");

        let mut buf = [0u8; 8];
        let n = link_side
            .read(&mut buf)
            .unwrap();
        assert_eq!(&buf[..n], b"abc");
    }

    #[test]
    fn test_failed_writes_are_not_recorded() {
        let mut port = MockPort::new("MOCK0");
        port.set_fail_writes(true);
        assert!(
            port.write(b"2:ON\n")
                .is_err()
        );
        assert!(
            port.writes()
                .is_empty()
        );
    }

    #[test]
    fn test_close_is_visible_to_all_handles() {
        let device = MockPort::new("MOCK0");
        let mut link_side = device.clone();
        link_side
            .close()
            .unwrap();
        assert!(device.is_closed());
    }
}
