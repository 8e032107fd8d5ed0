//! The single owned serial connection.
//!
//! A `SerialLink` splits its transport into two handles:
//!
//! - a **writer**, behind a mutex, so concurrent senders (manual commands and
//!   the toggle loop) never interleave partial lines
//! - a **reader**, a cloned handle plus a line buffer, so a reader blocked in
//!   its timeout-bounded read never holds up a write
//!
//! The link is the only source of truth for "connected". Once closed, every
//! read and write fails with [`Error::LinkClosed`].

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::error::{Error, Result};
use crate::port::{Port, SerialConfig};
use crate::protocol::clean_line;

/// A line longer than this is flushed without its terminator.
const MAX_LINE_LEN: usize = 1024;

struct ReadHalf {
    port: Box<dyn Port>,
    pending: Vec<u8>,
}

impl ReadHalf {
    /// Pop one complete line from the buffer, if any.
    fn take_line(&mut self) -> Option<String> {
        if let Some(end) = self
            .pending
            .iter()
            .position(|b| *b == b'\n')
        {
            let raw: Vec<u8> = self
                .pending
                .drain(..=end)
                .collect();
            return Some(clean_line(&raw));
        }
        if self
            .pending
            .len()
            >= MAX_LINE_LEN
        {
            let raw = std::mem::take(&mut self.pending);
            return Some(clean_line(&raw));
        }
        None
    }
}

/// Exclusive handle on an open serial connection.
pub struct SerialLink {
    name: String,
    baud_rate: u32,
    timeout: Duration,
    open: AtomicBool,
    writer: Mutex<Option<Box<dyn Port>>>,
    reader: Mutex<Option<ReadHalf>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl SerialLink {
    /// Open a native serial port.
    #[cfg(feature = "native")]
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = crate::port::native::NativePort::open(config)?;
        let link = Self::from_port(Box::new(port))?;
        info!("Connected to {} at {} baud", link.name, link.baud_rate);
        Ok(link)
    }

    /// Open a serial port (no native backend available).
    #[cfg(not(feature = "native"))]
    pub fn open(config: &SerialConfig) -> Result<Self> {
        Err(Error::Connection {
            port: config
                .port_name
                .clone(),
            reason: "native serial support is disabled".to_string(),
        })
    }

    /// Take ownership of an already open port.
    pub fn from_port(port: Box<dyn Port>) -> Result<Self> {
        let reader = port.try_clone_port()?;
        Ok(Self {
            name: port
                .name()
                .to_string(),
            baud_rate: port.baud_rate(),
            timeout: port.timeout(),
            open: AtomicBool::new(true),
            writer: Mutex::new(Some(port)),
            reader: Mutex::new(Some(ReadHalf {
                port: reader,
                pending: Vec::new(),
            })),
        })
    }

    /// Port identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Per-read timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the link is still open.
    pub fn is_open(&self) -> bool {
        self.open
            .load(Ordering::Acquire)
    }

    /// Write one line. A missing trailing newline is added.
    pub fn write_line(&self, line: &str) -> Result<()> {
        if !self.is_open() {
            return Err(Error::LinkClosed);
        }
        let mut guard = lock(&self.writer);
        let port = guard
            .as_mut()
            .ok_or(Error::LinkClosed)?;

        let mut data = line
            .as_bytes()
            .to_vec();
        if !line.ends_with('\n') {
            data.push(b'\n');
        }
        trace!("TX {}: {:?}", self.name, line.trim_end());

        port.write_all(&data)
            .and_then(|()| port.flush())
            .map_err(|source| Error::Write {
                port: self
                    .name
                    .clone(),
                source,
            })
    }

    /// Read one line, waiting at most one read timeout for more data.
    ///
    /// Returns `Ok(None)` when nothing complete arrived in time. Partial data
    /// stays buffered for the next call.
    pub fn read_line(&self) -> Result<Option<String>> {
        if !self.is_open() {
            return Err(Error::LinkClosed);
        }
        let mut guard = lock(&self.reader);
        let half = guard
            .as_mut()
            .ok_or(Error::LinkClosed)?;

        let mut buf = [0u8; 256];
        loop {
            if let Some(line) = half.take_line() {
                trace!("RX {}: {line:?}", self.name);
                return Ok(Some(line));
            }
            match half
                .port
                .read(&mut buf)
            {
                Ok(0) => return Ok(None),
                Ok(n) => half
                    .pending
                    .extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    return Ok(None);
                },
                Err(_) if !self.is_open() => return Err(Error::LinkClosed),
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Read raw bytes until `len` arrived or `window` elapsed.
    ///
    /// The result is shorter than `len` when the device stopped sending.
    pub fn read_block(&self, len: usize, window: Duration) -> Result<Vec<u8>> {
        if !self.is_open() {
            return Err(Error::LinkClosed);
        }
        let mut guard = lock(&self.reader);
        let half = guard
            .as_mut()
            .ok_or(Error::LinkClosed)?;

        let take = len.min(
            half.pending
                .len(),
        );
        let mut block: Vec<u8> = half
            .pending
            .drain(..take)
            .collect();

        let deadline = Instant::now() + window;
        let mut buf = [0u8; 64];
        while block.len() < len && Instant::now() < deadline {
            let want = (len - block.len()).min(buf.len());
            match half
                .port
                .read(&mut buf[..want])
            {
                Ok(n) => block.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {},
                Err(_) if !self.is_open() => return Err(Error::LinkClosed),
                Err(e) => return Err(Error::Io(e)),
            }
        }
        debug!("Read {} of {len} boot bytes from {}", block.len(), self.name);
        Ok(block)
    }

    /// Close the link. Safe to call repeatedly.
    ///
    /// Waits for an in-flight read to finish, which takes at most one read
    /// timeout.
    pub fn close(&self) {
        if !self
            .open
            .swap(false, Ordering::AcqRel)
        {
            return;
        }
        if let Some(mut port) = lock(&self.writer).take() {
            let _ = port.close();
        }
        if let Some(mut half) = lock(&self.reader).take() {
            let _ = half
                .port
                .close();
        }
        info!("Closed {}", self.name);
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("name", &self.name)
            .field("baud_rate", &self.baud_rate)
            .field("timeout", &self.timeout)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use std::sync::Arc;
    use std::thread;

    fn mock_link() -> (MockPort, SerialLink) {
        let device = MockPort::new("MOCK0");
        let link = SerialLink::from_port(Box::new(device.clone())).unwrap();
        (device, link)
    }

    #[test]
    fn test_write_line_appends_newline() {
        let (device, link) = mock_link();
        link.write_line("5:ON")
            .unwrap();
        link.write_line("13:OFF\n")
            .unwrap();
        assert_eq!(device.writes(), vec![b"5:ON\n".to_vec(), b"13:OFF\n".to_vec()]);
    }

    #[test]
    fn test_read_line_returns_none_on_timeout() {
        let (_device, link) = mock_link();
        assert_eq!(link.read_line().unwrap(), None);
    }

    #[test]
    fn test_read_line_reassembles_partial_lines() {
        let (device, link) = mock_link();
        device.push_bytes(b"Version: ");
        assert_eq!(link.read_line().unwrap(), None);

        device.push_bytes(b"1.0.0\r\nLED ON\n");
        assert_eq!(link.read_line().unwrap().as_deref(), Some("Version: 1.0.0"));
        assert_eq!(link.read_line().unwrap().as_deref(), Some("LED ON"));
        assert_eq!(link.read_line().unwrap(), None);
    }

    #[test]
    fn test_read_line_drops_invalid_bytes() {
        let (device, link) = mock_link();
        device.push_bytes(b"\xFE\xFF=== VishnuFirm ===\r\n");
        assert_eq!(link.read_line().unwrap().as_deref(), Some("=== VishnuFirm ==="));
    }

    #[test]
    fn test_read_block_leaves_following_lines_buffered() {
        let (device, link) = mock_link();
        device.push_bytes(&[0xF9, 0x02, 0x05]);
        device.push_line("=== VishnuFirm ===");
        let block = link
            .read_block(3, Duration::from_millis(200))
            .unwrap();
        assert_eq!(block, vec![0xF9, 0x02, 0x05]);
        assert_eq!(link.read_line().unwrap().as_deref(), Some("=== VishnuFirm ==="));
    }

    #[test]
    fn test_read_block_returns_short_read_after_window() {
        let (device, link) = mock_link();
        device.push_bytes(&[0xF9, 0x02, 0x05]);
        let block = link
            .read_block(64, Duration::from_millis(50))
            .unwrap();
        assert_eq!(block, vec![0xF9, 0x02, 0x05]);
    }

    #[test]
    fn test_read_block_stops_at_len() {
        let (device, link) = mock_link();
        device.push_bytes(&[1, 2, 3, 4, 5]);
        let block = link
            .read_block(4, Duration::from_secs(1))
            .unwrap();
        assert_eq!(block, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_closed_link_fails_fast() {
        let (device, link) = mock_link();
        link.close();
        link.close();
        assert!(device.is_closed());
        assert!(!link.is_open());
        assert!(matches!(link.write_line("2:ON"), Err(Error::LinkClosed)));
        assert!(matches!(link.read_line(), Err(Error::LinkClosed)));
        assert!(matches!(
            link.read_block(1, Duration::from_millis(1)),
            Err(Error::LinkClosed)
        ));
    }

    #[test]
    fn test_write_failure_names_port() {
        let (device, link) = mock_link();
        device.set_fail_writes(true);
        match link.write_line("2:ON") {
            Err(Error::Write { port, .. }) => assert_eq!(port, "MOCK0"),
            other => panic!("expected write error, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_closes_transport() {
        let (device, link) = mock_link();
        drop(link);
        assert!(device.is_closed());
    }

    #[test]
    fn test_concurrent_writers_never_interleave() {
        let (device, link) = mock_link();
        let link = Arc::new(link);

        let handles: Vec<_> = (2..6u8)
            .map(|pin| {
                let link = Arc::clone(&link);
                thread::spawn(move || {
                    for _ in 0..50 {
                        link.write_line(&format!("{pin}:ON"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle
                .join()
                .unwrap();
        }

        let lines = device.written_lines();
        assert_eq!(lines.len(), 200);
        assert!(lines.iter().all(|l| l.ends_with(":ON") && l.len() == 4));
    }
}
