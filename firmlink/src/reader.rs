//! Background ingestion of device output.
//!
//! An `AsyncReader` owns one thread that loops [`SerialLink::read_line`] for
//! as long as the link is open and hands every non-empty line to a sink. The
//! sink runs on the reader thread; a slow sink delays the next read but never
//! drops a line.
//!
//! Stopping is cooperative: [`AsyncReader::stop`] raises a flag that the loop
//! checks between polls, so it returns within one poll interval plus one read
//! timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::link::SerialLink;

/// Pause after a poll that returned no line.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the reader publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// A complete, trimmed, non-empty line.
    Line(String),
    /// The reader exited because the link failed or closed.
    Closed {
        /// Why reading stopped.
        reason: String,
    },
}

/// Consumer of reader events (display, log, verifier tap).
pub type LineSink = Arc<dyn Fn(ReaderEvent) + Send + Sync>;

/// Sink that forwards events into a channel. Send errors are ignored once the
/// receiver is gone.
pub fn channel_sink(tx: Sender<ReaderEvent>) -> LineSink {
    let tx = std::sync::Mutex::new(tx);
    Arc::new(move |event| {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(event);
        }
    })
}

/// Handle to a running reader thread.
pub struct AsyncReader {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AsyncReader {
    /// Start reading with the default poll interval.
    pub fn spawn(link: Arc<SerialLink>, sink: LineSink) -> Result<Self> {
        Self::spawn_with_interval(link, sink, DEFAULT_POLL_INTERVAL)
    }

    /// Start reading, sleeping `poll_interval` after each empty poll.
    pub fn spawn_with_interval(
        link: Arc<SerialLink>,
        sink: LineSink,
        poll_interval: Duration,
    ) -> Result<Self> {
        if !link.is_open() {
            return Err(Error::LinkClosed);
        }
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("firmlink-reader-{}", link.name()))
            .spawn(move || read_loop(&link, &sink, &stop_flag, poll_interval))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still looping.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Request termination and wait for the thread. Idempotent.
    pub fn stop(&mut self) {
        self.stop
            .store(true, Ordering::Release);
        if let Some(handle) = self
            .handle
            .take()
        {
            if handle
                .join()
                .is_err()
            {
                warn!("Reader thread panicked");
            }
        }
    }
}

impl Drop for AsyncReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(link: &SerialLink, sink: &LineSink, stop: &AtomicBool, poll_interval: Duration) {
    debug!("Reader started on {}", link.name());
    while !stop.load(Ordering::Acquire) {
        match link.read_line() {
            Ok(Some(line)) if !line.is_empty() => sink(ReaderEvent::Line(line)),
            Ok(Some(_)) => {},
            Ok(None) => thread::sleep(poll_interval),
            Err(e) => {
                if !matches!(e, Error::LinkClosed) {
                    warn!("Reader on {} stopped: {e}", link.name());
                }
                sink(ReaderEvent::Closed {
                    reason: e.to_string(),
                });
                break;
            },
        }
    }
    debug!("Reader stopped on {}", link.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use std::sync::mpsc;
    use std::time::Instant;

    fn setup() -> (MockPort, Arc<SerialLink>) {
        let device = MockPort::new("MOCK0");
        let link = Arc::new(SerialLink::from_port(Box::new(device.clone())).unwrap());
        (device, link)
    }

    #[test]
    fn test_lines_reach_sink_in_order() {
        let (device, link) = setup();
        let (tx, rx) = mpsc::channel();
        let mut reader =
            AsyncReader::spawn_with_interval(link, channel_sink(tx), Duration::from_millis(5)).unwrap();

        device.push_line("=== VishnuFirm ===");
        device.push_line("");
        device.push_line("Version: 1.0.0");

        let timeout = Duration::from_secs(2);
        assert_eq!(
            rx.recv_timeout(timeout).unwrap(),
            ReaderEvent::Line("=== VishnuFirm ===".into())
        );
        assert_eq!(
            rx.recv_timeout(timeout).unwrap(),
            ReaderEvent::Line("Version: 1.0.0".into())
        );
        reader.stop();
        assert!(!reader.is_running());
    }

    #[test]
    fn test_stop_is_bounded_and_idempotent() {
        let (_device, link) = setup();
        let mut reader = AsyncReader::spawn_with_interval(
            link,
            Arc::new(|_| {}),
            Duration::from_millis(10),
        )
        .unwrap();

        let started = Instant::now();
        reader.stop();
        // poll interval + mock read timeout, with slack for CI schedulers
        assert!(started.elapsed() < Duration::from_millis(500));
        reader.stop();
    }

    #[test]
    fn test_closing_link_ends_reader() {
        let (_device, link) = setup();
        let (tx, rx) = mpsc::channel();
        let reader = AsyncReader::spawn_with_interval(
            Arc::clone(&link),
            channel_sink(tx),
            Duration::from_millis(5),
        )
        .unwrap();

        link.close();
        match rx
            .recv_timeout(Duration::from_secs(2))
            .unwrap()
        {
            ReaderEvent::Closed { reason } => assert!(reason.contains("closed")),
            other => panic!("unexpected event {other:?}"),
        }
        drop(reader);
    }

    #[test]
    fn test_spawn_on_closed_link_fails() {
        let (_device, link) = setup();
        link.close();
        assert!(matches!(
            AsyncReader::spawn(link, Arc::new(|_| {})),
            Err(Error::LinkClosed)
        ));
    }
}
