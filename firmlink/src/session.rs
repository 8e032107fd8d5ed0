//! One device, one link, one reader.
//!
//! A `Session` owns the only [`SerialLink`] to a device together with the
//! background [`AsyncReader`] and the [`ToggleScheduler`] that share it. It
//! also sequences anything that needs the input stream to itself: while
//! [`Session::verify`] or [`Session::probe`] runs the reader is detached, and
//! it is reattached with the same sink afterwards, whatever the outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::board::BoardLayout;
use crate::error::{Error, Result};
use crate::link::SerialLink;
use crate::port::SerialConfig;
use crate::protocol::{PinCommand, PinState};
use crate::reader::{AsyncReader, LineSink};
use crate::scheduler::{ToggleScheduler, ToggleSink};
use crate::verify::{HandshakeVerifier, VerificationReport};

/// Line sent by [`Session::probe`] when no other message is given.
pub const PROBE_MESSAGE: &str = "Hello Device";

/// Owner of a connected device.
pub struct Session {
    link: Arc<SerialLink>,
    layout: BoardLayout,
    scheduler: ToggleScheduler,
    reader: Option<AsyncReader>,
    sink: Option<LineSink>,
}

impl Session {
    /// Open the port described by `config`.
    pub fn open(config: &SerialConfig, layout: BoardLayout, toggle_sink: ToggleSink) -> Result<Self> {
        Ok(Self::from_link(SerialLink::open(config)?, layout, toggle_sink))
    }

    /// Take over an open link.
    pub fn from_link(link: SerialLink, layout: BoardLayout, toggle_sink: ToggleSink) -> Self {
        let link = Arc::new(link);
        let scheduler = ToggleScheduler::new(Arc::clone(&link), layout.clone(), toggle_sink);
        Self {
            link,
            layout,
            scheduler,
            reader: None,
            sink: None,
        }
    }

    /// The underlying link.
    pub fn link(&self) -> &SerialLink {
        &self.link
    }

    /// Start delivering device output to `sink`, replacing any previous
    /// reader.
    pub fn attach_reader(&mut self, sink: LineSink) -> Result<()> {
        self.detach_reader();
        self.reader = Some(AsyncReader::spawn(Arc::clone(&self.link), Arc::clone(&sink))?);
        self.sink = Some(sink);
        Ok(())
    }

    /// Stop the background reader. The sink is kept for reattachment.
    pub fn detach_reader(&mut self) {
        if let Some(mut reader) = self
            .reader
            .take()
        {
            reader.stop();
        }
    }

    /// Whether a background reader is running.
    pub fn has_reader(&self) -> bool {
        self.reader
            .as_ref()
            .is_some_and(AsyncReader::is_running)
    }

    /// Send one pin command. Invalid pins are rejected before any write.
    pub fn send(&self, pin: u8, state: PinState) -> Result<()> {
        let command = PinCommand::new(
            self.layout
                .validate(pin)?,
            state,
        );
        self.link
            .write_line(&command.encode())?;
        debug!("Pin {} set {}", command.pin, command.state);
        Ok(())
    }

    /// Start toggling `pin`; any running toggle is stopped first.
    pub fn start_toggle(&mut self, pin: u8, on: Duration, off: Duration) -> Result<()> {
        self.scheduler
            .start(pin, on, off)
    }

    /// Stop the toggle job, if any.
    pub fn stop_toggle(&mut self) {
        self.scheduler
            .stop();
    }

    /// Toggle scheduler, for status queries.
    pub fn scheduler(&self) -> &ToggleScheduler {
        &self.scheduler
    }

    /// Send `message` and return the first non-empty reply within `wait`.
    pub fn probe(&mut self, message: &str, wait: Duration) -> Result<Option<String>> {
        self.with_exclusive_input(|link| {
            link.write_line(message)?;
            let deadline = Instant::now() + wait;
            while Instant::now() < deadline {
                if let Some(line) = link.read_line()? {
                    if !line.is_empty() {
                        return Ok(Some(line));
                    }
                }
            }
            Ok(None)
        })
    }

    /// Run `verifier` with exclusive access to device input.
    pub fn verify(&mut self, verifier: &mut HandshakeVerifier) -> Result<VerificationReport> {
        self.with_exclusive_input(|link| verifier.run(link))
    }

    /// Stop everything and close the link. Idempotent.
    pub fn close(&mut self) {
        self.scheduler
            .stop();
        self.detach_reader();
        self.sink = None;
        self.link
            .close();
    }

    fn with_exclusive_input<T>(&mut self, f: impl FnOnce(&SerialLink) -> Result<T>) -> Result<T> {
        if !self
            .link
            .is_open()
        {
            return Err(Error::LinkClosed);
        }
        let reattach = self.has_reader();
        self.detach_reader();

        let result = f(&self.link);

        if reattach && self.link.is_open() {
            if let Some(sink) = self
                .sink
                .clone()
            {
                self.reader = Some(AsyncReader::spawn(Arc::clone(&self.link), sink)?);
                info!("Reader reattached on {}", self.link.name());
            }
        }
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
