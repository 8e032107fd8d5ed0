//! # firmlink
//!
//! A library for driving and verifying line-protocol firmware on
//! microcontroller boards over a serial port.
//!
//! This crate provides:
//!
//! - Serial port discovery and classification (wireless / Bluetooth / other)
//! - An owned, line-framed serial link shared safely between threads
//! - The `<pin>:<ON|OFF>` command protocol with pin validation
//! - A background line reader and a cancellable pin toggle scheduler
//! - Firmware verification: boot block, banner handshake, blink timing
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//! - **Mock**: an in-memory port for tests and dry runs, always available
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use firmlink::{BoardLayout, HandshakeVerifier, PinState, SerialConfig, Session, VerifyConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = firmlink::auto_detect_port()?;
//!     let config = SerialConfig::new(&port.name, firmlink::port::DEFAULT_BAUD);
//!     let mut session = Session::open(&config, BoardLayout::uno(), Arc::new(|_| {}))?;
//!
//!     session.send(13, PinState::On)?;
//!
//!     let mut verifier = HandshakeVerifier::new(VerifyConfig::default())?;
//!     let report = session.verify(&mut verifier)?;
//!     println!("{:?}", report.blink);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod board;
pub mod device;
pub mod error;
pub mod host;
pub mod link;
pub mod port;
pub mod protocol;
pub mod reader;
pub mod scheduler;
pub mod session;
pub mod verify;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker polled by verification loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications). Only the first
/// registration takes effect.
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

#[cfg(feature = "native")]
pub use port::native::NativePort;
pub use {
    board::BoardLayout,
    device::{Category, ClassifiedPorts, PortDescriptor},
    error::{Error, Result},
    host::{auto_detect_port, discover_ports},
    link::SerialLink,
    port::{Port, SerialConfig, mock::MockPort},
    protocol::{Banners, BootMismatch, BootSignature, PinCommand, PinState},
    reader::{AsyncReader, LineSink, ReaderEvent},
    scheduler::{DutyCycle, ToggleEvent, ToggleScheduler, ToggleSink},
    session::Session,
    verify::{
        BlinkReport, BootOutcome, BootPolicy, HandshakeState, HandshakeVerifier,
        VerificationReport, VerifyConfig,
    },
};
