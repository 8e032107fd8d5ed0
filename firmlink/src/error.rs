//! Error types for firmlink.

use std::io;
use thiserror::Error;

use crate::protocol::BootMismatch;

/// Result type for firmlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for firmlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error outside of a specific link operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error reported by the OS layer.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No serial port matched any category.
    #[error("No serial devices found")]
    NoDeviceFound,

    /// The transport could not be opened (busy, permission denied, missing).
    #[error("Failed to open {port}: {reason}")]
    Connection {
        /// Port identifier that failed to open.
        port: String,
        /// Transport-level reason.
        reason: String,
    },

    /// Operation attempted on a closed or never-opened link.
    #[error("Serial link is closed")]
    LinkClosed,

    /// Transport failure while writing a line.
    #[error("Write to {port} failed: {source}")]
    Write {
        /// Port identifier the write was addressed to.
        port: String,
        /// Underlying transport error.
        #[source]
        source: io::Error,
    },

    /// Pin outside the board's digital and analog ranges.
    #[error("Invalid pin {pin}: expected {allowed}")]
    InvalidPin {
        /// Rejected pin number.
        pin: u8,
        /// Human-readable description of the accepted ranges.
        allowed: String,
    },

    /// Non-positive or non-finite toggle duration.
    #[error("Invalid {which} duration: {value}s (must be positive and finite)")]
    InvalidDuration {
        /// Which half of the duty cycle was rejected (`on` or `off`).
        which: &'static str,
        /// Rejected value in seconds.
        value: f64,
    },

    /// Handshake banners not observed before the deadline.
    #[error("Firmware handshake failed: {}", missing.join(", "))]
    ProtocolMismatch {
        /// One entry per banner that was never seen.
        missing: Vec<String>,
    },

    /// Boot byte block differs from the expected signature.
    #[error("Boot sequence mismatch: {0}")]
    BootMismatch(BootMismatch),

    /// A verifier deadline elapsed.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The embedding application requested a stop.
    #[error("Interrupted by user")]
    Interrupted,

    /// Invalid caller configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}
