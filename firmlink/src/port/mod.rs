//! Port abstraction for serial communication.
//!
//! The `Port` trait hides the concrete transport from the link layer:
//!
//! - **Native platforms** (Linux, macOS, Windows): `NativePort` over the
//!   `serialport` crate
//! - **In-memory**: `MockPort`, a scripted transport for tests and dry runs
//!
//! ```text
//! +----------------------------------------+
//! |  SerialLink (line framing, ownership)  |
//! +-------------------+--------------------+
//!                     |
//!                     v
//! +-------------------+--------------------+
//! |               Port trait               |
//! +---------+-------------------+----------+
//!           |                   |
//!           v                   v
//! +---------+--------+ +--------+---------+
//! |   NativePort     | |    MockPort      |
//! |  (serialport)    | |   (in-memory)    |
//! +------------------+ +------------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use firmlink::port::Port;
//!
//! fn example<P: Port>(port: &mut P) -> std::io::Result<()> {
//!     port.write_all(b"13:ON\n")?;
//!
//!     let mut buf = [0u8; 32];
//!     let n = port.read(&mut buf)?;
//!     println!("Received: {:?}", &buf[..n]);
//!
//!     Ok(())
//! }
//! ```

pub mod mock;
#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Default baud rate of the line protocol firmware.
pub const DEFAULT_BAUD: u32 = 9600;

/// Baud rate used by StandardFirmata when reporting its boot block.
pub const BOOT_CHECK_BAUD: u32 = 57600;

/// Default per-read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Unified port trait for serial communication.
///
/// A read that finds no data within the configured timeout must fail with
/// `io::ErrorKind::TimedOut` (or return `Ok(0)`), never block indefinitely.
pub trait Port: Read + Write + Send {
    /// Get the current timeout.
    fn timeout(&self) -> Duration;

    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Open a second handle onto the same transport for a dedicated reader.
    fn try_clone_port(&self) -> Result<Box<dyn Port>>;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;
}
