//! Line protocol spoken by the pin-control firmware.
//!
//! Host to device:
//!
//! ```text
//! <pin>:ON\n
//! <pin>:OFF\n
//! ```
//!
//! Device to host:
//!
//! - identity and version banners, matched by **exact** line equality
//! - blink markers, matched by **substring** containment of `LED ON` / `LED OFF`
//! - a raw boot block right after the port opens, compared bit for bit
//!
//! Everything here is pure translation; no I/O.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Firmware identity banner.
pub const DEFAULT_FIRMWARE_NAME: &str = "=== VishnuFirm ===";

/// Firmware version banner.
pub const DEFAULT_FIRMWARE_VERSION: &str = "Version: 1.0.0";

/// Substring marking an LED-on toggle.
pub const BLINK_ON_MARKER: &str = "LED ON";

/// Substring marking an LED-off toggle.
pub const BLINK_OFF_MARKER: &str = "LED OFF";

/// StandardFirmata boot report: protocol version 2.5 followed by the SysEx
/// firmware report naming `StandardFirmata.ino`.
pub const STANDARD_FIRMATA_BOOT: &[u8] = &[
    0xF9, 0x02, 0x05, // REPORT_VERSION 2.5
    0xF0, 0x79, 0x02, 0x05, // SysEx REPORT_FIRMWARE 2.5
    b'S', 0x00, b't', 0x00, b'a', 0x00, b'n', 0x00, b'd', 0x00, b'a', 0x00, b'r', 0x00, b'd', 0x00,
    b'F', 0x00, b'i', 0x00, b'r', 0x00, b'm', 0x00, b'a', 0x00, b't', 0x00, b'a', 0x00, b'.', 0x00,
    b'i', 0x00, b'n', 0x00, b'o', 0x00, 0xF7,
];

/// Requested output level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PinState {
    /// Drive high.
    On,
    /// Drive low.
    Off,
}

impl PinState {
    /// Wire keyword for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s
            .trim()
            .to_ascii_uppercase()
            .as_str()
        {
            "ON" | "1" | "HIGH" => Ok(Self::On),
            "OFF" | "0" | "LOW" => Ok(Self::Off),
            other => Err(Error::Config(format!(
                "unknown pin state '{other}', expected ON or OFF"
            ))),
        }
    }
}

/// A single pin command. Build one per send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinCommand {
    /// Target pin.
    pub pin: u8,
    /// Requested state.
    pub state: PinState,
}

impl PinCommand {
    /// Create a command.
    pub fn new(pin: u8, state: PinState) -> Self {
        Self { pin, state }
    }

    /// Encode as a wire line.
    pub fn encode(&self) -> String {
        encode_pin_command(self.pin, self.state)
    }
}

/// Encode a pin command as `"<pin>:<ON|OFF>\n"`.
pub fn encode_pin_command(pin: u8, state: PinState) -> String {
    format!("{pin}:{state}\n")
}

/// The two banners a healthy firmware prints at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banners {
    /// Identity line.
    pub name: String,
    /// Version line.
    pub version: String,
}

impl Default for Banners {
    fn default() -> Self {
        Self {
            name: DEFAULT_FIRMWARE_NAME.to_string(),
            version: DEFAULT_FIRMWARE_VERSION.to_string(),
        }
    }
}

/// Classification of an incoming line during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeToken {
    /// The identity banner.
    Identity,
    /// The version banner.
    Version,
    /// Anything else.
    Other,
}

/// Match a line against the banners by exact equality.
///
/// `line` is expected to be trimmed already (see [`clean_line`]).
pub fn parse_handshake_line(line: &str, banners: &Banners) -> HandshakeToken {
    if line == banners.name {
        HandshakeToken::Identity
    } else if line == banners.version {
        HandshakeToken::Version
    } else {
        HandshakeToken::Other
    }
}

/// Detect a blink marker anywhere in the line.
pub fn parse_blink_marker(line: &str) -> Option<PinState> {
    // "LED OFF" does not contain "LED ON", so the check order is free
    if line.contains(BLINK_OFF_MARKER) {
        Some(PinState::Off)
    } else if line.contains(BLINK_ON_MARKER) {
        Some(PinState::On)
    } else {
        None
    }
}

/// Decode raw received bytes into a trimmed, printable line.
///
/// Invalid UTF-8 bytes and control characters other than tab are dropped,
/// so reset noise in front of a banner does not spoil the exact match.
pub fn clean_line(raw: &[u8]) -> String {
    let filtered: String = raw
        .utf8_chunks()
        .flat_map(|chunk| {
            chunk
                .valid()
                .chars()
        })
        .filter(|ch| *ch == '\t' || !ch.is_control())
        .collect();
    filtered
        .trim()
        .to_string()
}

/// Big-endian bit string of a byte block (`0x05` becomes `"00000101"`).
pub fn decode_boot_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:08b}"))
        .collect()
}

/// Details of a failed boot block comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootMismatch {
    /// Expected length in bits.
    pub expected_bits: usize,
    /// Received length in bits.
    pub received_bits: usize,
    /// Index of the first differing bit, or of the first missing bit for a
    /// truncated read.
    pub first_difference: usize,
    /// Received block as a bit string.
    pub received: String,
}

impl fmt::Display for BootMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received {} bits, expected {}; first difference at bit {} (byte {})",
            self.received_bits,
            self.expected_bits,
            self.first_difference,
            self.first_difference / 8
        )
    }
}

/// Expected boot block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSignature {
    bits: String,
}

impl Default for BootSignature {
    fn default() -> Self {
        Self::from_bytes(STANDARD_FIRMATA_BOOT)
    }
}

impl BootSignature {
    /// Signature from the expected raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bits: decode_boot_bytes(bytes),
        }
    }

    /// Expected bit string.
    pub fn bits(&self) -> &str {
        &self.bits
    }

    /// Expected block length in bytes.
    pub fn byte_len(&self) -> usize {
        self.bits
            .len()
            / 8
    }

    /// Compare a received block. Only exact equality passes.
    pub fn check(&self, received: &[u8]) -> Result<(), BootMismatch> {
        let got = decode_boot_bytes(received);
        if got == self.bits {
            return Ok(());
        }

        let first_difference = got
            .bytes()
            .zip(
                self.bits
                    .bytes(),
            )
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| {
                got.len()
                    .min(
                        self.bits
                            .len(),
                    )
            });

        Err(BootMismatch {
            expected_bits: self
                .bits
                .len(),
            received_bits: got.len(),
            first_difference,
            received: got,
        })
    }
}
