//! Device discovery and classification utilities.
//!
//! Ports are enumerated fresh on every call, since devices come and go, and
//! sorted into three buckets by keywords in their description:
//!
//! | Category  | Keywords (case-sensitive)                 |
//! |-----------|-------------------------------------------|
//! | Wireless  | `WiFi`, `ESP`, `Silicon Labs`, `CH340`    |
//! | Bluetooth | `Bluetooth`                               |
//! | Other     | everything else                           |

use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

use log::debug;
#[cfg(feature = "native")]
use log::trace;

/// Keywords that mark a wireless-capable board or its USB bridge.
pub const WIRELESS_KEYWORDS: &[&str] = &["WiFi", "ESP", "Silicon Labs", "CH340"];

/// Keywords that mark a Bluetooth serial endpoint.
pub const BLUETOOTH_KEYWORDS: &[&str] = &["Bluetooth"];

/// Port category derived from the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// WiFi boards and the bridges they ship with.
    Wireless,
    /// Bluetooth SPP endpoints.
    Bluetooth,
    /// Anything else.
    Other,
}

impl Category {
    /// Classify a port label. Wireless keywords win over Bluetooth.
    pub fn from_label(label: &str) -> Self {
        if WIRELESS_KEYWORDS
            .iter()
            .any(|k| label.contains(k))
        {
            Self::Wireless
        } else if BLUETOOTH_KEYWORDS
            .iter()
            .any(|k| label.contains(k))
        {
            Self::Bluetooth
        } else {
            Self::Other
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Wireless => "WiFi",
            Self::Bluetooth => "Bluetooth",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Known USB-to-UART bridge chips, used when the OS reports no product string.
const KNOWN_BRIDGES: &[(u16, &[u16], &str)] = &[
    (0x1A86, &[0x7523, 0x7522, 0x5523], "USB-SERIAL CH340"),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71], "Silicon Labs CP210x USB to UART Bridge"),
    (0x0403, &[0x6001, 0x6010, 0x6014, 0x6015], "FTDI USB Serial Converter"),
    (0x067B, &[0x2303, 0x23A3], "Prolific PL2303 USB-to-Serial"),
    (0x2341, &[], "Arduino"),
];

/// Bridge description for a VID/PID pair, if known.
pub fn bridge_name(vid: u16, pid: u16) -> Option<&'static str> {
    KNOWN_BRIDGES
        .iter()
        .find(|(known_vid, pids, _)| vid == *known_vid && (pids.is_empty() || pids.contains(&pid)))
        .map(|(_, _, name)| *name)
}

/// One enumerated serial endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortDescriptor {
    /// OS device identifier (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
    /// Derived category.
    pub category: Category,
}

impl PortDescriptor {
    /// Build a descriptor and derive its category.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut port = Self {
            name: name.into(),
            description: description.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            serial_number: None,
            category: Category::Other,
        };
        port.category = Category::from_label(&port.label());
        port
    }

    /// Attach USB metadata, re-deriving the category.
    #[must_use]
    pub fn with_usb(
        mut self,
        vid: u16,
        pid: u16,
        manufacturer: Option<String>,
        serial_number: Option<String>,
    ) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self.manufacturer = manufacturer;
        self.serial_number = serial_number;
        self.category = Category::from_label(&self.label());
        self
    }

    /// `"<name> - <description>"`, the text classification runs on.
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.description)
    }
}

/// Format a VID/PID pair as `1A86:7523`, or `N/A`.
pub fn format_vid_pid(vid: Option<u16>, pid: Option<u16>) -> String {
    match (vid, pid) {
        (Some(vid), Some(pid)) => format!("{vid:04X}:{pid:04X}"),
        _ => "N/A".to_string(),
    }
}

/// Ports partitioned by category, each in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedPorts {
    /// Wireless candidates.
    pub wireless: Vec<PortDescriptor>,
    /// Bluetooth candidates.
    pub bluetooth: Vec<PortDescriptor>,
    /// Everything else.
    pub other: Vec<PortDescriptor>,
}

impl ClassifiedPorts {
    /// Whether no port was found at all.
    pub fn is_empty(&self) -> bool {
        self.wireless
            .is_empty()
            && self
                .bluetooth
                .is_empty()
            && self
                .other
                .is_empty()
    }

    /// Total number of ports.
    pub fn len(&self) -> usize {
        self.wireless
            .len()
            + self
                .bluetooth
                .len()
            + self
                .other
                .len()
    }

    /// Display order: wireless, then bluetooth, then other.
    pub fn all(&self) -> Vec<PortDescriptor> {
        self.wireless
            .iter()
            .chain(&self.bluetooth)
            .chain(&self.other)
            .cloned()
            .collect()
    }

    /// Resolve a typed selection. Empty or absent input picks the default.
    pub fn resolve_choice(&self, choice: Option<&str>) -> Result<PortDescriptor> {
        let choice = choice
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let Some(choice) = choice else {
            return select_default(self);
        };

        let index: usize = choice
            .parse()
            .map_err(|_| Error::Config(format!("invalid port index '{choice}'")))?;
        self.all()
            .into_iter()
            .nth(index)
            .ok_or_else(|| {
                Error::Config(format!(
                    "port index {index} out of range (0-{})",
                    self.len()
                        .saturating_sub(1)
                ))
            })
    }
}

/// Partition ports by category, preserving order within each bucket.
pub fn classify(ports: impl IntoIterator<Item = PortDescriptor>) -> ClassifiedPorts {
    let mut classified = ClassifiedPorts::default();
    for port in ports {
        match port.category {
            Category::Wireless => classified
                .wireless
                .push(port),
            Category::Bluetooth => classified
                .bluetooth
                .push(port),
            Category::Other => classified
                .other
                .push(port),
        }
    }
    classified
}

/// First wireless, else first bluetooth, else first other port.
pub fn select_default(ports: &ClassifiedPorts) -> Result<PortDescriptor> {
    let (port, why) = if let Some(port) = ports
        .wireless
        .first()
    {
        (port, "default WiFi device")
    } else if let Some(port) = ports
        .bluetooth
        .first()
    {
        (port, "no WiFi device found, default Bluetooth device")
    } else if let Some(port) = ports
        .other
        .first()
    {
        (port, "no preferred device found, first available port")
    } else {
        return Err(Error::NoDeviceFound);
    };

    debug!("Selected {}: {}", why, port.name);
    Ok(port.clone())
}

/// Wait up to `timeout` for a line of user input on `rx`.
///
/// Returns `None` when the deadline passes or the sender hangs up, in which
/// case callers fall back to [`select_default`].
pub fn await_choice(rx: &Receiver<String>, timeout: Duration) -> Option<String> {
    await_choice_with_countdown(rx, timeout, |_| {})
}

/// Like [`await_choice`], calling `tick` with the whole seconds left once
/// per second, starting immediately.
pub fn await_choice_with_countdown(
    rx: &Receiver<String>,
    timeout: Duration,
    mut tick: impl FnMut(u64),
) -> Option<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        let mut secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs += 1;
        }
        tick(secs);
        match rx.recv_timeout(remaining.min(Duration::from_secs(1))) {
            Ok(choice) => return Some(choice),
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

/// Enumerate all serial ports known to the OS.
#[cfg(feature = "native")]
pub fn enumerate() -> Vec<PortDescriptor> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|port_info| match port_info.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let description = usb
                        .product
                        .clone()
                        .or_else(|| bridge_name(usb.vid, usb.pid).map(str::to_string))
                        .unwrap_or_else(|| "n/a".to_string());
                    trace!(
                        "Found USB port: {} ({}, VID:PID {:04X}:{:04X})",
                        port_info.port_name, description, usb.vid, usb.pid
                    );
                    PortDescriptor::new(port_info.port_name, description).with_usb(
                        usb.vid,
                        usb.pid,
                        usb.manufacturer,
                        usb.serial_number,
                    )
                },
                serialport::SerialPortType::BluetoothPort => {
                    PortDescriptor::new(port_info.port_name, "Bluetooth serial port")
                },
                serialport::SerialPortType::PciPort => {
                    PortDescriptor::new(port_info.port_name, "PCI serial port")
                },
                serialport::SerialPortType::Unknown => PortDescriptor::new(port_info.port_name, "n/a"),
            })
            .collect(),
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            Vec::new()
        },
    }
}

/// Enumerate all serial ports (no native backend: always empty).
#[cfg(not(feature = "native"))]
pub fn enumerate() -> Vec<PortDescriptor> {
    Vec::new()
}

/// Format classified ports for display, one entry per port, indexed in
/// display order.
pub fn format_port_list(ports: &ClassifiedPorts) -> Vec<String> {
    ports
        .all()
        .iter()
        .enumerate()
        .map(|(index, port)| {
            format!(
                "[{index}] {} - {} ({})\n     VID:PID         = {}\n     Manufacturer    = {}\n     Serial Number   = {}",
                port.name,
                port.description,
                port.category,
                format_vid_pid(port.vid, port.pid),
                port.manufacturer
                    .as_deref()
                    .unwrap_or("N/A"),
                port.serial_number
                    .as_deref()
                    .unwrap_or("N/A"),
            )
        })
        .collect()
}
