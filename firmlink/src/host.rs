//! Host-side utilities for serial port discovery.

use crate::device::{self, ClassifiedPorts, PortDescriptor};

/// Enumerate and classify all available serial ports.
#[must_use]
pub fn discover_ports() -> ClassifiedPorts {
    device::classify(device::enumerate())
}

/// Auto-detect the single best serial port candidate.
pub fn auto_detect_port() -> crate::Result<PortDescriptor> {
    device::select_default(&discover_ports())
}
