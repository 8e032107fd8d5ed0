//! Native serial port implementation using the `serialport` crate.

use {
    crate::{
        error::{Error, Result},
        port::{Port, SerialConfig},
    },
    log::{debug, trace},
    serialport::{DataBits, FlowControl, Parity, StopBits},
    std::{
        io::{Read, Write},
        time::Duration,
    },
};

/// Native serial port implementation.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
    timeout: Duration,
    baud_rate: u32,
}

impl NativePort {
    /// Open a serial port with the given configuration (8N1, no flow control).
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!(
            "Opening {} at {} baud (timeout {:?})",
            config.port_name, config.baud_rate, config.timeout
        );
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|e| Error::Connection {
                port: config
                    .port_name
                    .clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            port: Some(port),
            name: config
                .port_name
                .clone(),
            timeout: config.timeout,
            baud_rate: config.baud_rate,
        })
    }

    fn closed_error() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed")
    }
}

impl Port for NativePort {
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
        let port = self
            .port
            .as_ref()
            .ok_or(Error::LinkClosed)?
            .try_clone()?;
        trace!("Cloned read handle for {}", self.name);
        Ok(Box::new(Self {
            port: Some(port),
            name: self
                .name
                .clone(),
            timeout: self.timeout,
            baud_rate: self.baud_rate,
        }))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle closes the OS descriptor
        self.port
            .take();
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(Self::closed_error)
            .and_then(|p| p.read(buf))
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(Self::closed_error)
            .and_then(|p| p.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port
            .as_mut()
            .ok_or_else(Self::closed_error)
            .and_then(std::io::Write::flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_is_connection_error() {
        let config = SerialConfig::new("/dev/firmlink-does-not-exist", 9600);
        match NativePort::open(&config) {
            Err(Error::Connection { port, .. }) => {
                assert_eq!(port, "/dev/firmlink-does-not-exist");
            },
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("nonexistent port must not open"),
        }
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0", 57600).with_timeout(Duration::from_secs(5));

        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 57600);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(1000));
    }
}
