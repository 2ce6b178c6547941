use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use super::{ConnectionState, Result, SerialError};

pub const BAUD_RATE: u32 = 115200;
const IO_TIMEOUT: Duration = Duration::from_millis(1000);

/// Owns the serial transport handle. Exactly one session holds a
/// `ConnectionManager`; the reader task borrows it through a shared mutex.
pub struct ConnectionManager {
    port: Option<Box<dyn SerialPort>>,
    port_name: Option<String>,
    state: ConnectionState,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            port: None,
            port_name: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Enumerate serial ports a hand controller could be attached to.
    pub fn available_ports() -> Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    /// Open the transport at the fixed protocol baud rate.
    pub fn connect(&mut self, port_name: &str) -> Result<()> {
        if self.port.is_some() {
            return Err(SerialError::AlreadyOpen);
        }

        self.state = ConnectionState::Connecting;
        let port = serialport::new(port_name, BAUD_RATE)
            .timeout(IO_TIMEOUT)
            .open()
            .map_err(|e| {
                self.state = ConnectionState::Disconnected;
                match &e.kind {
                    serialport::ErrorKind::NoDevice => {
                        SerialError::PortUnavailable(port_name.to_string())
                    }
                    serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                        SerialError::PermissionDenied(port_name.to_string())
                    }
                    _ => SerialError::PortUnavailable(format!("{}: {}", port_name, e)),
                }
            })?;

        self.port = Some(port);
        self.port_name = Some(port_name.to_string());
        self.state = ConnectionState::Connected;

        log::info!("Connected to hand controller on {}", port_name);
        Ok(())
    }

    /// Drop the transport handle. Idempotent; after this returns no further
    /// reads are delivered.
    pub fn disconnect(&mut self) {
        if let Some(name) = &self.port_name {
            log::info!("Disconnecting from {}", name);
        }
        self.port = None;
        self.port_name = None;
        self.state = ConnectionState::Disconnected;
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Send one protocol line; the newline terminator is appended here.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        let port = self.port.as_mut().ok_or(SerialError::Disconnected)?;

        let framed = format!("{}\n", line);
        port.write_all(framed.as_bytes()).map_err(map_write_err)?;
        port.flush().map_err(map_write_err)?;
        Ok(())
    }

    /// Non-blocking read of whatever the device has buffered. Returns 0 when
    /// nothing is pending so the reader can keep its polling cadence.
    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port.as_mut().ok_or(SerialError::Disconnected)?;

        match port.bytes_to_read()? {
            0 => Ok(0),
            _ => match port.read(buf) {
                Ok(n) => Ok(n),
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(SerialError::IoError(e)),
            },
        }
    }
}

fn map_write_err(e: std::io::Error) -> SerialError {
    if e.kind() == std::io::ErrorKind::TimedOut {
        SerialError::WriteTimeout
    } else {
        SerialError::IoError(e)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
