//! Serial transport
//!
//! This module defines the byte transport the session drives, and its
//! implementation on top of the `serialport` crate.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    #[error("Port is closed")]
    Closed,
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// An open, byte-oriented link to a device
///
/// Reads are poll-driven: callers check `bytes_available` and only then
/// call `read_available`, which may still block up to the read timeout.
pub trait Transport: Send {
    /// Number of bytes that can be read without waiting
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read whatever is available now (possibly nothing)
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Write all of `bytes`
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Second handle to the same port, for a dedicated writer
    fn try_clone(&self) -> Result<Box<dyn Transport>>;

    /// Release the port; later calls return `TransportError::Closed`
    fn close(&mut self) -> Result<()>;
}

/// Creates transports on connect
pub trait TransportOpener: Send {
    fn open(&self, port: &str, baud: u32, timeout: Duration) -> Result<Box<dyn Transport>>;
}

/// `serialport`-backed transport
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud).timeout(timeout).open()?;
        Ok(Self { port: Some(port) })
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let port = self.port()?;
        let available = port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; available];
        match port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        let port = self.port.as_ref().ok_or(TransportError::Closed)?;
        Ok(Box::new(SerialTransport {
            port: Some(port.try_clone()?),
        }))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle closes the descriptor
        self.port.take();
        Ok(())
    }
}

/// Opens real serial ports
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialOpener;

impl TransportOpener for SerialOpener {
    fn open(&self, port: &str, baud: u32, timeout: Duration) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(port, baud, timeout)?))
    }
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> Result<Vec<String>> {
    let mut names: Vec<String> = serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialTransport::open("/dev/serterm-does-not-exist", 9600, Duration::from_millis(10));
        assert!(matches!(result, Err(TransportError::Serial(_))));
    }

    #[test]
    fn test_closed_transport_errors() {
        let mut transport = SerialTransport { port: None };
        assert!(matches!(transport.bytes_available(), Err(TransportError::Closed)));
        assert!(matches!(transport.write(b"x"), Err(TransportError::Closed)));
        assert!(transport.try_clone().is_err());
        assert!(transport.close().is_ok());
    }
}
