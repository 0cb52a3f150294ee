//! Byte transport abstraction over the serial link.
//!
//! The protocol engine only consumes the [`Transport`] trait; the production
//! implementation is [`SerialTransport`] on top of the `serialport` crate.
//! Reads are timeout-bounded rather than blocking: the engine polls from a
//! cooperative pump loop, so `read_byte` must return quickly with
//! [`TransportError::Timeout`] when no byte is waiting.

use std::io::{Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::SerialPort;
use thiserror::Error;

/// Read timeout for a single byte. Short on purpose: the pump loop calls
/// `read_byte` up to its byte budget per tick and must not stall the caller.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Errors from the byte transport.
///
/// `Timeout` is not a failure: it means "no data right now" and ends the
/// current pump early. Everything else is fatal for the connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no data available within the read timeout")]
    Timeout,
    #[error("transport is not open")]
    NotOpen,
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True for the transient no-data-now case.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// A byte-oriented, timeout-bounded serial connection.
///
/// Exactly one protocol engine may read a given transport; the engine owns it.
pub trait Transport: Send {
    fn open(&mut self) -> Result<(), TransportError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    /// Read one byte, failing with [`TransportError::Timeout`] when none is
    /// available within a short bound.
    fn read_byte(&mut self) -> Result<u8, TransportError>;
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Serial port transport for a board running Firmata firmware.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Stock Firmata sketches communicate at 57600 baud.
    pub fn new(port_name: &str, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            port: None,
        }
    }

    /// Names of all serial ports visible on this system.
    pub fn list_ports() -> Result<Vec<String>, TransportError> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    /// Best guess at which serial port has a board on it: prefer USB-serial
    /// style device names, fall back to the first port found.
    pub fn guess_port() -> Option<String> {
        let names = Self::list_ports().ok()?;
        names
            .iter()
            .find(|n| n.contains("ttyUSB") || n.contains("ttyACM") || n.contains("tty.usb"))
            .or_else(|| names.first())
            .cloned()
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        info!(
            "Opening serial port {} at {} baud",
            self.port_name, self.baud_rate
        );
        let mut builder =
            serialport::new(self.port_name.as_str(), self.baud_rate).timeout(READ_TIMEOUT);
        // Some USB serial adapters need explicit settings
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }
        let mut port = builder.open()?;
        // Assert DTR/RTS so boards that gate their reset line on it wake up
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed serial port {}", self.port_name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        // Polling bytes_to_read first keeps the common empty case cheap; the
        // blocking read below only runs when data is already waiting.
        if port.bytes_to_read()? == 0 {
            return Err(TransportError::Timeout);
        }
        let mut buf = [0u8; 1];
        match port.read_exact(&mut buf) {
            Ok(()) => Ok(buf[0]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(TransportError::Timeout),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        port.write_all(bytes)?;
        Ok(())
    }
}
