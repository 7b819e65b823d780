//! Serial transport and the seams the session uses to reach it.
//!
//! The protocol needs very little from the port: a non-blocking single-byte
//! read and a best-effort write. [`Transport`] captures exactly that, and
//! [`Connector`] captures "open a port by name at a baud rate" so sessions
//! can be driven against scripted transports in tests.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use thiserror::Error;
use tracing::{trace, warn};

/// Transport-level failures. These are the only errors that justify a
/// reconnect; everything parse-related stays local to the frame attempt.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The port could not be opened.
    #[error("failed to open {port}: {source}")]
    Open {
        /// Port name as given to the connector.
        port: String,
        /// Underlying serial error.
        source: serialport::Error,
    },

    /// A write did not complete.
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// A byte-oriented channel to the slave.
pub trait Transport {
    /// Take one byte if the receive buffer holds any; never blocks.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write `bytes` to the channel.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Opens [`Transport`]s by port name and baud rate.
pub trait Connector {
    /// Transport type this connector produces.
    type Port: Transport;

    /// Open `port_name` at `baud`.
    fn open(&mut self, port_name: &str, baud: u32) -> Result<Self::Port, TransportError>;
}

/// [`Connector`] backed by real serial ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Port = SerialTransport;

    fn open(&mut self, port_name: &str, baud: u32) -> Result<SerialTransport, TransportError> {
        SerialTransport::open(port_name, baud)
    }
}

/// A serial port speaking the transport contract.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `port_name` at `baud`.
    ///
    /// The driver timeout is kept at a token 1 ms; reads first check the
    /// receive buffer so they return immediately when it is empty.
    pub fn open(port_name: &str, baud: u32) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, baud)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|source| TransportError::Open {
                port: port_name.to_string(),
                source,
            })?;
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read_byte(&mut self) -> Option<u8> {
        match self.port.bytes_to_read() {
            Ok(0) => None,
            Ok(_) => {
                let mut buf = [0u8; 1];
                match self.port.read_exact(&mut buf) {
                    Ok(()) => Some(buf[0]),
                    Err(err) => {
                        trace!("serial read error: {}", err);
                        None
                    }
                }
            }
            Err(err) => {
                trace!("serial buffer query error: {}", err);
                None
            }
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        Ok(())
    }
}

/// Names of the serial ports present on this machine.
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(err) => {
            warn!("port enumeration failed: {}", err);
            Vec::new()
        }
    }
}
