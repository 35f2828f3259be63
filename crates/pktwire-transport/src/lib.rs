//! Transport abstraction layer for pktwire.
//!
//! Provides the [`Transport`] trait: a blocking byte pipe with a timeout on
//! every read. Implementations:
//!
//! - [`Loopback`]: in-memory; a single instance echoes its own writes, a
//!   [`Loopback::pair`] links two ends.
//! - [`SocketTransport`]: UDP peer, TCP server, or TCP client.
//! - [`SerialTransport`]: a named serial port (feature `serial`).
//!
//! [`TransportConfig`] describes any of them as data and opens it.
//!
//! # Feature Flags
//!
//! - `serial` (default): serial ports via `serialport`

mod config;
mod error;
mod loopback;
mod registry;
#[cfg(feature = "serial")]
mod serial;
mod socket;

pub use config::{SerialConfig, SocketConfig, TransportConfig};
pub use error::TransportError;
pub use loopback::Loopback;
#[cfg(feature = "serial")]
pub use serial::{SerialTransport, open_ports};
pub use socket::{SocketMode, SocketTransport, open_sockets};

use std::time::Duration;

/// A blocking, timeout-bounded byte transport.
///
/// Every `read` either returns exactly the requested number of bytes or
/// fails once the timeout elapses. A timed-out transport flushes (or closes)
/// itself so the next packet starts on a clean boundary.
pub trait Transport: Send {
    /// Opens a session. For a TCP server this waits for the next client, up
    /// to the timeout.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Waits for the next client. Only valid on a TCP server.
    fn accept(&mut self) -> Result<(), TransportError> {
        Err(TransportError::InvalidOperation(
            "accept is only valid on a TCP server".to_string(),
        ))
    }

    /// Reads exactly `n` bytes.
    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError>;

    /// Writes all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Discards buffered inbound bytes and, if `reset_tx`, any outbound
    /// bytes not yet sent.
    fn flush(&mut self, reset_tx: bool) -> Result<(), TransportError>;

    /// Ends the session. Closing a closed transport is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn accept(&mut self) -> Result<(), TransportError> {
        (**self).accept()
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn flush(&mut self, reset_tx: bool) -> Result<(), TransportError> {
        (**self).flush(reset_tx)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn accept(&mut self) -> Result<(), TransportError> {
        (**self).accept()
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn flush(&mut self, reset_tx: bool) -> Result<(), TransportError> {
        (**self).flush(reset_tx)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }
}
