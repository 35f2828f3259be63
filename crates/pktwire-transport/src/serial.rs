//! Serial port transport using `serialport`.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serialport::{ClearBuffer, SerialPort};

use crate::registry::{HandleRegistry, HandleSlot, lock, new_slot};
use crate::{SerialConfig, Transport, TransportError};

/// Open serial ports, keyed by port name.
static SERIAL_PORTS: Lazy<HandleRegistry<Box<dyn SerialPort>>> =
    Lazy::new(|| HandleRegistry::new("serial"));

/// Names of every serial port currently owned by a transport.
pub fn open_ports() -> Vec<String> {
    SERIAL_PORTS.keys()
}

/// A serial port [`Transport`].
///
/// At most one transport owns a port name at a time: connecting closes the
/// handle of any other transport holding the same port. A read that times
/// out flushes the port but leaves it open.
pub struct SerialTransport {
    config: SerialConfig,
    slot: HandleSlot<Box<dyn SerialPort>>,
    rx: Vec<u8>,
}

impl SerialTransport {
    /// Creates a closed transport; `connect` opens the port.
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            slot: new_slot(),
            rx: Vec::new(),
        }
    }

    /// Opens `port` at `baud_rate` with the default timeout.
    pub fn open(port: impl Into<String>, baud_rate: u32) -> Result<Self, TransportError> {
        let mut transport = Self::new(SerialConfig::new(port).with_baud_rate(baud_rate));
        transport.connect()?;
        Ok(transport)
    }

    pub fn port_name(&self) -> &str {
        &self.config.port
    }

    pub fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }

    fn not_connected(&self) -> TransportError {
        TransportError::NotConnected(format!("serial port {} is closed", self.config.port))
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        SERIAL_PORTS.claim(&self.config.port, &self.slot);
        let opened = serialport::new(self.config.port.as_str(), self.config.baud_rate)
            .timeout(self.config.timeout)
            .open()
            .and_then(|port| port.clear(ClearBuffer::All).map(|()| port));
        let port = match opened {
            Ok(port) => port,
            Err(e) => {
                SERIAL_PORTS.release(&self.config.port, &self.slot);
                return Err(e.into());
            }
        };
        *lock(&self.slot) = Some(port);
        self.rx.clear();
        tracing::info!(port = %self.config.port, baud = self.config.baud_rate, "serial port opened");
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut chunk = [0u8; 1024];
        loop {
            if self.rx.len() >= n {
                return Ok(self.rx.drain(..n).collect());
            }
            let now = Instant::now();
            if now >= deadline {
                let received = std::mem::take(&mut self.rx);
                self.flush(false)?;
                return Err(TransportError::Timeout {
                    requested: n,
                    received,
                    timeout: self.config.timeout,
                });
            }

            let result = {
                let mut slot = lock(&self.slot);
                let port = slot.as_mut().ok_or_else(|| self.not_connected())?;
                port.set_timeout(deadline - now)?;
                Read::read(port, &mut chunk)
            };
            match result {
                Ok(count) => self.rx.extend_from_slice(&chunk[..count]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(TransportError::ReceiveFailed(e)),
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut slot = lock(&self.slot);
        let port = slot.as_mut().ok_or_else(|| self.not_connected())?;
        Write::write_all(port, data).map_err(TransportError::SendFailed)?;
        Write::flush(port).map_err(TransportError::SendFailed)
    }

    fn flush(&mut self, reset_tx: bool) -> Result<(), TransportError> {
        self.rx.clear();
        if let Some(port) = lock(&self.slot).as_ref() {
            port.clear(ClearBuffer::Input)?;
            if reset_tx {
                port.clear(ClearBuffer::Output)?;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let port = lock(&self.slot).take();
        SERIAL_PORTS.release(&self.config.port, &self.slot);
        self.rx.clear();
        if port.is_some() {
            tracing::info!(port = %self.config.port, "serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.slot).is_some()
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }
}
