//! In-memory transport.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::registry::lock;
use crate::{Transport, TransportError};

/// Default read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// One direction of a loopback link.
#[derive(Debug, Default)]
struct Pipe {
    bytes: Mutex<VecDeque<u8>>,
    ready: Condvar,
}

/// An in-memory transport.
///
/// [`Loopback::new`] reads back its own writes. [`Loopback::pair`] returns
/// two ends where each end's writes are the other end's reads; reads block
/// until enough bytes arrive or the timeout elapses, so one end can be
/// served from another thread.
#[derive(Debug)]
pub struct Loopback {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    connected: bool,
    timeout: Duration,
}

impl Loopback {
    pub fn new() -> Self {
        let pipe = Arc::new(Pipe::default());
        Self {
            rx: Arc::clone(&pipe),
            tx: pipe,
            connected: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn pair() -> (Self, Self) {
        let a = Arc::new(Pipe::default());
        let b = Arc::new(Pipe::default());
        let left = Self {
            rx: Arc::clone(&a),
            tx: Arc::clone(&b),
            connected: true,
            timeout: DEFAULT_TIMEOUT,
        };
        let right = Self {
            rx: b,
            tx: a,
            connected: true,
            timeout: DEFAULT_TIMEOUT,
        };
        (left, right)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of bytes waiting to be read.
    pub fn pending(&self) -> usize {
        lock(&self.rx.bytes).len()
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::NotConnected("loopback is closed".to_string()))
        }
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for Loopback {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        self.ensure_connected()?;
        let guard = lock(&self.rx.bytes);
        let (mut bytes, _) = self
            .rx
            .ready
            .wait_timeout_while(guard, self.timeout, |bytes| bytes.len() < n)
            .unwrap_or_else(PoisonError::into_inner);

        if bytes.len() >= n {
            return Ok(bytes.drain(..n).collect());
        }

        let received: Vec<u8> = bytes.drain(..).collect();
        drop(bytes);
        tracing::trace!(requested = n, received = received.len(), "loopback read timed out");
        Err(TransportError::Timeout {
            requested: n,
            received,
            timeout: self.timeout,
        })
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.ensure_connected()?;
        lock(&self.tx.bytes).extend(data.iter().copied());
        self.tx.ready.notify_all();
        Ok(())
    }

    /// Nothing is buffered on the way out, so `reset_tx` has no effect.
    fn flush(&mut self, _reset_tx: bool) -> Result<(), TransportError> {
        lock(&self.rx.bytes).clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}
