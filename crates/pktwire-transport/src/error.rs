use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A read (or a TCP accept) didn't complete before the timeout. The
    /// transport has already flushed or closed itself.
    #[error("timed out after {timeout:?} waiting for {requested} bytes; received {received:02x?}")]
    Timeout {
        requested: usize,
        received: Vec<u8>,
        timeout: Duration,
    },

    /// There is no active session to read from or write to.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// The operation isn't valid for this transport's mode.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The peer closed the connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Opening a session failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The serial port driver reported an error.
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
