//! Transport configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Loopback, SocketTransport, Transport, TransportError};

// ---------------------------------------------------------------------------
// SocketConfig
// ---------------------------------------------------------------------------

/// Addresses and timeout for a [`SocketTransport`].
///
/// The mode follows from which addresses are set:
///
/// | `target` | `host` | mode       |
/// |----------|--------|------------|
/// | set      | set    | UDP peer   |
/// | unset    | set    | TCP server |
/// | set      | unset  | TCP client |
/// | unset    | unset  | invalid    |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Remote address (`"host:port"`) to connect or send to.
    pub target: Option<String>,

    /// Local address to bind.
    pub host: Option<String>,

    /// Read and accept timeout.
    pub timeout: Duration,
}

impl SocketConfig {
    pub fn client(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn server(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    pub fn udp(host: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            host: Some(host.into()),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            target: None,
            host: None,
            timeout: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// SerialConfig
// ---------------------------------------------------------------------------

/// Port name, baud rate, and timeout for a serial transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_serial_timeout")]
    pub timeout: Duration,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_serial_timeout() -> Duration {
    Duration::from_secs(1)
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            timeout: default_serial_timeout(),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

fn default_loopback_timeout() -> Duration {
    crate::loopback::DEFAULT_TIMEOUT
}

/// Any transport, described as data.
///
/// ```json
/// { "kind": "socket", "host": "0.0.0.0:5025", "timeout": { "secs": 2, "nanos": 0 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    Loopback {
        #[serde(default = "default_loopback_timeout")]
        timeout: Duration,
    },
    Serial(SerialConfig),
    Socket(SocketConfig),
}

impl TransportConfig {
    /// Creates the transport. Sockets in TCP server mode are bound here;
    /// other sessions are opened by `connect`.
    pub fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
        match self {
            Self::Loopback { timeout } => Ok(Box::new(Loopback::new().with_timeout(*timeout))),
            Self::Socket(config) => Ok(Box::new(SocketTransport::new(config.clone())?)),
            #[cfg(feature = "serial")]
            Self::Serial(config) => Ok(Box::new(crate::SerialTransport::new(config.clone()))),
            #[cfg(not(feature = "serial"))]
            Self::Serial(config) => Err(TransportError::InvalidOperation(format!(
                "serial port {} requested but the `serial` feature is disabled",
                config.port
            ))),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Loopback {
            timeout: default_loopback_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_config_default() {
        let config = SocketConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert!(config.target.is_none());
        assert!(config.host.is_none());
    }

    #[test]
    fn test_serial_config_fills_defaults() {
        let config: SerialConfig = serde_json::from_str(r#"{"port": "/dev/ttyUSB0"}"#).unwrap();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_transport_config_is_tagged_by_kind() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"kind": "socket", "host": "127.0.0.1:0"}"#).unwrap();
        assert_eq!(
            config,
            TransportConfig::Socket(SocketConfig::server("127.0.0.1:0"))
        );

        let config: TransportConfig = serde_json::from_str(r#"{"kind": "loopback"}"#).unwrap();
        assert_eq!(config, TransportConfig::default());
    }

    #[test]
    fn test_open_loopback_echoes() {
        let mut transport = TransportConfig::default().open().unwrap();
        transport.write(&[1, 2]).unwrap();
        assert_eq!(transport.read(2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_open_rejects_socket_without_addresses() {
        let config = TransportConfig::Socket(SocketConfig::default());
        assert!(matches!(config.open(), Err(TransportError::InvalidOperation(_))));
    }
}
