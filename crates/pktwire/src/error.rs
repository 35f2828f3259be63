//! Unified error type for pktwire.

use pktwire_protocol::{ProtocolError, RegistrationError};
use pktwire_record::{LayoutError, RecordError};
use pktwire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so `?`
/// converts errors from any layer.
#[derive(Debug, thiserror::Error)]
pub enum PktwireError {
    /// A layout failed to build.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// A field access on a record failed.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A transport-level error (connect, read, write, timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A framing, packet type, or header error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A packet type could not be registered.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The server worker thread could not be spawned.
    #[error("failed to spawn server thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The server worker thread panicked.
    #[error("server thread panicked")]
    ServerPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let pktwire_err: PktwireError = err.into();
        assert!(matches!(pktwire_err, PktwireError::Transport(_)));
        assert!(pktwire_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::PacketType {
            discriminant: 9,
            bytes: vec![0, 5, 9],
        };
        let pktwire_err: PktwireError = err.into();
        assert!(matches!(pktwire_err, PktwireError::Protocol(_)));
        assert!(pktwire_err.to_string().contains("0x9"));
    }

    #[test]
    fn test_from_record_error() {
        let err = RecordError::UnknownField("nope".into());
        let pktwire_err: PktwireError = err.into();
        assert!(matches!(pktwire_err, PktwireError::Record(_)));
    }

    #[test]
    fn test_from_layout_error() {
        let err = LayoutError::Empty("blank".into());
        let pktwire_err: PktwireError = err.into();
        assert!(matches!(pktwire_err, PktwireError::Layout(_)));
    }
}
