//! Error types for the protocol layer.
//!
//! Registration problems are configuration mistakes and surface once, when
//! a family is set up. Framing problems surface per packet, and by the time
//! a caller sees one the transport has already been flushed so the next
//! read starts on a clean boundary.

use pktwire_record::RecordError;
use pktwire_transport::TransportError;

/// Errors raised while registering packet types with a family.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The tag set has no entry named after the packet type.
    #[error("no discriminant for packet type `{packet}` in family `{family}`")]
    MissingDiscriminant { family: String, packet: String },

    /// Two different packet types map to the same discriminant.
    #[error(
        "discriminant {discriminant:#x} in family `{family}` already maps to `{existing}`, cannot register `{packet}`"
    )]
    DuplicateDiscriminant {
        family: String,
        discriminant: u64,
        existing: String,
        packet: String,
    },

    /// A packet type name is already registered with a different
    /// discriminant or layout.
    #[error("packet type `{packet}` is already registered in family `{family}`")]
    DuplicateName { family: String, packet: String },

    /// The packet type doesn't begin with the family's base header.
    #[error("packet type `{packet}` does not start with the base header of family `{family}`")]
    HeaderMismatch { family: String, packet: String },

    /// The family's base header has variable-length fields, so it can't be
    /// read before the packet type is known.
    #[error("base header of family `{family}` has no fixed size")]
    VariableHeader { family: String },
}

/// Errors that can occur while sending or receiving packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The header's size field is smaller than the base header, or doesn't
    /// match the size of the resolved packet type.
    ///
    /// `bytes` holds the header bytes as received.
    #[error("packet size field is {declared}, expected {expected}; header {bytes:02x?}")]
    PacketSize {
        declared: usize,
        expected: usize,
        bytes: Vec<u8>,
    },

    /// The header's type field names no registered packet type.
    #[error("packet type {discriminant:#x} is not registered; header {bytes:02x?}")]
    PacketType { discriminant: u64, bytes: Vec<u8> },

    /// A registry lookup by discriminant or name found nothing.
    #[error("no packet type `{key}` in family `{family}`")]
    UnknownPacketType { family: String, key: String },

    /// The family's header hooks rejected the header contents.
    #[error("invalid header: {0}")]
    Header(String),

    /// Reading or writing a record field failed.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The transport failed or timed out.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl ProtocolError {
    /// Whether this is a framing or type error, after which the channel
    /// has flushed and can keep going.
    pub fn is_framing(&self) -> bool {
        matches!(self, Self::PacketSize { .. } | Self::PacketType { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}
