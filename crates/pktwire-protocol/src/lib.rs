//! Packet protocol engine for pktwire.
//!
//! A packet is a [`Record`](pktwire_record::Record) that starts with its
//! family's base header. This crate turns a byte [`Transport`] into a
//! stream of such packets:
//!
//! - **Families** ([`PacketFamily`], [`StandardFamily`]): where the size,
//!   type and address live in the header, and how to fill them in.
//! - **Registry** ([`PacketTypeRegistry`]): discriminant → packet layout.
//! - **Channel** ([`PacketChannel`]): header-first reads with size and type
//!   validation, and header-stamped writes.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → PacketChannel (base header → registry → full packet) → caller
//! ```
//!
//! [`Transport`]: pktwire_transport::Transport

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod channel;
mod error;
mod family;
mod registry;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use channel::{ChannelConfig, ChannelState, PacketChannel};
pub use error::{ProtocolError, RegistrationError};
pub use family::{BROADCAST, HeaderInfo, HeaderParams, PacketFamily, StandardFamily};
pub use registry::{PacketType, PacketTypeRegistry};
