//! # pktwire
//!
//! Declarative binary records exchanged as framed packets over
//! interchangeable transports.
//!
//! The layers, each its own crate and re-exported here:
//!
//! - [`record`]: layouts with bitfields, nested records, tags and
//!   variable-length fields; records that get, set, encode and decode them.
//! - [`transport`]: blocking, timeout-bounded byte transports: loopback,
//!   serial, TCP and UDP.
//! - [`protocol`]: packet families, the type registry, and
//!   [`PacketChannel`](protocol::PacketChannel).
//!
//! This crate adds [`PacketServer`], a threaded accept loop that answers
//! each received packet through a [`PacketHandler`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pktwire::prelude::*;
//!
//! # fn main() -> Result<(), PktwireError> {
//! let base = RecordLayout::builder("base")
//!     .field("size", FieldType::U16)
//!     .field("type", FieldType::U8)
//!     .build()?;
//! let ping = RecordLayout::builder("ping")
//!     .field("size", FieldType::U16)
//!     .field("type", FieldType::U8)
//!     .field("seq", FieldType::U32)
//!     .build()?;
//!
//! let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base));
//! registry.register(&ping, &TagSet::new("ptype", [("ping", 1)]))?;
//! let registry = Arc::new(registry);
//!
//! let transport = SocketTransport::new(SocketConfig::server("127.0.0.1:9000"))?;
//! let server = PacketServer::builder(transport, registry).start()?;
//! // ...
//! let report = server.stop()?;
//! # Ok(())
//! # }
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod handler;
mod server;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::PktwireError;
pub use handler::{EchoHandler, PacketHandler};
pub use server::{PacketServer, PacketServerBuilder, ServerReport};

pub use pktwire_protocol as protocol;
pub use pktwire_record as record;
pub use pktwire_transport as transport;

/// The types most programs need, in one import.
pub mod prelude {
    pub use crate::{EchoHandler, PacketHandler, PacketServer, PktwireError, ServerReport};

    pub use pktwire_protocol::{
        ChannelConfig, HeaderParams, PacketChannel, PacketFamily, PacketTypeRegistry,
        StandardFamily,
    };
    pub use pktwire_record::{
        ByteOrder, FieldType, Record, RecordLayout, Shapes, TagSet, Value,
    };
    pub use pktwire_transport::{
        Loopback, SocketConfig, SocketTransport, Transport, TransportConfig,
    };
}
