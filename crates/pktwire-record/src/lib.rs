//! Binary record layouts for pktwire.
//!
//! This crate describes packed binary records and gives named access to
//! their fields:
//!
//! - **Layouts** ([`RecordLayout`], built with [`RecordLayoutBuilder`]):
//!   the compiled field table of one record type: byte offsets, bitfield
//!   slices, tag sets, nested records.
//! - **Records** ([`Record`], [`RecordView`], [`RecordViewMut`]): an owned
//!   byte buffer plus borrowed views into nested records.
//! - **Values** ([`Value`], [`FieldType`], [`ByteOrder`], [`TagSet`]):
//!   what goes in and out of the accessors.
//! - **Errors** ([`LayoutError`], [`RecordError`]).
//!
//! # Architecture
//!
//! The record layer knows nothing about packets or transports. It sits at
//! the bottom of the stack:
//!
//! ```text
//! Record (bytes + names) → Protocol (framing, dispatch) → Transport (I/O)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod layout;
mod record;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::{LayoutError, RecordError};
pub use layout::{
    BitMember, Count, Field, FieldKind, Member, RESERVED_NAMES, RecordLayout,
    RecordLayoutBuilder, STORAGE_SUFFIX, Span,
};
pub use record::{Record, RecordView, RecordViewMut};
pub use types::{ByteOrder, FieldType, ParseByteOrderError, Primitive, Shapes, TagSet, Value};
