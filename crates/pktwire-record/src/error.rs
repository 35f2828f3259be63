//! Error types for the record layer.
//!
//! Two enums, split by *when* things go wrong:
//!
//! - [`LayoutError`] is raised while a [`RecordLayout`](crate::RecordLayout)
//!   is being built. These are programming errors (duplicate names, a
//!   bitfield that doesn't fit its storage unit) and never show up per packet.
//! - [`RecordError`] is raised while reading or writing a record instance.

/// Errors raised while compiling a record layout.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The layout declares no fields at all.
    #[error("layout `{0}` declares no fields")]
    Empty(String),

    /// Two declarations share a name, or a declaration collides with the
    /// generated storage field of a bitfield group.
    #[error("duplicate field name `{field}` in layout `{layout}`")]
    DuplicateField { layout: String, field: String },

    /// The name is reserved for record accessors.
    #[error("field name `{field}` in layout `{layout}` is reserved")]
    ReservedName { layout: String, field: String },

    /// A bitfield member is zero bits wide or wider than its storage type.
    #[error("bitfield `{field}` has invalid width {width} for a {bits}-bit storage unit")]
    InvalidBitWidth { field: String, width: u32, bits: u32 },

    /// The running bit cursor of a group ran past its storage unit.
    #[error(
        "bitfield `{field}` overflows storage `{storage}`: needs bits {cursor}..{end} of {bits}"
    )]
    BitOverflow {
        field: String,
        storage: String,
        cursor: u32,
        end: u32,
        bits: u32,
    },

    /// A byte string field declared with no bytes.
    #[error("byte string `{field}` in layout `{layout}` has zero width")]
    ZeroWidth { layout: String, field: String },

    /// Bitfields and tags need an integer storage type.
    #[error("field `{field}` needs an integer type, got {ty}")]
    NotAnInteger { field: String, ty: crate::FieldType },

    /// Nested records must have a fixed size.
    #[error("nested record `{field}` has variable-shape fields")]
    VariableNested { field: String },

    /// A default value names a field the layout doesn't have.
    #[error("default for unknown field `{0}`")]
    UnknownDefault(String),

    /// A default value can't be stored in its field.
    #[error("invalid default for `{field}`: {source}")]
    InvalidDefault {
        field: String,
        #[source]
        source: Box<RecordError>,
    },
}

/// Errors raised while accessing a record instance.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// No field (or bitfield member) has this name.
    #[error("no field named `{0}`")]
    UnknownField(String),

    /// The byte slice handed to `decode` has the wrong length.
    #[error("expected {expected} bytes, got {actual}: {bytes:02x?}")]
    SizeMismatch {
        expected: usize,
        actual: usize,
        bytes: Vec<u8>,
    },

    /// A tagged field holds a raw value outside its tag set.
    #[error("field `{field}` holds {raw:#x}, which is not a member of tag set `{tags}`")]
    InvalidTag { field: String, tags: String, raw: u64 },

    /// A symbolic tag isn't part of the field's tag set.
    #[error("`{symbol}` is not a member of tag set `{tags}`")]
    UnknownSymbol { tags: String, symbol: String },

    /// An integer doesn't fit the field's type, or a byte string is too long.
    #[error("value {value} does not fit field `{field}` ({ty})")]
    OutOfRange {
        field: String,
        ty: crate::FieldType,
        value: String,
    },

    /// The value's kind can't be stored in (or read as) the field's type.
    #[error("field `{field}` expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// An array value has the wrong number of elements.
    #[error("field `{field}` holds {expected} elements, got {actual}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// A nested record was assigned from a record of a different layout.
    #[error("field `{field}` expects layout `{expected}`, got `{actual}`")]
    LayoutMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// Element counts that put the record past `usize::MAX` bytes.
    #[error("field `{field}` with {count} elements overflows the record size")]
    SizeOverflow { field: String, count: usize },

    /// A shape was supplied for a field whose element count is fixed.
    #[error("field `{0}` does not have a variable shape")]
    NotVariable(String),

    /// A path segment (or `nested()`) names a field that isn't a record.
    #[error("field `{0}` is not a nested record")]
    NotARecord(String),

    /// `get`/`set` was called on a nested record field.
    #[error("field `{0}` is a nested record; access it through `nested()`")]
    IsRecord(String),
}
