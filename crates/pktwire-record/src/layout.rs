//! Compiled record layouts and the builder that produces them.
//!
//! A [`RecordLayout`] is built once per record type and shared (via `Arc`)
//! by every instance. Building it walks the declarations in order, groups
//! consecutive bitfield members into shared storage units, and resolves
//! every name to a slot so field access is a table lookup.
//!
//! ```rust
//! use pktwire_record::{FieldType, RecordLayout};
//!
//! let command = RecordLayout::builder("command")
//!     .bits("state1", FieldType::U16, 7)
//!     .bits("state2", FieldType::U16, 3)
//!     .bits("state3", FieldType::U16, 1)
//!     .build()
//!     .unwrap();
//!
//! // The three members share one u16.
//! assert_eq!(command.fixed_size(), Some(2));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::{FieldType, LayoutError, Record, RecordError, Shapes, TagSet, Value};

/// Names that would shadow record accessors.
pub const RESERVED_NAMES: &[&str] = &[
    "value",
    "dtype",
    "shape",
    "unpack",
    "byte_order",
    "byte_size",
    "get_byte_size",
    "encode",
    "decode",
];

/// Suffix appended to the first member's name to name a bitfield group's
/// storage field.
pub const STORAGE_SUFFIX: &str = "_bits";

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Element count of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Fixed(usize),
    /// Supplied per instance through [`Shapes`].
    Variable,
}

/// What a top-level field stores.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// One scalar, or an array of them.
    Scalar { ty: FieldType, count: Count },
    /// An integer interpreted through a tag set.
    Tagged { ty: FieldType, tags: Arc<TagSet> },
    /// The shared storage unit of a bitfield group.
    Bits { ty: FieldType },
    /// A nested record, stored inline.
    Record(Arc<RecordLayout>),
}

impl FieldKind {
    /// The scalar type of each element, or `None` for nested records.
    pub fn scalar_type(&self) -> Option<FieldType> {
        match self {
            Self::Scalar { ty, .. } | Self::Tagged { ty, .. } | Self::Bits { ty } => Some(*ty),
            Self::Record(_) => None,
        }
    }
}

/// A field that occupies bytes in the record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Width of a single element.
    pub fn element_width(&self) -> usize {
        match &self.kind {
            FieldKind::Record(layout) => layout.fixed_size().unwrap_or(0),
            kind => kind.scalar_type().map_or(0, FieldType::width),
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Scalar {
                count: Count::Variable,
                ..
            }
        )
    }
}

/// A logical bitfield member: a slice of a storage field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMember {
    name: String,
    storage: usize,
    offset: u32,
    width: u32,
}

impl BitMember {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the storage field in [`RecordLayout::fields`].
    pub fn storage(&self) -> usize {
        self.storage
    }

    /// Position of the least significant bit within the storage unit.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// `(1 << width) - 1`, unshifted.
    pub fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }
}

/// Where a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Field(usize),
    Bits(usize),
}

/// A declared member, in declaration order.
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Field(&'a Field),
    Bits(&'a BitMember),
}

/// Byte placement of one field within a record instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub count: usize,
    pub width: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.count * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len()
    }
}

// ---------------------------------------------------------------------------
// RecordLayout
// ---------------------------------------------------------------------------

/// Immutable, compiled description of a record type.
///
/// Layouts are always packed: fields are placed back to back in declaration
/// order with no padding.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    name: String,
    fields: Vec<Field>,
    bits: Vec<BitMember>,
    slots: HashMap<String, Slot>,
    members: Vec<Slot>,
    /// Spans with every variable field at zero elements.
    spans: Vec<Span>,
    min_size: usize,
    variable: bool,
    defaults: Vec<(String, Value)>,
}

impl RecordLayout {
    pub fn builder(name: impl Into<String>) -> RecordLayoutBuilder {
        RecordLayoutBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte-bearing fields, including bitfield storage units.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn bit_members(&self) -> &[BitMember] {
        &self.bits
    }

    /// Declared members in order; storage units are replaced by the bitfield
    /// members that share them.
    pub fn members(&self) -> impl Iterator<Item = Member<'_>> {
        self.members.iter().map(move |slot| match *slot {
            Slot::Field(i) => Member::Field(&self.fields[i]),
            Slot::Bits(j) => Member::Bits(&self.bits[j]),
        })
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        match self.slots.get(name)? {
            Slot::Field(i) => Some(&self.fields[*i]),
            Slot::Bits(_) => None,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        match self.slots.get(name)? {
            Slot::Field(i) => Some(*i),
            Slot::Bits(_) => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub(crate) fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).copied()
    }

    /// Total size when no field has a variable shape.
    pub fn fixed_size(&self) -> Option<usize> {
        (!self.variable).then_some(self.min_size)
    }

    /// Size with every variable field at zero elements.
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn is_fixed(&self) -> bool {
        !self.variable
    }

    pub(crate) fn defaults(&self) -> &[(String, Value)] {
        &self.defaults
    }

    /// Spans for a fixed layout (variable fields at zero elements otherwise).
    pub fn fixed_spans(&self) -> &[Span] {
        &self.spans
    }

    /// Lays out an instance with the given element counts.
    pub fn spans_for(&self, shapes: &Shapes) -> Result<(Vec<Span>, usize), RecordError> {
        if shapes.is_empty() {
            return Ok((self.spans.clone(), self.min_size));
        }
        for (name, _) in shapes.iter() {
            match self.field(name) {
                Some(field) if field.is_variable() => {}
                Some(_) => return Err(RecordError::NotVariable(name.to_string())),
                None => return Err(RecordError::UnknownField(name.to_string())),
            }
        }
        let mut spans = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for field in &self.fields {
            let count = match field.kind {
                FieldKind::Scalar {
                    count: Count::Fixed(n),
                    ..
                } => n,
                FieldKind::Scalar {
                    count: Count::Variable,
                    ..
                } => shapes.get(&field.name).unwrap_or(0),
                _ => 1,
            };
            let span = Span {
                offset,
                count,
                width: field.element_width(),
            };
            offset = count
                .checked_mul(span.width)
                .and_then(|len| offset.checked_add(len))
                .ok_or_else(|| RecordError::SizeOverflow {
                    field: field.name.clone(),
                    count,
                })?;
            spans.push(span);
        }
        Ok((spans, offset))
    }

    /// Whether this layout begins with every field of `prefix`, in order and
    /// with identical kinds. Used to check that a packet type carries its
    /// family's base header.
    pub fn starts_with(&self, prefix: &RecordLayout) -> bool {
        prefix.fields.len() <= self.fields.len()
            && prefix.fields.iter().zip(&self.fields).all(|(a, b)| a == b)
            && prefix.bits.len() <= self.bits.len()
            && prefix.bits.iter().zip(&self.bits).all(|(a, b)| a == b)
    }
}

/// Structural equality: same fields and bitfield members. The layout name
/// and declared defaults don't take part.
impl PartialEq for RecordLayout {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields && self.bits == other.bits
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Decl {
    Scalar {
        name: String,
        ty: FieldType,
        count: Count,
    },
    Bits {
        name: String,
        ty: FieldType,
        width: u32,
    },
    Tagged {
        name: String,
        ty: FieldType,
        tags: Arc<TagSet>,
    },
    Record {
        name: String,
        layout: Arc<RecordLayout>,
    },
}

impl Decl {
    fn name(&self) -> &str {
        match self {
            Self::Scalar { name, .. }
            | Self::Bits { name, .. }
            | Self::Tagged { name, .. }
            | Self::Record { name, .. } => name,
        }
    }
}

/// Declarative field list for a [`RecordLayout`].
///
/// Declarations are recorded as-is; all validation happens in
/// [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RecordLayoutBuilder {
    name: String,
    decls: Vec<Decl>,
    defaults: Vec<(String, Value)>,
}

/// Open bitfield group while scanning declarations.
struct OpenGroup {
    storage: usize,
    storage_name: String,
    ty: FieldType,
    cursor: u32,
}

impl RecordLayoutBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decls: Vec::new(),
            defaults: Vec::new(),
        }
    }

    /// A single scalar.
    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.array(name, ty, 1)
    }

    /// A fixed-length array of scalars.
    pub fn array(mut self, name: impl Into<String>, ty: FieldType, count: usize) -> Self {
        self.decls.push(Decl::Scalar {
            name: name.into(),
            ty,
            count: Count::Fixed(count),
        });
        self
    }

    /// An array whose length is chosen per instance.
    pub fn vector(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.decls.push(Decl::Scalar {
            name: name.into(),
            ty,
            count: Count::Variable,
        });
        self
    }

    /// A bitfield member `width` bits wide, packed into a storage unit of
    /// type `ty`. Members are packed starting at the least significant bit.
    pub fn bits(mut self, name: impl Into<String>, ty: FieldType, width: u32) -> Self {
        self.decls.push(Decl::Bits {
            name: name.into(),
            ty,
            width,
        });
        self
    }

    /// An integer field read and written through a tag set.
    pub fn tagged(mut self, name: impl Into<String>, ty: FieldType, tags: &Arc<TagSet>) -> Self {
        self.decls.push(Decl::Tagged {
            name: name.into(),
            ty,
            tags: Arc::clone(tags),
        });
        self
    }

    /// A nested record stored inline.
    pub fn record(mut self, name: impl Into<String>, layout: &Arc<RecordLayout>) -> Self {
        self.decls.push(Decl::Record {
            name: name.into(),
            layout: Arc::clone(layout),
        });
        self
    }

    /// Value written into `field` when an instance is created. Accepts the
    /// same paths as `Record::set`, e.g. `"hdr.ptype"`.
    pub fn default(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.push((field.into(), value.into()));
        self
    }

    /// Compiles the declarations.
    pub fn build(self) -> Result<Arc<RecordLayout>, LayoutError> {
        if self.decls.is_empty() {
            return Err(LayoutError::Empty(self.name));
        }

        let mut fields: Vec<Field> = Vec::new();
        let mut bits: Vec<BitMember> = Vec::new();
        let mut slots: HashMap<String, Slot> = HashMap::new();
        let mut members: Vec<Slot> = Vec::new();
        let mut open: Option<OpenGroup> = None;

        for decl in &self.decls {
            let name = decl.name();
            self.check_name(name, &slots)?;

            match decl {
                Decl::Bits { name, ty, width } => {
                    if !ty.is_integer() {
                        return Err(LayoutError::NotAnInteger {
                            field: name.clone(),
                            ty: *ty,
                        });
                    }
                    if *width == 0 || *width > ty.bits() {
                        return Err(LayoutError::InvalidBitWidth {
                            field: name.clone(),
                            width: *width,
                            bits: ty.bits(),
                        });
                    }

                    let group = match open.take() {
                        Some(group) if group.ty == *ty => group,
                        _ => {
                            let storage_name = format!("{name}{STORAGE_SUFFIX}");
                            self.check_name(&storage_name, &slots)?;
                            fields.push(Field {
                                name: storage_name.clone(),
                                kind: FieldKind::Bits { ty: *ty },
                            });
                            let storage = fields.len() - 1;
                            slots.insert(storage_name.clone(), Slot::Field(storage));
                            OpenGroup {
                                storage,
                                storage_name,
                                ty: *ty,
                                cursor: 0,
                            }
                        }
                    };

                    let end = group.cursor + width;
                    if end > ty.bits() {
                        return Err(LayoutError::BitOverflow {
                            field: name.clone(),
                            storage: group.storage_name,
                            cursor: group.cursor,
                            end,
                            bits: ty.bits(),
                        });
                    }

                    bits.push(BitMember {
                        name: name.clone(),
                        storage: group.storage,
                        offset: group.cursor,
                        width: *width,
                    });
                    slots.insert(name.clone(), Slot::Bits(bits.len() - 1));
                    members.push(Slot::Bits(bits.len() - 1));
                    open = Some(OpenGroup {
                        cursor: end,
                        ..group
                    });
                }
                other => {
                    open = None;
                    let kind = match other {
                        Decl::Scalar { ty, count, .. } => {
                            if ty.width() == 0 {
                                return Err(LayoutError::ZeroWidth {
                                    layout: self.name.clone(),
                                    field: name.to_string(),
                                });
                            }
                            FieldKind::Scalar {
                                ty: *ty,
                                count: *count,
                            }
                        }
                        Decl::Tagged { name, ty, tags } => {
                            if !ty.is_integer() {
                                return Err(LayoutError::NotAnInteger {
                                    field: name.clone(),
                                    ty: *ty,
                                });
                            }
                            FieldKind::Tagged {
                                ty: *ty,
                                tags: Arc::clone(tags),
                            }
                        }
                        Decl::Record { name, layout } => {
                            if !layout.is_fixed() {
                                return Err(LayoutError::VariableNested {
                                    field: name.clone(),
                                });
                            }
                            FieldKind::Record(Arc::clone(layout))
                        }
                        Decl::Bits { .. } => unreachable!("handled above"),
                    };
                    fields.push(Field {
                        name: name.to_string(),
                        kind,
                    });
                    slots.insert(name.to_string(), Slot::Field(fields.len() - 1));
                    members.push(Slot::Field(fields.len() - 1));
                }
            }
        }

        let mut spans = Vec::with_capacity(fields.len());
        let mut offset = 0;
        for field in &fields {
            let count = match field.kind {
                FieldKind::Scalar {
                    count: Count::Fixed(n),
                    ..
                } => n,
                FieldKind::Scalar {
                    count: Count::Variable,
                    ..
                } => 0,
                _ => 1,
            };
            let span = Span {
                offset,
                count,
                width: field.element_width(),
            };
            offset += span.len();
            spans.push(span);
        }
        let variable = fields.iter().any(Field::is_variable);

        let layout = Arc::new(RecordLayout {
            name: self.name,
            fields,
            bits,
            slots,
            members,
            spans,
            min_size: offset,
            variable,
            defaults: self.defaults,
        });

        validate_defaults(&layout)?;
        Ok(layout)
    }

    fn check_name(&self, name: &str, slots: &HashMap<String, Slot>) -> Result<(), LayoutError> {
        if name.starts_with('_') || RESERVED_NAMES.contains(&name) || name.contains('.') {
            return Err(LayoutError::ReservedName {
                layout: self.name.clone(),
                field: name.to_string(),
            });
        }
        if slots.contains_key(name) {
            return Err(LayoutError::DuplicateField {
                layout: self.name.clone(),
                field: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Applies every default to a scratch instance so bad defaults surface at
/// build time instead of on first use.
fn validate_defaults(layout: &Arc<RecordLayout>) -> Result<(), LayoutError> {
    if layout.defaults.is_empty() {
        return Ok(());
    }
    let mut scratch = Record::zeroed(layout);
    for (path, value) in &layout.defaults {
        let leaf = path.rsplit('.').next().unwrap_or(path);
        let known = match path.rsplit_once('.') {
            Some((parent, _)) => scratch
                .nested(parent)
                .map(|view| view.layout().contains(leaf))
                .unwrap_or(false),
            None => layout.contains(leaf),
        };
        if !known {
            return Err(LayoutError::UnknownDefault(path.clone()));
        }
        if let Some(field) = layout.field(path) {
            if field.is_variable() {
                return Err(LayoutError::InvalidDefault {
                    field: path.clone(),
                    source: Box::new(RecordError::NotVariable(path.clone())),
                });
            }
        }
        scratch
            .set(path, value.clone())
            .map_err(|source| LayoutError::InvalidDefault {
                field: path.clone(),
                source: Box::new(source),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Arc<RecordLayout> {
        RecordLayout::builder("pktheader")
            .field("size", FieldType::U16)
            .field("dest", FieldType::U8)
            .field("src", FieldType::U8)
            .field("ptype", FieldType::U8)
            .build()
            .unwrap()
    }

    #[test]
    fn test_fields_are_packed_in_declaration_order() {
        let layout = header();
        let offsets: Vec<usize> = layout.fixed_spans().iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 2, 3, 4]);
        assert_eq!(layout.fixed_size(), Some(5));
    }

    #[test]
    fn test_bitfield_group_shares_one_storage_unit() {
        let layout = RecordLayout::builder("command")
            .record("hdr", &header())
            .bits("state1", FieldType::U16, 7)
            .bits("state2", FieldType::U16, 3)
            .bits("state3", FieldType::U16, 1)
            .build()
            .unwrap();

        assert_eq!(layout.fixed_size(), Some(7));
        assert_eq!(layout.fields().len(), 2);
        assert_eq!(layout.fields()[1].name(), "state1_bits");

        let offsets: Vec<(u32, u32)> = layout
            .bit_members()
            .iter()
            .map(|m| (m.offset(), m.width()))
            .collect();
        assert_eq!(offsets, vec![(0, 7), (7, 3), (10, 1)]);
    }

    #[test]
    fn test_type_change_opens_new_group() {
        let layout = RecordLayout::builder("mixed")
            .bits("a", FieldType::U8, 4)
            .bits("b", FieldType::U16, 4)
            .build()
            .unwrap();
        assert_eq!(layout.fields().len(), 2);
        assert_eq!(layout.fixed_size(), Some(3));
        assert_eq!(layout.bit_members()[1].offset(), 0);
    }

    #[test]
    fn test_plain_field_closes_group() {
        let layout = RecordLayout::builder("split")
            .bits("a", FieldType::U8, 2)
            .field("x", FieldType::U8)
            .bits("b", FieldType::U8, 2)
            .build()
            .unwrap();
        assert_eq!(layout.fields().len(), 3);
        assert_eq!(layout.bit_members()[1].storage(), 2);
    }

    #[test]
    fn test_bit_overflow_is_rejected() {
        let err = RecordLayout::builder("over")
            .bits("a", FieldType::U8, 6)
            .bits("b", FieldType::U8, 3)
            .build()
            .unwrap_err();
        assert!(matches!(err, LayoutError::BitOverflow { end: 9, bits: 8, .. }));
    }

    #[test]
    fn test_invalid_bit_widths() {
        assert!(matches!(
            RecordLayout::builder("z").bits("a", FieldType::U8, 0).build(),
            Err(LayoutError::InvalidBitWidth { .. })
        ));
        assert!(matches!(
            RecordLayout::builder("f").bits("a", FieldType::F32, 3).build(),
            Err(LayoutError::NotAnInteger { .. })
        ));
    }

    #[test]
    fn test_reserved_and_duplicate_names() {
        assert!(matches!(
            RecordLayout::builder("r").field("value", FieldType::U8).build(),
            Err(LayoutError::ReservedName { .. })
        ));
        assert!(matches!(
            RecordLayout::builder("r").field("_hidden", FieldType::U8).build(),
            Err(LayoutError::ReservedName { .. })
        ));
        assert!(matches!(
            RecordLayout::builder("r")
                .field("a", FieldType::U8)
                .field("a", FieldType::U16)
                .build(),
            Err(LayoutError::DuplicateField { .. })
        ));
        assert!(matches!(
            RecordLayout::builder("r")
                .bits("a", FieldType::U8, 1)
                .field("a_bits", FieldType::U8)
                .build(),
            Err(LayoutError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_empty_layout_is_rejected() {
        assert!(matches!(
            RecordLayout::builder("empty").build(),
            Err(LayoutError::Empty(_))
        ));
    }

    #[test]
    fn test_variable_nested_is_rejected() {
        let var = RecordLayout::builder("var")
            .vector("payload", FieldType::F32)
            .build()
            .unwrap();
        assert!(matches!(
            RecordLayout::builder("outer").record("inner", &var).build(),
            Err(LayoutError::VariableNested { .. })
        ));
    }

    #[test]
    fn test_spans_for_variable_fields() {
        let layout = RecordLayout::builder("varpkt")
            .field("len_payload", FieldType::U16)
            .vector("payload", FieldType::F32)
            .field("crc", FieldType::U8)
            .build()
            .unwrap();
        assert_eq!(layout.fixed_size(), None);
        assert_eq!(layout.min_size(), 3);

        let (spans, size) = layout.spans_for(&Shapes::new().with("payload", 25)).unwrap();
        assert_eq!(size, 2 + 100 + 1);
        assert_eq!(spans[2].offset, 102);

        assert!(matches!(
            layout.spans_for(&Shapes::new().with("len_payload", 2)),
            Err(RecordError::NotVariable(_))
        ));
        assert!(matches!(
            layout.spans_for(&Shapes::new().with("nope", 2)),
            Err(RecordError::UnknownField(_))
        ));
    }

    #[test]
    fn test_spans_for_rejects_overflowing_counts() {
        let layout = RecordLayout::builder("varpkt")
            .field("n", FieldType::U64)
            .vector("payload", FieldType::F32)
            .build()
            .unwrap();
        assert!(matches!(
            layout.spans_for(&Shapes::new().with("payload", 1 << 62)),
            Err(RecordError::SizeOverflow { ref field, .. }) if field == "payload"
        ));
        assert!(matches!(
            Record::with_shapes(&layout, crate::ByteOrder::Little, &Shapes::new().with("payload", usize::MAX)),
            Err(RecordError::SizeOverflow { .. })
        ));
    }

    #[test]
    fn test_zero_width_bytes_is_rejected() {
        assert!(matches!(
            RecordLayout::builder("z")
                .field("a", FieldType::U8)
                .field("b", FieldType::Bytes(0))
                .build(),
            Err(LayoutError::ZeroWidth { ref field, .. }) if field == "b"
        ));
        assert!(RecordLayout::builder("z")
            .field("b", FieldType::Bytes(1))
            .build()
            .is_ok());
    }

    #[test]
    fn test_defaults_are_validated() {
        assert!(RecordLayout::builder("d")
            .field("x", FieldType::U8)
            .default("x", 7u8)
            .build()
            .is_ok());
        assert!(matches!(
            RecordLayout::builder("d")
                .field("x", FieldType::U8)
                .default("y", 7u8)
                .build(),
            Err(LayoutError::UnknownDefault(_))
        ));
        assert!(matches!(
            RecordLayout::builder("d")
                .field("x", FieldType::U8)
                .default("x", 700u16)
                .build(),
            Err(LayoutError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn test_starts_with_checks_prefix_structure() {
        let base = RecordLayout::builder("base")
            .record("hdr", &header())
            .build()
            .unwrap();
        let pkt = RecordLayout::builder("pkt")
            .record("hdr", &header())
            .field("payload", FieldType::U32)
            .build()
            .unwrap();
        let other = RecordLayout::builder("other")
            .field("payload", FieldType::U32)
            .build()
            .unwrap();
        assert!(pkt.starts_with(&base));
        assert!(!other.starts_with(&base));
    }
}
