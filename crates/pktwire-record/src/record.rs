//! Record instances and borrowed views into them.
//!
//! A [`Record`] owns one byte buffer, always kept in its configured byte
//! order, so `encode` is a copy and `decode` is a length check plus a copy.
//! Nested records are never separate allocations: [`RecordView`] and
//! [`RecordViewMut`] are `(layout, spans, byte orders, sub-slice)` windows
//! into the parent's buffer.
//!
//! ```rust
//! use pktwire_record::{ByteOrder, FieldType, Record, RecordLayout};
//!
//! let layout = RecordLayout::builder("point")
//!     .field("x", FieldType::I16)
//!     .field("y", FieldType::I16)
//!     .build()
//!     .unwrap();
//!
//! let mut point = Record::with_order(&layout, ByteOrder::Big);
//! point.set("x", -2i16).unwrap();
//! assert_eq!(point.encode(), vec![0xFF, 0xFE, 0x00, 0x00]);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::codec;
use crate::layout::{FieldKind, Member, Slot, Span};
use crate::{ByteOrder, Count, Primitive, RecordError, RecordLayout, Shapes, Value};

// ---------------------------------------------------------------------------
// Byte orders
// ---------------------------------------------------------------------------

/// Byte order of a record and, per field index, of its nested records.
///
/// Non-record fields get a leaf entry so indexing by field never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Orders {
    order: ByteOrder,
    nested: Vec<Orders>,
}

impl Orders {
    fn uniform(layout: &RecordLayout, order: ByteOrder) -> Self {
        let nested = layout
            .fields()
            .iter()
            .map(|field| match field.kind() {
                FieldKind::Record(inner) => Self::uniform(inner, order),
                _ => Self {
                    order,
                    nested: Vec::new(),
                },
            })
            .collect();
        Self { order, nested }
    }
}

/// Re-expresses `buf` from the orders in `from` to the orders in `to`.
fn convert(layout: &RecordLayout, spans: &[Span], from: &Orders, to: &Orders, buf: &mut [u8]) {
    for (index, field) in layout.fields().iter().enumerate() {
        let span = spans[index];
        match field.kind() {
            FieldKind::Record(inner) => convert(
                inner,
                inner.fixed_spans(),
                &from.nested[index],
                &to.nested[index],
                &mut buf[span.range()],
            ),
            kind => {
                if from.order != to.order {
                    if let Some(ty) = kind.scalar_type() {
                        codec::swap_elements(ty, &mut buf[span.range()]);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecordView
// ---------------------------------------------------------------------------

/// Read-only view of a record or nested record.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    layout: &'a Arc<RecordLayout>,
    spans: &'a [Span],
    orders: &'a Orders,
    buf: &'a [u8],
}

impl<'a> RecordView<'a> {
    pub fn layout(&self) -> &'a Arc<RecordLayout> {
        self.layout
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.orders.order
    }

    pub fn byte_size(&self) -> usize {
        self.buf.len()
    }

    /// The encoded bytes, borrowed.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    pub fn encode(&self) -> Vec<u8> {
        self.buf.to_vec()
    }

    /// Element count of an array field (1 for scalars and nested records).
    pub fn len_of(&self, path: &str) -> Result<usize, RecordError> {
        let (view, name) = self.resolve(path)?;
        match view.layout.slot(name) {
            Some(Slot::Field(index)) => Ok(view.spans[index].count),
            Some(Slot::Bits(_)) => Ok(1),
            None => Err(RecordError::UnknownField(path.to_string())),
        }
    }

    /// Reads a field or bitfield member. Tagged fields must hold a member of
    /// their tag set.
    pub fn get(&self, path: &str) -> Result<Value, RecordError> {
        let (view, name) = self.resolve(path)?;
        view.read(name, true)
    }

    /// Reads a field and converts it to `T`. Tagged fields are read as their
    /// raw integer without checking the tag set.
    pub fn get_as<T: Primitive>(&self, path: &str) -> Result<T, RecordError> {
        let (view, name) = self.resolve(path)?;
        let value = view.read(name, false)?;
        T::from_value(&value).ok_or_else(|| RecordError::TypeMismatch {
            field: path.to_string(),
            expected: T::FIELD_TYPE.to_string(),
            found: value.kind().to_string(),
        })
    }

    /// Raw integer contents of an integer field, tagged field, or bitfield
    /// member.
    pub fn get_raw(&self, path: &str) -> Result<u64, RecordError> {
        let (view, name) = self.resolve(path)?;
        match view.read(name, false)? {
            Value::UInt(raw) => Ok(raw),
            Value::Int(i) => Ok(i as u64),
            other => Err(RecordError::TypeMismatch {
                field: path.to_string(),
                expected: "integer".to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    /// Every element of an array field, converted to `T`. A scalar field
    /// yields one element.
    pub fn elements<T: Primitive>(&self, path: &str) -> Result<Vec<T>, RecordError> {
        let (view, name) = self.resolve(path)?;
        let items = match view.read(name, false)? {
            Value::Array(items) => items,
            single => vec![single],
        };
        items
            .iter()
            .map(|item| {
                T::from_value(item).ok_or_else(|| RecordError::TypeMismatch {
                    field: path.to_string(),
                    expected: T::FIELD_TYPE.to_string(),
                    found: item.kind().to_string(),
                })
            })
            .collect()
    }

    /// View of a nested record field.
    pub fn nested(&self, path: &str) -> Result<RecordView<'a>, RecordError> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let index = record_index(self.layout, head)?;
        let layout: &'a Arc<RecordLayout> = self.layout;
        let FieldKind::Record(inner) = layout.fields()[index].kind() else {
            return Err(RecordError::NotARecord(head.to_string()));
        };
        let child = RecordView {
            layout: inner,
            spans: inner.fixed_spans(),
            orders: &self.orders.nested[index],
            buf: &self.buf[self.spans[index].range()],
        };
        match rest {
            Some(rest) => child.nested(rest),
            None => Ok(child),
        }
    }

    /// Copies this view into an owned record.
    pub fn to_record(&self) -> Record {
        Record {
            layout: Arc::clone(self.layout),
            spans: self.spans.to_vec(),
            orders: self.orders.clone(),
            buf: self.buf.to_vec(),
        }
    }

    /// Splits a dotted path into the view holding the leaf and the leaf name.
    fn resolve<'p>(&self, path: &'p str) -> Result<(RecordView<'a>, &'p str), RecordError> {
        match path.rsplit_once('.') {
            Some((parent, leaf)) => Ok((self.nested(parent)?, leaf)),
            None => Ok((*self, path)),
        }
    }

    fn read(&self, name: &str, strict: bool) -> Result<Value, RecordError> {
        let order = self.orders.order;
        match self.layout.slot(name) {
            None => Err(RecordError::UnknownField(name.to_string())),
            Some(Slot::Bits(j)) => {
                let member = &self.layout.bit_members()[j];
                let storage = codec::read_raw(order, &self.buf[self.spans[member.storage()].range()]);
                Ok(Value::UInt((storage >> member.offset()) & member.mask()))
            }
            Some(Slot::Field(index)) => {
                let field = &self.layout.fields()[index];
                let span = self.spans[index];
                let bytes = &self.buf[span.range()];
                match field.kind() {
                    FieldKind::Record(_) => Err(RecordError::IsRecord(name.to_string())),
                    FieldKind::Bits { .. } => Ok(Value::UInt(codec::read_raw(order, bytes))),
                    FieldKind::Tagged { tags, .. } => {
                        let raw = codec::read_raw(order, bytes);
                        if !strict {
                            return Ok(Value::UInt(raw));
                        }
                        match tags.symbol_of(raw) {
                            Some(symbol) => Ok(Value::Tag {
                                symbol: symbol.to_string(),
                                raw,
                            }),
                            None => Err(RecordError::InvalidTag {
                                field: name.to_string(),
                                tags: tags.name().to_string(),
                                raw,
                            }),
                        }
                    }
                    FieldKind::Scalar { ty, count } => {
                        if *count == Count::Fixed(1) {
                            return Ok(codec::read_scalar(*ty, order, bytes));
                        }
                        let items = bytes
                            .chunks_exact(ty.width().max(1))
                            .take(span.count)
                            .map(|element| codec::read_scalar(*ty, order, element))
                            .collect();
                        Ok(Value::Array(items))
                    }
                }
            }
        }
    }

    /// Whether both views hold the same field contents, regardless of the
    /// byte order each is stored in.
    fn same_contents(&self, other: &RecordView<'_>) -> bool {
        if **self.layout != **other.layout || self.spans != other.spans {
            return false;
        }
        if self.orders == other.orders {
            return self.buf == other.buf;
        }
        let mut theirs = other.buf.to_vec();
        convert(self.layout, self.spans, other.orders, self.orders, &mut theirs);
        self.buf == theirs.as_slice()
    }
}

impl PartialEq for RecordView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.same_contents(other)
    }
}

fn record_index(layout: &RecordLayout, name: &str) -> Result<usize, RecordError> {
    match layout.slot(name) {
        Some(Slot::Field(index)) => match layout.fields()[index].kind() {
            FieldKind::Record(_) => Ok(index),
            _ => Err(RecordError::NotARecord(name.to_string())),
        },
        Some(Slot::Bits(_)) => Err(RecordError::NotARecord(name.to_string())),
        None => Err(RecordError::UnknownField(name.to_string())),
    }
}

// ---------------------------------------------------------------------------
// RecordViewMut
// ---------------------------------------------------------------------------

/// Mutable view of a record or nested record. Writes land directly in the
/// owning record's buffer.
#[derive(Debug)]
pub struct RecordViewMut<'a> {
    layout: &'a Arc<RecordLayout>,
    spans: &'a [Span],
    orders: &'a mut Orders,
    buf: &'a mut [u8],
}

impl<'a> RecordViewMut<'a> {
    pub fn as_view(&self) -> RecordView<'_> {
        RecordView {
            layout: self.layout,
            spans: self.spans,
            orders: self.orders,
            buf: self.buf,
        }
    }

    fn reborrow(&mut self) -> RecordViewMut<'_> {
        RecordViewMut {
            layout: self.layout,
            spans: self.spans,
            orders: &mut *self.orders,
            buf: &mut *self.buf,
        }
    }

    pub fn get(&self, path: &str) -> Result<Value, RecordError> {
        self.as_view().get(path)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.orders.order
    }

    /// Mutable view of a nested record field.
    pub fn nested_mut(&mut self, path: &str) -> Result<RecordViewMut<'_>, RecordError> {
        self.reborrow().into_nested_mut(path)
    }

    /// Like [`nested_mut`](Self::nested_mut), keeping the parent's lifetime.
    pub fn into_nested_mut(self, path: &str) -> Result<RecordViewMut<'a>, RecordError> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let index = record_index(self.layout, head)?;
        let Self {
            layout,
            spans,
            orders,
            buf,
        } = self;
        let FieldKind::Record(inner) = layout.fields()[index].kind() else {
            return Err(RecordError::NotARecord(head.to_string()));
        };
        let child = RecordViewMut {
            layout: inner,
            spans: inner.fixed_spans(),
            orders: &mut orders.nested[index],
            buf: &mut buf[spans[index].range()],
        };
        match rest {
            Some(rest) => child.into_nested_mut(rest),
            None => Ok(child),
        }
    }

    /// Writes a field or bitfield member.
    ///
    /// Bitfield members keep only the low `width` bits of the value and
    /// leave sibling bits untouched. Array fields take an array of matching
    /// length, or a scalar that is written to every element. Tagged fields
    /// take a symbol (`Value::Text` / `Value::Tag`) or a raw member value.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        let value = value.into();
        match path.rsplit_once('.') {
            Some((parent, leaf)) => self.nested_mut(parent)?.write(leaf, &value),
            None => self.write(path, &value),
        }
    }

    pub fn set_elements<T: Primitive>(&mut self, path: &str, items: &[T]) -> Result<(), RecordError> {
        self.set(path, Value::array(items))
    }

    /// Copies a structurally identical record into a nested record field,
    /// converting byte order where the two differ.
    pub fn set_record(&mut self, path: &str, source: RecordView<'_>) -> Result<(), RecordError> {
        let target = self.nested_mut(path)?;
        if **target.layout != **source.layout {
            return Err(RecordError::LayoutMismatch {
                field: path.to_string(),
                expected: target.layout.name().to_string(),
                actual: source.layout.name().to_string(),
            });
        }
        target.buf.copy_from_slice(source.buf);
        convert(target.layout, target.spans, source.orders, target.orders, target.buf);
        Ok(())
    }

    /// Re-expresses every scalar in `order`, nested records included.
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        let target = Orders::uniform(self.layout, order);
        convert(self.layout, self.spans, self.orders, &target, self.buf);
        *self.orders = target;
    }

    fn write(&mut self, name: &str, value: &Value) -> Result<(), RecordError> {
        let order = self.orders.order;
        match self.layout.slot(name) {
            None => Err(RecordError::UnknownField(name.to_string())),
            Some(Slot::Bits(j)) => {
                let member = &self.layout.bit_members()[j];
                let bits = match value {
                    Value::UInt(u) | Value::Tag { raw: u, .. } => *u,
                    Value::Int(i) => *i as u64,
                    other => {
                        return Err(RecordError::TypeMismatch {
                            field: name.to_string(),
                            expected: "integer".to_string(),
                            found: other.kind().to_string(),
                        });
                    }
                };
                let bytes = &mut self.buf[self.spans[member.storage()].range()];
                let mask = member.mask() << member.offset();
                let storage = codec::read_raw(order, bytes);
                let storage = (storage & !mask) | ((bits & member.mask()) << member.offset());
                codec::write_raw(order, bytes, storage);
                Ok(())
            }
            Some(Slot::Field(index)) => {
                let field = &self.layout.fields()[index];
                let span = self.spans[index];
                match field.kind() {
                    FieldKind::Record(_) => Err(RecordError::IsRecord(name.to_string())),
                    FieldKind::Bits { ty } => {
                        codec::write_scalar(name, *ty, order, &mut self.buf[span.range()], value)
                    }
                    FieldKind::Tagged { ty, tags } => {
                        let raw = match value.as_symbol() {
                            Some(symbol) => {
                                tags.value_of(symbol)
                                    .ok_or_else(|| RecordError::UnknownSymbol {
                                        tags: tags.name().to_string(),
                                        symbol: symbol.to_string(),
                                    })?
                            }
                            None => {
                                let raw = codec::integer_bits(name, *ty, value)?;
                                if !tags.contains_raw(raw) {
                                    return Err(RecordError::InvalidTag {
                                        field: name.to_string(),
                                        tags: tags.name().to_string(),
                                        raw,
                                    });
                                }
                                raw
                            }
                        };
                        let raw = codec::integer_bits(name, *ty, &Value::UInt(raw))?;
                        codec::write_raw(order, &mut self.buf[span.range()], raw);
                        Ok(())
                    }
                    FieldKind::Scalar { ty, .. } => {
                        let width = ty.width();
                        let mut scratch = vec![0u8; span.len()];
                        match value {
                            Value::Array(items) => {
                                if items.len() != span.count {
                                    return Err(RecordError::ShapeMismatch {
                                        field: name.to_string(),
                                        expected: span.count,
                                        actual: items.len(),
                                    });
                                }
                                for (element, item) in scratch.chunks_exact_mut(width).zip(items) {
                                    codec::write_scalar(name, *ty, order, element, item)?;
                                }
                            }
                            scalar => {
                                for element in scratch.chunks_exact_mut(width) {
                                    codec::write_scalar(name, *ty, order, element, scalar)?;
                                }
                            }
                        }
                        self.buf[span.range()].copy_from_slice(&scratch);
                        Ok(())
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// An owned record instance.
#[derive(Debug, Clone)]
pub struct Record {
    layout: Arc<RecordLayout>,
    spans: Vec<Span>,
    orders: Orders,
    buf: Vec<u8>,
}

impl Record {
    /// A little-endian instance with the layout's defaults applied.
    pub fn new(layout: &Arc<RecordLayout>) -> Self {
        Self::with_order(layout, ByteOrder::default())
    }

    /// An instance in `order` with the layout's defaults applied. Variable
    /// fields get zero elements.
    pub fn with_order(layout: &Arc<RecordLayout>, order: ByteOrder) -> Self {
        let mut record = Self::zeroed(layout);
        record.set_byte_order(order);
        record.apply_defaults();
        record
    }

    /// An instance whose variable fields have the element counts in
    /// `shapes`.
    pub fn with_shapes(
        layout: &Arc<RecordLayout>,
        order: ByteOrder,
        shapes: &Shapes,
    ) -> Result<Self, RecordError> {
        let (spans, size) = layout.spans_for(shapes)?;
        let mut record = Self {
            layout: Arc::clone(layout),
            spans,
            orders: Orders::uniform(layout, order),
            buf: vec![0; size],
        };
        record.apply_defaults();
        Ok(record)
    }

    /// Decodes a fixed-size record from `bytes`.
    pub fn from_bytes(
        layout: &Arc<RecordLayout>,
        order: ByteOrder,
        bytes: &[u8],
    ) -> Result<Self, RecordError> {
        let mut record = Self::with_order(layout, order);
        record.decode(bytes)?;
        Ok(record)
    }

    /// All-zero instance, no defaults.
    pub(crate) fn zeroed(layout: &Arc<RecordLayout>) -> Self {
        Self {
            layout: Arc::clone(layout),
            spans: layout.fixed_spans().to_vec(),
            orders: Orders::uniform(layout, ByteOrder::default()),
            buf: vec![0; layout.min_size()],
        }
    }

    fn apply_defaults(&mut self) {
        let layout = Arc::clone(&self.layout);
        for (path, value) in layout.defaults() {
            // Checked against a scratch instance when the layout was built.
            self.set(path, value.clone())
                .expect("layout defaults are validated at build time");
        }
    }

    pub fn view(&self) -> RecordView<'_> {
        RecordView {
            layout: &self.layout,
            spans: &self.spans,
            orders: &self.orders,
            buf: &self.buf,
        }
    }

    pub fn view_mut(&mut self) -> RecordViewMut<'_> {
        RecordViewMut {
            layout: &self.layout,
            spans: &self.spans,
            orders: &mut self.orders,
            buf: &mut self.buf,
        }
    }

    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    pub fn name(&self) -> &str {
        self.layout.name()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.orders.order
    }

    /// Encoded length. Fixed when the record is created.
    pub fn byte_size(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn encode(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Replaces the contents with `bytes`, which must be exactly
    /// [`byte_size`](Self::byte_size) long and in this record's byte order.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<(), RecordError> {
        if bytes.len() != self.buf.len() {
            return Err(RecordError::SizeMismatch {
                expected: self.buf.len(),
                actual: bytes.len(),
                bytes: bytes.to_vec(),
            });
        }
        self.buf.copy_from_slice(bytes);
        Ok(())
    }

    pub fn len_of(&self, path: &str) -> Result<usize, RecordError> {
        self.view().len_of(path)
    }

    pub fn get(&self, path: &str) -> Result<Value, RecordError> {
        self.view().get(path)
    }

    pub fn get_as<T: Primitive>(&self, path: &str) -> Result<T, RecordError> {
        self.view().get_as(path)
    }

    pub fn get_raw(&self, path: &str) -> Result<u64, RecordError> {
        self.view().get_raw(path)
    }

    pub fn elements<T: Primitive>(&self, path: &str) -> Result<Vec<T>, RecordError> {
        self.view().elements(path)
    }

    pub fn nested(&self, path: &str) -> Result<RecordView<'_>, RecordError> {
        self.view().nested(path)
    }

    pub fn nested_mut(&mut self, path: &str) -> Result<RecordViewMut<'_>, RecordError> {
        self.view_mut().into_nested_mut(path)
    }

    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        self.view_mut().set(path, value)
    }

    pub fn set_elements<T: Primitive>(&mut self, path: &str, items: &[T]) -> Result<(), RecordError> {
        self.view_mut().set_elements(path, items)
    }

    pub fn set_record(&mut self, path: &str, source: RecordView<'_>) -> Result<(), RecordError> {
        self.view_mut().set_record(path, source)
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.view_mut().set_byte_order(order);
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.view() == other.view()
    }
}

// ---------------------------------------------------------------------------
// Dump
// ---------------------------------------------------------------------------

fn dump(view: &RecordView<'_>, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    for member in view.layout.members() {
        match member {
            Member::Bits(bits) => {
                let storage = &view.layout.fields()[bits.storage()];
                let ty = storage.kind().scalar_type().map(|t| t.to_string()).unwrap_or_default();
                let hi = bits.offset() + bits.width() - 1;
                let value = view.read(bits.name(), false).map_err(|_| fmt::Error)?;
                writeln!(f, "{indent}{}: {ty}({hi}:{}) = {value}", bits.name(), bits.offset())?;
            }
            Member::Field(field) => match field.kind() {
                FieldKind::Record(inner) => {
                    let nested = view.nested(field.name()).map_err(|_| fmt::Error)?;
                    writeln!(f, "{indent}{}: {} ({})", field.name(), inner.name(), nested.byte_order())?;
                    dump(&nested, f, depth + 1)?;
                }
                kind => {
                    let ty = kind.scalar_type().map(|t| t.to_string()).unwrap_or_default();
                    let value = match view.read(field.name(), true) {
                        Ok(value) => value.to_string(),
                        Err(_) => format!("{} (invalid)", view.read(field.name(), false).map_err(|_| fmt::Error)?),
                    };
                    writeln!(f, "{indent}{}: {ty} = {value}", field.name())?;
                }
            },
        }
    }
    Ok(())
}

impl fmt::Display for RecordView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} bytes, {})",
            self.layout.name(),
            self.byte_size(),
            self.byte_order()
        )?;
        dump(self, f, 1)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.view().fmt(f)
    }
}

/// Serialized as a map of member name to value, nested records as nested
/// maps. Tagged fields holding a non-member value fall back to the raw
/// integer.
impl Serialize for RecordView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for member in self.layout.members() {
            match member {
                Member::Bits(bits) => {
                    let value = self.read(bits.name(), false).map_err(serde::ser::Error::custom)?;
                    map.serialize_entry(bits.name(), &value)?;
                }
                Member::Field(field) => {
                    if let FieldKind::Record(_) = field.kind() {
                        let nested = self.nested(field.name()).map_err(serde::ser::Error::custom)?;
                        map.serialize_entry(field.name(), &nested)?;
                        continue;
                    }
                    let value = self
                        .read(field.name(), true)
                        .or_else(|_| self.read(field.name(), false))
                        .map_err(serde::ser::Error::custom)?;
                    map.serialize_entry(field.name(), &value)?;
                }
            }
        }
        map.end()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.view().serialize(serializer)
    }
}
