//! Scalar types, byte order, tag sets, and the dynamic [`Value`] carried in
//! and out of record accessors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// A primitive scalar stored in a record.
///
/// Every type has a fixed byte width. Integer types can also be used as the
/// storage unit of a bitfield group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// Fixed-length byte string, zero padded.
    Bytes(usize),
}

impl FieldType {
    /// Width of one element in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
            Self::Bytes(n) => n,
        }
    }

    /// Width of one element in bits.
    pub const fn bits(self) -> u32 {
        (self.width() * 8) as u32
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64 | Self::Bytes(_))
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Whether the element is affected by byte order at all.
    pub const fn is_order_sensitive(self) -> bool {
        !matches!(self, Self::Bytes(_)) && self.width() > 1
    }

    /// Largest value an integer of this type can hold, as raw `u64`.
    pub(crate) const fn max_unsigned(self) -> u64 {
        match self.bits() {
            64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::I8 => write!(f, "i8"),
            Self::U16 => write!(f, "u16"),
            Self::I16 => write!(f, "i16"),
            Self::U32 => write!(f, "u32"),
            Self::I32 => write!(f, "i32"),
            Self::U64 => write!(f, "u64"),
            Self::I64 => write!(f, "i64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Bytes(n) => write!(f, "bytes[{n}]"),
        }
    }
}

// ---------------------------------------------------------------------------
// ByteOrder
// ---------------------------------------------------------------------------

/// Byte order applied to every multi-byte scalar of a record.
///
/// Parsed from and serialized as the usual tokens: `"<"` little endian,
/// `">"` big endian, and `"="` / `"|"` for the host's native order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// The host's native byte order.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// The single-character token for this order.
    pub const fn token(self) -> char {
        match self {
            Self::Little => '<',
            Self::Big => '>',
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Error returned when a byte-order token can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown byte order `{0}` (expected one of <, >, =, |)")]
pub struct ParseByteOrderError(String);

impl FromStr for ByteOrder {
    type Err = ParseByteOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" | "little" => Ok(Self::Little),
            ">" | "!" | "big" => Ok(Self::Big),
            "=" | "|" | "native" => Ok(Self::native()),
            other => Err(ParseByteOrderError(other.to_string())),
        }
    }
}

impl Serialize for ByteOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TagSet
// ---------------------------------------------------------------------------

/// A named table of symbolic values, used to interpret an integer field as
/// an enumeration (packet types, ack codes, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    name: String,
    entries: Vec<(String, u64)>,
}

impl TagSet {
    /// Creates a tag set. If a symbol repeats, the first entry wins.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (S, u64)>,
    ) -> Self {
        let mut table: Vec<(String, u64)> = Vec::new();
        for (symbol, raw) in entries {
            let symbol = symbol.into();
            if !table.iter().any(|(s, _)| *s == symbol) {
                table.push((symbol, raw));
            }
        }
        Self {
            name: name.into(),
            entries: table,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value of `symbol`, if it is a member.
    pub fn value_of(&self, symbol: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, raw)| *raw)
    }

    /// First symbol mapped to `raw`, if any.
    pub fn symbol_of(&self, raw: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, r)| *r == raw)
            .map(|(s, _)| s.as_str())
    }

    pub fn contains_raw(&self, raw: u64) -> bool {
        self.symbol_of(raw).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(s, raw)| (s.as_str(), *raw))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically typed field value.
///
/// Getters return the variant matching the field: unsigned integers (and
/// bitfield members) as `UInt`, signed as `Int`, floats as `Float`, byte
/// strings as `Bytes`, tagged fields as `Tag`, and arrays as `Array`.
/// Setters are more lenient: any integer variant is accepted for an integer
/// field as long as it fits, and `Text` names a symbol of a tagged field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Float(f64),
    Text(String),
    Tag { symbol: String, raw: u64 },
    Array(Vec<Value>),
    Bytes(Vec<u8>),
}

impl Value {
    /// Builds an array value from a slice of primitives.
    pub fn array<T: Primitive>(items: &[T]) -> Self {
        Self::Array(items.iter().map(|item| item.into_value()).collect())
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(u) => Some(*u),
            Self::Int(i) => u64::try_from(*i).ok(),
            Self::Tag { raw, .. } => Some(*raw),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            Self::Tag { raw, .. } => i64::try_from(*raw).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::UInt(u) => Some(*u as f64),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The symbol of a `Tag` or the contents of a `Text`.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Tag { symbol, .. } => Some(symbol),
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::UInt(_) => "unsigned integer",
            Self::Int(_) => "signed integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Tag { .. } => "tag",
            Self::Array(_) => "array",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(u) => write!(f, "{u}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Tag { symbol, raw } => write!(f, "{symbol} ({raw:#x})"),
            Self::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! value_from {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::$variant(v as $target)
                }
            }
        )*
    };
}

value_from!(UInt as u64: u8, u16, u32, u64, usize);
value_from!(Int as i64: i8, i16, i32, i64, isize);
value_from!(Float as f64: f32, f64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Primitive
// ---------------------------------------------------------------------------

/// Rust scalar types that map onto a [`FieldType`].
///
/// Used by the typed accessors (`get_as`, `elements`, `set_elements`).
/// Conversions never wrap: reading `300` as a `u8` is a type mismatch.
pub trait Primitive: Copy + Sized + 'static {
    const FIELD_TYPE: FieldType;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! primitive_int {
    ($($t:ty => $ft:ident, $variant:ident, $wide:ty);* $(;)?) => {
        $(
            impl Primitive for $t {
                const FIELD_TYPE: FieldType = FieldType::$ft;

                fn into_value(self) -> Value {
                    Value::$variant(self as $wide)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::UInt(u) => <$t>::try_from(*u).ok(),
                        Value::Int(i) => <$t>::try_from(*i).ok(),
                        Value::Tag { raw, .. } => <$t>::try_from(*raw).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

primitive_int! {
    u8 => U8, UInt, u64;
    u16 => U16, UInt, u64;
    u32 => U32, UInt, u64;
    u64 => U64, UInt, u64;
    i8 => I8, Int, i64;
    i16 => I16, Int, i64;
    i32 => I32, Int, i64;
    i64 => I64, Int, i64;
}

impl Primitive for f32 {
    const FIELD_TYPE: FieldType = FieldType::F32;

    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|x| x as f32)
    }
}

impl Primitive for f64 {
    const FIELD_TYPE: FieldType = FieldType::F64;

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// Element counts for the variable-shape fields of one record instance.
///
/// Fields without an entry get zero elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shapes(BTreeMap<String, usize>);

impl Shapes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, count: usize) -> Self {
        self.0.insert(field.into(), count);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, count: usize) {
        self.0.insert(field.into(), count);
    }

    pub fn get(&self, field: &str) -> Option<usize> {
        self.0.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, usize)> for Shapes {
    fn from_iter<I: IntoIterator<Item = (K, usize)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
