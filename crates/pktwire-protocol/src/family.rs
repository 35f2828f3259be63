//! Packet families: the shared header and the hooks that read and write it.

use std::collections::BTreeMap;
use std::sync::Arc;

use pktwire_record::{Record, RecordError, RecordLayout, Shapes, Value};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// HeaderParams
// ---------------------------------------------------------------------------

/// Named values handed to the header hooks: the local address, a
/// destination, a sequence number, ...
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderParams(BTreeMap<String, Value>);

impl HeaderParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Integer value of `key`, if present and integral.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    /// `self` overlaid with `overrides`; keys in `overrides` win.
    pub fn merged(&self, overrides: &HeaderParams) -> HeaderParams {
        let mut merged = self.0.clone();
        merged.extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        HeaderParams(merged)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for HeaderParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// What a family learned from a received base header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Total packet length, header included.
    pub size: usize,
    /// Raw value of the type field.
    pub discriminant: u64,
    /// Element counts for the packet's variable fields.
    pub shapes: Shapes,
    /// `false` if the packet should be consumed and dropped, e.g. because
    /// it is addressed elsewhere.
    pub valid: bool,
}

// ---------------------------------------------------------------------------
// PacketFamily
// ---------------------------------------------------------------------------

/// The shared framing of a group of packet types.
///
/// Every packet type of a family starts with the family's base layout. A
/// channel reads exactly that many bytes first, then asks the family what
/// the header says.
pub trait PacketFamily: Send + Sync {
    /// The leading fields every packet of this family carries. Must have a
    /// fixed size.
    fn base_layout(&self) -> &Arc<RecordLayout>;

    fn name(&self) -> &str {
        self.base_layout().name()
    }

    /// Writes the total packet length into the header.
    fn set_size(&self, packet: &mut Record, size: usize) -> Result<(), RecordError>;

    /// Writes the packet type discriminant into the header.
    fn set_type(&self, packet: &mut Record, discriminant: u64) -> Result<(), RecordError>;

    /// Interprets a received base header.
    fn parse_header(
        &self,
        base: &Record,
        params: &HeaderParams,
    ) -> Result<HeaderInfo, ProtocolError>;

    /// Fills in header fields just before a packet is sent.
    fn build_header(
        &self,
        _packet: &mut Record,
        _params: &HeaderParams,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StandardFamily
// ---------------------------------------------------------------------------

/// A [`PacketFamily`] driven by field paths.
///
/// ```rust
/// use pktwire_protocol::StandardFamily;
/// use pktwire_record::{FieldType, RecordLayout};
///
/// let hdr = RecordLayout::builder("pktheader")
///     .field("size", FieldType::U16)
///     .field("dest", FieldType::U8)
///     .field("src", FieldType::U8)
///     .field("ptype", FieldType::U8)
///     .build()
///     .unwrap();
/// let base = RecordLayout::builder("base").record("hdr", &hdr).build().unwrap();
///
/// let family = StandardFamily::new(&base)
///     .size_field("hdr.size")
///     .type_field("hdr.ptype")
///     .address_fields("hdr.dest", "hdr.src");
/// ```
#[derive(Debug, Clone)]
pub struct StandardFamily {
    base: Arc<RecordLayout>,
    size_path: String,
    type_path: String,
    shape_paths: Vec<(String, String)>,
    address: Option<(String, String)>,
}

/// Destination used when the caller doesn't pass `dest`.
pub const BROADCAST: u64 = 0xFF;

impl StandardFamily {
    /// A family reading `size` and `type` at the top level of `base`.
    pub fn new(base: &Arc<RecordLayout>) -> Self {
        Self {
            base: Arc::clone(base),
            size_path: "size".to_string(),
            type_path: "type".to_string(),
            shape_paths: Vec::new(),
            address: None,
        }
    }

    pub fn size_field(mut self, path: impl Into<String>) -> Self {
        self.size_path = path.into();
        self
    }

    pub fn type_field(mut self, path: impl Into<String>) -> Self {
        self.type_path = path.into();
        self
    }

    /// The element count of variable field `field` is read from the base
    /// header field at `count_path` on receive, and written there on send.
    pub fn shape_field(mut self, field: impl Into<String>, count_path: impl Into<String>) -> Self {
        self.shape_paths.push((field.into(), count_path.into()));
        self
    }

    /// Enables addressing. On send, `dest` is set from the `dest` param
    /// (default [`BROADCAST`]) and `src` from the `addr` param. On receive,
    /// a packet whose `dest` shares no bits with the `addr` param is marked
    /// invalid.
    pub fn address_fields(mut self, dest: impl Into<String>, src: impl Into<String>) -> Self {
        self.address = Some((dest.into(), src.into()));
        self
    }
}

impl PacketFamily for StandardFamily {
    fn base_layout(&self) -> &Arc<RecordLayout> {
        &self.base
    }

    fn set_size(&self, packet: &mut Record, size: usize) -> Result<(), RecordError> {
        packet.set(&self.size_path, size)
    }

    fn set_type(&self, packet: &mut Record, discriminant: u64) -> Result<(), RecordError> {
        packet.set(&self.type_path, discriminant)
    }

    fn parse_header(
        &self,
        base: &Record,
        params: &HeaderParams,
    ) -> Result<HeaderInfo, ProtocolError> {
        let size = usize::try_from(base.get_raw(&self.size_path)?)
            .map_err(|_| ProtocolError::Header("size field does not fit in usize".to_string()))?;
        let discriminant = base.get_raw(&self.type_path)?;

        let mut shapes = Shapes::new();
        for (field, path) in &self.shape_paths {
            let count = usize::try_from(base.get_raw(path)?).map_err(|_| {
                ProtocolError::Header(format!("element count of `{field}` does not fit in usize"))
            })?;
            shapes.insert(field.clone(), count);
        }

        let valid = match (&self.address, params.get_u64("addr")) {
            (Some((dest, _)), Some(addr)) => base.get_raw(dest)? & addr != 0,
            _ => true,
        };

        Ok(HeaderInfo {
            size,
            discriminant,
            shapes,
            valid,
        })
    }

    fn build_header(
        &self,
        packet: &mut Record,
        params: &HeaderParams,
    ) -> Result<(), ProtocolError> {
        for (field, path) in &self.shape_paths {
            if packet.layout().contains(field) {
                let count = packet.len_of(field)?;
                packet.set(path, count)?;
            }
        }
        let Some((dest, src)) = &self.address else {
            return Ok(());
        };
        packet.set(dest, params.get_u64("dest").unwrap_or(BROADCAST))?;
        if let Some(addr) = params.get_u64("addr") {
            packet.set(src, addr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pktwire_record::FieldType;

    use super::*;

    fn family() -> StandardFamily {
        let hdr = RecordLayout::builder("pktheader")
            .field("size", FieldType::U16)
            .field("dest", FieldType::U8)
            .field("src", FieldType::U8)
            .field("ptype", FieldType::U8)
            .build()
            .unwrap();
        let base = RecordLayout::builder("base")
            .record("hdr", &hdr)
            .field("len_payload", FieldType::U16)
            .build()
            .unwrap();
        StandardFamily::new(&base)
            .size_field("hdr.size")
            .type_field("hdr.ptype")
            .shape_field("payload", "len_payload")
            .address_fields("hdr.dest", "hdr.src")
    }

    #[test]
    fn test_params_merge_prefers_overrides() {
        let call = HeaderParams::new().with("dest", 0x0Fu8).with("addr", 0x02u8);
        let channel = HeaderParams::new().with("addr", 0x01u8);
        let merged = call.merged(&channel);
        assert_eq!(merged.get_u64("addr"), Some(0x01));
        assert_eq!(merged.get_u64("dest"), Some(0x0F));
    }

    #[test]
    fn test_parse_header_reads_size_type_and_shapes() {
        let family = family();
        let mut base = Record::new(family.base_layout());
        base.set("hdr.size", 107u16).unwrap();
        base.set("hdr.ptype", 2u8).unwrap();
        base.set("len_payload", 25u16).unwrap();

        let info = family.parse_header(&base, &HeaderParams::new()).unwrap();
        assert_eq!(info.size, 107);
        assert_eq!(info.discriminant, 2);
        assert_eq!(info.shapes.get("payload"), Some(25));
        assert!(info.valid);
    }

    #[test]
    fn test_parse_header_filters_by_address() {
        let family = family();
        let mut base = Record::new(family.base_layout());
        base.set("hdr.dest", 0x02u8).unwrap();

        let mine = HeaderParams::new().with("addr", 0x02u8);
        let other = HeaderParams::new().with("addr", 0x01u8);
        assert!(family.parse_header(&base, &mine).unwrap().valid);
        assert!(!family.parse_header(&base, &other).unwrap().valid);
    }

    #[test]
    fn test_build_header_stamps_addresses() {
        let family = family();
        let mut packet = Record::new(family.base_layout());
        family
            .build_header(&mut packet, &HeaderParams::new().with("addr", 0x01u8))
            .unwrap();
        assert_eq!(packet.get_raw("hdr.dest").unwrap(), BROADCAST);
        assert_eq!(packet.get_raw("hdr.src").unwrap(), 0x01);

        family
            .build_header(&mut packet, &HeaderParams::new().with("dest", 0x0Fu8))
            .unwrap();
        assert_eq!(packet.get_raw("hdr.dest").unwrap(), 0x0F);
    }
}
