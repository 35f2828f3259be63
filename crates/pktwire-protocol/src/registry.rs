//! Discriminant → packet type lookup for one family.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use pktwire_record::{ByteOrder, Record, RecordLayout, Shapes, TagSet};

use crate::{PacketFamily, ProtocolError, RegistrationError};

/// One registered packet type.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketType {
    name: String,
    discriminant: u64,
    layout: Arc<RecordLayout>,
}

impl PacketType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discriminant(&self) -> u64 {
        self.discriminant
    }

    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }
}

/// The packet types of one [`PacketFamily`], keyed by discriminant.
///
/// Each layout is looked up in a [`TagSet`] by its own name to find its
/// discriminant, so a family's type tags and its packet layouts are declared
/// side by side:
///
/// ```rust
/// use std::sync::Arc;
/// use pktwire_protocol::{PacketTypeRegistry, StandardFamily};
/// use pktwire_record::{FieldType, RecordLayout, TagSet};
///
/// let base = RecordLayout::builder("base")
///     .field("size", FieldType::U16)
///     .field("type", FieldType::U8)
///     .build()
///     .unwrap();
/// let ping = RecordLayout::builder("ping")
///     .field("size", FieldType::U16)
///     .field("type", FieldType::U8)
///     .field("seq", FieldType::U32)
///     .build()
///     .unwrap();
/// let tags = TagSet::new("ptype", [("ping", 1)]);
///
/// let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base));
/// registry.register(&ping, &tags).unwrap();
/// assert_eq!(registry.resolve(1).unwrap().name(), "ping");
/// ```
#[derive(Clone)]
pub struct PacketTypeRegistry {
    family: Arc<dyn PacketFamily>,
    types: Vec<PacketType>,
    by_discriminant: BTreeMap<u64, usize>,
    by_name: HashMap<String, usize>,
}

impl PacketTypeRegistry {
    pub fn new(family: impl PacketFamily + 'static) -> Self {
        Self::with_family(Arc::new(family))
    }

    pub fn with_family(family: Arc<dyn PacketFamily>) -> Self {
        Self {
            family,
            types: Vec::new(),
            by_discriminant: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn family(&self) -> &Arc<dyn PacketFamily> {
        &self.family
    }

    /// Bytes read before the packet type is known.
    pub fn header_size(&self) -> usize {
        self.family.base_layout().min_size()
    }

    /// Registers `layout` under the discriminant `tags` gives its name.
    ///
    /// Registering an identical type again is a no-op. Any other clash on
    /// name or discriminant is an error, as is a family whose base header
    /// has variable-length fields.
    pub fn register(
        &mut self,
        layout: &Arc<RecordLayout>,
        tags: &TagSet,
    ) -> Result<&PacketType, RegistrationError> {
        let family = self.family.name().to_string();
        let packet = layout.name().to_string();
        if !self.family.base_layout().is_fixed() {
            return Err(RegistrationError::VariableHeader { family });
        }

        let discriminant =
            tags.value_of(&packet)
                .ok_or_else(|| RegistrationError::MissingDiscriminant {
                    family: family.clone(),
                    packet: packet.clone(),
                })?;
        if !layout.starts_with(self.family.base_layout()) {
            return Err(RegistrationError::HeaderMismatch { family, packet });
        }

        if let Some(&index) = self.by_name.get(&packet) {
            let existing = &self.types[index];
            if existing.discriminant == discriminant && *existing.layout == **layout {
                return Ok(existing);
            }
            return Err(RegistrationError::DuplicateName { family, packet });
        }
        if let Some(&index) = self.by_discriminant.get(&discriminant) {
            return Err(RegistrationError::DuplicateDiscriminant {
                family,
                discriminant,
                existing: self.types[index].name.clone(),
                packet,
            });
        }

        let index = self.types.len();
        self.types.push(PacketType {
            name: packet.clone(),
            discriminant,
            layout: Arc::clone(layout),
        });
        self.by_discriminant.insert(discriminant, index);
        self.by_name.insert(packet, index);
        tracing::debug!(
            family = %family,
            packet = %self.types[index].name,
            discriminant,
            "packet type registered"
        );
        Ok(&self.types[index])
    }

    /// Registers every layout, or none of them if any fails.
    pub fn register_all<'a>(
        &mut self,
        layouts: impl IntoIterator<Item = &'a Arc<RecordLayout>>,
        tags: &TagSet,
    ) -> Result<(), RegistrationError> {
        let mut staged = self.clone();
        for layout in layouts {
            staged.register(layout, tags)?;
        }
        *self = staged;
        Ok(())
    }

    pub fn resolve(&self, discriminant: u64) -> Result<&PacketType, ProtocolError> {
        self.by_discriminant
            .get(&discriminant)
            .map(|&index| &self.types[index])
            .ok_or_else(|| ProtocolError::UnknownPacketType {
                family: self.family.name().to_string(),
                key: format!("{discriminant:#x}"),
            })
    }

    pub fn get(&self, name: &str) -> Result<&PacketType, ProtocolError> {
        self.by_name
            .get(name)
            .map(|&index| &self.types[index])
            .ok_or_else(|| ProtocolError::UnknownPacketType {
                family: self.family.name().to_string(),
                key: name.to_string(),
            })
    }

    /// A new packet of type `name` with its type and size fields filled in.
    pub fn create(
        &self,
        name: &str,
        order: ByteOrder,
        shapes: &Shapes,
    ) -> Result<Record, ProtocolError> {
        self.instantiate(self.get(name)?, order, shapes)
    }

    /// Like [`create`](Self::create), for an already resolved type.
    pub fn instantiate(
        &self,
        packet_type: &PacketType,
        order: ByteOrder,
        shapes: &Shapes,
    ) -> Result<Record, ProtocolError> {
        let mut packet = Record::with_shapes(&packet_type.layout, order, shapes)?;
        self.family.set_type(&mut packet, packet_type.discriminant)?;
        let size = packet.byte_size();
        self.family.set_size(&mut packet, size)?;
        Ok(packet)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered types in discriminant order.
    pub fn iter(&self) -> impl Iterator<Item = &PacketType> {
        self.by_discriminant.values().map(|&index| &self.types[index])
    }
}

impl std::fmt::Debug for PacketTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketTypeRegistry")
            .field("family", &self.family.name())
            .field("types", &self.types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pktwire_record::FieldType;

    use super::*;
    use crate::StandardFamily;

    fn base() -> Arc<RecordLayout> {
        RecordLayout::builder("base")
            .field("size", FieldType::U16)
            .field("type", FieldType::U8)
            .build()
            .unwrap()
    }

    fn packet(name: &str, extra: FieldType) -> Arc<RecordLayout> {
        RecordLayout::builder(name)
            .field("size", FieldType::U16)
            .field("type", FieldType::U8)
            .field("data", extra)
            .build()
            .unwrap()
    }

    fn tags() -> TagSet {
        TagSet::new("ptype", [("ping", 1), ("pong", 2), ("alias", 1)])
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base()));
        registry.register(&packet("ping", FieldType::U8), &tags()).unwrap();
        registry.register(&packet("pong", FieldType::U32), &tags()).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.header_size(), 3);
        assert_eq!(registry.resolve(2).unwrap().name(), "pong");
        assert_eq!(registry.get("ping").unwrap().discriminant(), 1);
        assert!(matches!(
            registry.resolve(9),
            Err(ProtocolError::UnknownPacketType { .. })
        ));
    }

    #[test]
    fn test_duplicate_discriminant_is_rejected() {
        let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base()));
        registry.register(&packet("ping", FieldType::U8), &tags()).unwrap();
        let err = registry
            .register(&packet("alias", FieldType::U8), &tags())
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::DuplicateDiscriminant { discriminant: 1, ref existing, .. } if existing == "ping"
        ));
    }

    #[test]
    fn test_identical_registration_is_idempotent() {
        let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base()));
        let layouts = [packet("ping", FieldType::U8), packet("pong", FieldType::U8)];
        registry.register_all(&layouts, &tags()).unwrap();
        registry.register_all(&layouts, &tags()).unwrap();
        assert_eq!(registry.len(), 2);

        let err = registry
            .register(&packet("ping", FieldType::U16), &tags())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateName { .. }));
    }

    #[test]
    fn test_register_all_is_atomic() {
        let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base()));
        let layouts = [packet("ping", FieldType::U8), packet("alias", FieldType::U8)];
        assert!(registry.register_all(&layouts, &tags()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_discriminant_and_header() {
        let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base()));
        let err = registry
            .register(&packet("unknown", FieldType::U8), &tags())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::MissingDiscriminant { .. }));

        let headless = RecordLayout::builder("ping")
            .field("data", FieldType::U32)
            .build()
            .unwrap();
        let err = registry.register(&headless, &tags()).unwrap_err();
        assert!(matches!(err, RegistrationError::HeaderMismatch { .. }));
    }

    #[test]
    fn test_variable_base_header_is_rejected() {
        let base = RecordLayout::builder("varbase")
            .field("size", FieldType::U16)
            .field("type", FieldType::U8)
            .vector("extra", FieldType::U8)
            .build()
            .unwrap();
        let ping = RecordLayout::builder("ping")
            .field("size", FieldType::U16)
            .field("type", FieldType::U8)
            .vector("extra", FieldType::U8)
            .build()
            .unwrap();
        let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base));
        let err = registry.register(&ping, &tags()).unwrap_err();
        assert!(matches!(err, RegistrationError::VariableHeader { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_create_stamps_type_and_size() {
        let mut registry = PacketTypeRegistry::new(StandardFamily::new(&base()));
        registry.register(&packet("pong", FieldType::U32), &tags()).unwrap();

        let pong = registry
            .create("pong", ByteOrder::Big, &Shapes::new())
            .unwrap();
        assert_eq!(pong.get_raw("type").unwrap(), 2);
        assert_eq!(pong.get_raw("size").unwrap(), 7);
        assert_eq!(pong.as_bytes()[..3], [0x00, 0x07, 0x02]);
    }
}
