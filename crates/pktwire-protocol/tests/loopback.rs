//! Packet exchange over in-memory transports.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use pktwire_protocol::{
    ChannelConfig, HeaderParams, PacketChannel, PacketTypeRegistry, ProtocolError,
    RegistrationError, StandardFamily,
};
use pktwire_record::{ByteOrder, FieldType, Record, RecordError, RecordLayout, Shapes, TagSet};
use pktwire_transport::{Loopback, Transport};

// =========================================================================
// Fixtures
// =========================================================================

fn pktheader() -> Arc<RecordLayout> {
    RecordLayout::builder("pktheader")
        .field("size", FieldType::U16)
        .field("dest", FieldType::U8)
        .field("src", FieldType::U8)
        .field("ptype", FieldType::U8)
        .build()
        .unwrap()
}

fn ptypes() -> TagSet {
    TagSet::new(
        "ptype",
        [("command", 1u64), ("datapkt", 2), ("testpkt", 3), ("varpkt", 4)],
    )
}

fn command() -> Arc<RecordLayout> {
    RecordLayout::builder("command")
        .record("hdr", &pktheader())
        .bits("state1", FieldType::U16, 7)
        .bits("state2", FieldType::U16, 3)
        .bits("state3", FieldType::U16, 1)
        .build()
        .unwrap()
}

fn datapkt() -> Arc<RecordLayout> {
    RecordLayout::builder("datapkt")
        .record("hdr", &pktheader())
        .field("da", FieldType::U32)
        .field("db", FieldType::F64)
        .build()
        .unwrap()
}

fn family() -> StandardFamily {
    let base = RecordLayout::builder("pktbase")
        .record("hdr", &pktheader())
        .build()
        .unwrap();
    StandardFamily::new(&base)
        .size_field("hdr.size")
        .type_field("hdr.ptype")
        .address_fields("hdr.dest", "hdr.src")
}

fn registry() -> Arc<PacketTypeRegistry> {
    let mut registry = PacketTypeRegistry::new(family());
    registry
        .register_all(&[command(), datapkt()], &ptypes())
        .unwrap();
    Arc::new(registry)
}

fn channel(order: ByteOrder) -> PacketChannel<Loopback> {
    let config = ChannelConfig {
        byte_order: order,
        ..ChannelConfig::default()
    };
    PacketChannel::with_config(
        Loopback::new().with_timeout(Duration::from_millis(200)),
        registry(),
        config,
    )
}

fn no_params() -> HeaderParams {
    HeaderParams::new()
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn test_command_bitfields_survive_loopback() {
    let mut channel = channel(ByteOrder::Little);
    let mut cmd = channel
        .registry()
        .create("command", ByteOrder::Little, &Shapes::new())
        .unwrap();
    assert_eq!(cmd.byte_size(), 7);
    cmd.set("state1", 0xFFFBu16).unwrap();
    cmd.set("state2", 0x02u8).unwrap();
    cmd.set("state3", 0x00u8).unwrap();

    let received = channel.send_receive(&mut cmd, &no_params()).unwrap().unwrap();
    assert_eq!(received.name(), "command");
    assert_eq!(received.get_raw("state1").unwrap(), 0x7B);
    assert_eq!(received.get_raw("state2").unwrap(), 0x02);
    assert_eq!(received.get_raw("state3").unwrap(), 0x00);
}

#[test]
fn test_variable_payload_big_endian() {
    let hdr = pktheader();
    let base = RecordLayout::builder("varbase")
        .record("hdr", &hdr)
        .field("len_payload", FieldType::U16)
        .build()
        .unwrap();
    let varpkt = RecordLayout::builder("varpkt")
        .record("hdr", &hdr)
        .field("len_payload", FieldType::U16)
        .vector("payload", FieldType::F32)
        .build()
        .unwrap();
    let family = StandardFamily::new(&base)
        .size_field("hdr.size")
        .type_field("hdr.ptype")
        .shape_field("payload", "len_payload");
    let mut registry = PacketTypeRegistry::new(family);
    registry.register(&varpkt, &ptypes()).unwrap();
    let registry = Arc::new(registry);

    let config = ChannelConfig {
        byte_order: ByteOrder::Big,
        ..ChannelConfig::default()
    };
    let mut channel = PacketChannel::with_config(Loopback::new(), Arc::clone(&registry), config);

    let xs: Vec<f32> = (0..25).map(|i| i as f32 / 24.0).collect();
    let mut packet = registry
        .create("varpkt", ByteOrder::Big, &Shapes::new().with("payload", xs.len()))
        .unwrap();
    packet.set_elements("payload", &xs).unwrap();
    assert_eq!(packet.byte_size(), 7 + 25 * 4);

    let received = channel.send_receive(&mut packet, &no_params()).unwrap().unwrap();
    assert_eq!(received.get_raw("len_payload").unwrap(), 25);
    assert_eq!(received.elements::<f32>("payload").unwrap(), xs);
    assert_eq!(received.byte_order(), ByteOrder::Big);
}

#[test]
fn test_two_types_dispatch_by_discriminant() {
    let registry = registry();
    let mut channel = channel(ByteOrder::Big);

    let mut cmd = registry.create("command", ByteOrder::Big, &Shapes::new()).unwrap();
    cmd.set("state2", 5u8).unwrap();
    let mut data = registry.create("datapkt", ByteOrder::Big, &Shapes::new()).unwrap();
    data.set("da", 1234u32).unwrap();
    data.set("db", 2.5f64).unwrap();

    channel.send(&mut data, &no_params()).unwrap();
    channel.send(&mut cmd, &no_params()).unwrap();
    channel.send(&mut data, &no_params()).unwrap();

    let first = channel.receive().unwrap().unwrap();
    let second = channel.receive().unwrap().unwrap();
    let third = channel.receive().unwrap().unwrap();
    assert_eq!(first.name(), "datapkt");
    assert_eq!(first.get_raw("da").unwrap(), 1234);
    assert_eq!(second.name(), "command");
    assert_eq!(second.get_raw("state2").unwrap(), 5);
    assert_eq!(third, data);
}

#[test]
fn test_linked_pair_request_response() {
    let registry = registry();
    let (near, far) = Loopback::pair();
    let near = near.with_timeout(Duration::from_secs(2));
    let far = far.with_timeout(Duration::from_secs(2));

    let responder = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let mut channel = PacketChannel::new(far, registry);
            let mut packet = channel.receive().unwrap().unwrap();
            let da = packet.get_raw("da").unwrap();
            packet.set("da", da * 2).unwrap();
            channel.send(&mut packet, &no_params()).unwrap();
        })
    };

    let mut channel = PacketChannel::new(near, Arc::clone(&registry));
    let mut request = registry.create("datapkt", ByteOrder::Little, &Shapes::new()).unwrap();
    request.set("da", 21u32).unwrap();
    let reply = channel.send_receive(&mut request, &no_params()).unwrap().unwrap();
    assert_eq!(reply.get_raw("da").unwrap(), 42);
    responder.join().unwrap();
}

// =========================================================================
// Framing errors
// =========================================================================

fn raw_header(order: ByteOrder, size: u16, ptype: u8) -> Vec<u8> {
    let mut hdr = Record::with_order(&pktheader(), order);
    hdr.set("size", size).unwrap();
    hdr.set("dest", 0xFFu8).unwrap();
    hdr.set("ptype", ptype).unwrap();
    hdr.into_bytes()
}

#[test]
fn test_size_below_header_is_rejected_and_flushed() {
    let mut channel = channel(ByteOrder::Little);
    let mut bytes = raw_header(ByteOrder::Little, 3, 1);
    bytes.extend([0xAA; 4]);
    channel.transport_mut().write(&bytes).unwrap();

    match channel.receive() {
        Err(ProtocolError::PacketSize {
            declared,
            expected,
            bytes,
        }) => {
            assert_eq!(declared, 3);
            assert_eq!(expected, 5);
            assert_eq!(bytes.len(), 5);
        }
        other => panic!("expected size error, got {other:?}"),
    }
    assert_eq!(channel.transport().pending(), 0);
}

#[test]
fn test_size_mismatching_type_is_rejected() {
    let mut channel = channel(ByteOrder::Little);
    channel
        .transport_mut()
        .write(&raw_header(ByteOrder::Little, 9, 1))
        .unwrap();
    let err = channel.receive().unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::PacketSize {
            declared: 9,
            expected: 7,
            ..
        }
    ));
    assert!(err.is_framing());
}

#[test]
fn test_unregistered_type_is_rejected() {
    let mut channel = channel(ByteOrder::Little);
    let mut bytes = raw_header(ByteOrder::Little, 7, 3);
    bytes.extend([0, 0]);
    channel.transport_mut().write(&bytes).unwrap();

    let err = channel.receive().unwrap_err();
    assert!(matches!(err, ProtocolError::PacketType { discriminant: 3, .. }));
    assert_eq!(channel.transport().pending(), 0);
}

#[test]
fn test_recovers_after_framing_error() {
    let registry = registry();
    let mut channel = channel(ByteOrder::Little);
    channel
        .transport_mut()
        .write(&raw_header(ByteOrder::Little, 2, 1))
        .unwrap();
    assert!(channel.receive().is_err());

    let mut cmd = registry.create("command", ByteOrder::Little, &Shapes::new()).unwrap();
    cmd.set("state1", 9u8).unwrap();
    let received = channel.send_receive(&mut cmd, &no_params()).unwrap().unwrap();
    assert_eq!(received.get_raw("state1").unwrap(), 9);
}

#[test]
fn test_wire_element_count_is_checked_before_allocation() {
    let base = RecordLayout::builder("countbase")
        .record("hdr", &pktheader())
        .field("n", FieldType::U64)
        .build()
        .unwrap();
    let samples = RecordLayout::builder("samples")
        .record("hdr", &pktheader())
        .field("n", FieldType::U64)
        .vector("payload", FieldType::F32)
        .build()
        .unwrap();
    let family = StandardFamily::new(&base)
        .size_field("hdr.size")
        .type_field("hdr.ptype")
        .shape_field("payload", "n");
    let mut registry = PacketTypeRegistry::new(family);
    registry
        .register(&samples, &TagSet::new("ptype", [("samples", 1u64)]))
        .unwrap();
    let mut channel = PacketChannel::new(
        Loopback::new().with_timeout(Duration::from_millis(200)),
        Arc::new(registry),
    );

    let header = |count: u64| {
        let mut hdr = Record::new(&base);
        hdr.set("hdr.size", 17u16).unwrap();
        hdr.set("hdr.ptype", 1u8).unwrap();
        hdr.set("n", count).unwrap();
        let mut bytes = hdr.into_bytes();
        bytes.extend([0u8; 4]);
        bytes
    };

    channel.transport_mut().write(&header(1 << 62)).unwrap();
    let err = channel.receive().unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Record(RecordError::SizeOverflow { .. })
    ));
    assert_eq!(channel.transport().pending(), 0);

    channel.transport_mut().write(&header(0x4000_0000)).unwrap();
    let err = channel.receive().unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::PacketSize {
            declared: 17,
            expected: 0x1_0000_000D,
            ..
        }
    ));
    assert_eq!(channel.transport().pending(), 0);

    channel.transport_mut().write(&header(1)).unwrap();
    let packet = channel.receive().unwrap().unwrap();
    assert_eq!(packet.len_of("payload").unwrap(), 1);
}

#[test]
fn test_send_converts_nested_header_order() {
    let registry = registry();
    let mut channel = channel(ByteOrder::Little);
    let mut data = registry.create("datapkt", ByteOrder::Little, &Shapes::new()).unwrap();
    data.set("da", 0x0102_0304u32).unwrap();
    data.nested_mut("hdr").unwrap().set_byte_order(ByteOrder::Big);

    channel.send(&mut data, &no_params()).unwrap();
    assert_eq!(data.as_bytes()[..2], [0x11, 0x00]);
    let received = channel.receive().unwrap().unwrap();
    assert_eq!(received.get_raw("hdr.size").unwrap(), 17);
    assert_eq!(received.get_raw("da").unwrap(), 0x0102_0304);
}

// =========================================================================
// Addressing and registration
// =========================================================================

#[test]
fn test_packet_for_other_address_is_consumed_and_skipped() {
    let registry = registry();
    let config = ChannelConfig {
        params: HeaderParams::new().with("addr", 0x01u8),
        ..ChannelConfig::default()
    };
    let mut channel = PacketChannel::with_config(Loopback::new(), Arc::clone(&registry), config);

    let mut elsewhere = registry.create("datapkt", ByteOrder::Little, &Shapes::new()).unwrap();
    channel
        .send(&mut elsewhere, &HeaderParams::new().with("dest", 0x02u8))
        .unwrap();
    assert_eq!(elsewhere.get_raw("hdr.src").unwrap(), 0x01);
    assert!(channel.receive().unwrap().is_none());
    assert_eq!(channel.transport().pending(), 0);

    let mut mine = registry.create("datapkt", ByteOrder::Little, &Shapes::new()).unwrap();
    channel
        .send(&mut mine, &HeaderParams::new().with("dest", 0x03u8))
        .unwrap();
    assert!(channel.receive().unwrap().is_some());
}

#[test]
fn test_channel_params_override_call_params() {
    let registry = registry();
    let config = ChannelConfig {
        params: HeaderParams::new().with("addr", 0x04u8),
        ..ChannelConfig::default()
    };
    let mut channel = PacketChannel::with_config(Loopback::new(), Arc::clone(&registry), config);
    let mut cmd = registry.create("command", ByteOrder::Little, &Shapes::new()).unwrap();
    channel
        .send(&mut cmd, &HeaderParams::new().with("addr", 0x08u8))
        .unwrap();
    assert_eq!(cmd.get_raw("hdr.src").unwrap(), 0x04);
    assert_eq!(cmd.get_raw("hdr.dest").unwrap(), 0xFF);
}

#[test]
fn test_duplicate_discriminant_in_family_fails() {
    let mut registry = PacketTypeRegistry::new(family());
    registry.register(&command(), &ptypes()).unwrap();
    let clash = TagSet::new("ptype", [("datapkt", 1u64)]);
    let err = registry.register(&datapkt(), &clash).unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateDiscriminant { .. }));

    registry.register_all(&[command()], &ptypes()).unwrap();
    assert_eq!(registry.len(), 1);
}

// =========================================================================
// Properties
// =========================================================================

proptest! {
    #[test]
    fn prop_datapkt_round_trips_through_channel(
        da in any::<u32>(),
        db in -1.0e9f64..1.0e9,
        big in any::<bool>(),
    ) {
        let order = if big { ByteOrder::Big } else { ByteOrder::Little };
        let mut channel = channel(order);
        let mut packet = channel
            .registry()
            .create("datapkt", order, &Shapes::new())
            .unwrap();
        packet.set("da", da).unwrap();
        packet.set("db", db).unwrap();

        let received = channel.send_receive(&mut packet, &no_params()).unwrap().unwrap();
        prop_assert_eq!(received.get_raw("da").unwrap(), u64::from(da));
        prop_assert_eq!(received.get_as::<f64>("db").unwrap(), db);
        prop_assert_eq!(received, packet);
    }
}
