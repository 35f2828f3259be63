use std::io::BufRead;
use std::sync::Arc;

use pktwire::prelude::*;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Packet definitions
// ---------------------------------------------------------------------------

fn registry() -> Result<PacketTypeRegistry, PktwireError> {
    let hdr = RecordLayout::builder("pktheader")
        .field("size", FieldType::U16)
        .field("dest", FieldType::U8)
        .field("src", FieldType::U8)
        .field("ptype", FieldType::U8)
        .build()?;
    let base = RecordLayout::builder("pktbase").record("hdr", &hdr).build()?;
    let command = RecordLayout::builder("command")
        .record("hdr", &hdr)
        .bits("state1", FieldType::U16, 7)
        .bits("state2", FieldType::U16, 3)
        .bits("state3", FieldType::U16, 1)
        .build()?;
    let datapkt = RecordLayout::builder("datapkt")
        .record("hdr", &hdr)
        .field("da", FieldType::U32)
        .field("db", FieldType::F64)
        .build()?;
    let testpkt = RecordLayout::builder("testpkt")
        .record("hdr", &hdr)
        .field("ack", FieldType::U8)
        .build()?;

    let ptypes = TagSet::new("ptype", [("command", 1u64), ("datapkt", 2), ("testpkt", 3)]);
    let family = StandardFamily::new(&base)
        .size_field("hdr.size")
        .type_field("hdr.ptype")
        .address_fields("hdr.dest", "hdr.src");
    let mut registry = PacketTypeRegistry::new(family);
    registry.register_all(&[command, datapkt, testpkt], &ptypes)?;
    Ok(registry)
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoConfig {
    transport: TransportConfig,
    channel: ChannelConfig,
}

const DEFAULT_CONFIG: &str = r#"{
    "transport": { "kind": "socket", "host": "127.0.0.1:9500" },
    "channel": { "byte_order": "<", "params": { "addr": 1 } }
}"#;

fn load_config() -> Result<DemoConfig, Box<dyn std::error::Error>> {
    let text = match std::env::var("PKTWIRE_CONFIG") {
        Ok(path) => std::fs::read_to_string(path)?,
        Err(_) => DEFAULT_CONFIG.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Doubles `da` in data packets, acknowledges test packets, echoes the rest.
fn respond(registry: &PacketTypeRegistry, packet: Record) -> Option<Record> {
    let name = packet.name().to_string();
    let reply = match name.as_str() {
        "datapkt" => double(packet),
        "testpkt" => ack(registry, packet.byte_order()),
        _ => return Some(packet),
    };
    reply
        .map_err(|e| tracing::warn!(packet = %name, error = %e, "no reply"))
        .ok()
}

fn double(mut packet: Record) -> Result<Record, PktwireError> {
    let da = packet.get_raw("da")?;
    packet.set("da", da.wrapping_mul(2) & 0xFFFF_FFFF)?;
    Ok(packet)
}

fn ack(registry: &PacketTypeRegistry, order: ByteOrder) -> Result<Record, PktwireError> {
    let mut ack = registry.create("testpkt", order, &Shapes::new())?;
    ack.set("ack", 1u8)?;
    Ok(ack)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let registry = Arc::new(registry()?);
    let transport = config.transport.open()?;
    tracing::info!(transport = ?config.transport, "starting echo server");

    let responses = Arc::clone(&registry);
    let server = PacketServer::builder(transport, registry)
        .config(config.channel)
        .handler(move |packet: Record| respond(&responses, packet))
        .start()?;

    eprintln!("echo server running, press Enter to stop");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    let report = server.stop()?;
    eprintln!(
        "served {} connections, {} packets, {} responses, {} errors",
        report.connections, report.packets, report.responses, report.errors
    );
    Ok(())
}
