//! Framed packet exchange over a [`Transport`].

use std::sync::Arc;

use pktwire_record::{ByteOrder, Record, Shapes};
use pktwire_transport::Transport;
use serde::{Deserialize, Serialize};

use crate::{HeaderParams, PacketTypeRegistry, ProtocolError};

/// Where a channel is in reading a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    AwaitingHeader,
    AwaitingBody,
    Dispatching,
}

/// Per-channel settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Byte order of every packet sent or received.
    pub byte_order: ByteOrder,
    /// Header parameters applied to every send and receive. They take
    /// precedence over per-call parameters.
    pub params: HeaderParams,
}

/// One conversation over a transport: header-first reads, validated against
/// a [`PacketTypeRegistry`], and header-stamped writes.
///
/// Not meant for concurrent use; one request is in flight at a time.
pub struct PacketChannel<T: Transport> {
    transport: T,
    registry: Arc<PacketTypeRegistry>,
    config: ChannelConfig,
    header: Record,
    state: ChannelState,
}

impl<T: Transport> PacketChannel<T> {
    pub fn new(transport: T, registry: Arc<PacketTypeRegistry>) -> Self {
        Self::with_config(transport, registry, ChannelConfig::default())
    }

    pub fn with_config(
        transport: T,
        registry: Arc<PacketTypeRegistry>,
        config: ChannelConfig,
    ) -> Self {
        let header = Record::with_order(registry.family().base_layout(), config.byte_order);
        Self {
            transport,
            registry,
            config,
            header,
            state: ChannelState::Idle,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.config.byte_order
    }

    pub fn params(&self) -> &HeaderParams {
        &self.config.params
    }

    pub fn registry(&self) -> &Arc<PacketTypeRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Stamps the header of `packet` and writes it in one call.
    ///
    /// The packet, nested records included, is converted to the channel's
    /// byte order first.
    pub fn send(
        &mut self,
        packet: &mut Record,
        params: &HeaderParams,
    ) -> Result<(), ProtocolError> {
        packet.set_byte_order(self.config.byte_order);
        let params = params.merged(&self.config.params);
        self.registry.family().build_header(packet, &params)?;
        tracing::trace!(packet = packet.name(), bytes = packet.byte_size(), "sending packet");
        self.transport.write(packet.as_bytes())?;
        Ok(())
    }

    /// Reads one packet using the channel's own header parameters.
    pub fn receive(&mut self) -> Result<Option<Record>, ProtocolError> {
        self.receive_with(&HeaderParams::new())
    }

    /// Reads one packet.
    ///
    /// Returns `Ok(None)` when the family marks the header invalid; the
    /// packet's bytes are consumed either way. On any error not raised by
    /// the transport itself, the transport is flushed before the error is
    /// returned.
    pub fn receive_with(
        &mut self,
        params: &HeaderParams,
    ) -> Result<Option<Record>, ProtocolError> {
        let result = self.read_packet(params);
        self.set_state(ChannelState::Idle);
        result
    }

    /// Drops stale inbound bytes, sends `packet` and waits for the reply.
    pub fn send_receive(
        &mut self,
        packet: &mut Record,
        params: &HeaderParams,
    ) -> Result<Option<Record>, ProtocolError> {
        self.transport.flush(false)?;
        self.send(packet, params)?;
        self.receive_with(params)
    }

    fn read_packet(&mut self, params: &HeaderParams) -> Result<Option<Record>, ProtocolError> {
        let params = params.merged(&self.config.params);
        self.set_state(ChannelState::AwaitingHeader);
        let bytes = self.transport.read(self.registry.header_size())?;

        match self.read_body(bytes, &params) {
            Err(err) if !matches!(err, ProtocolError::Transport(_)) => {
                if let Err(flush) = self.transport.flush(true) {
                    tracing::warn!(error = %flush, "flush after receive error failed");
                }
                Err(err)
            }
            result => result,
        }
    }

    fn read_body(
        &mut self,
        mut bytes: Vec<u8>,
        params: &HeaderParams,
    ) -> Result<Option<Record>, ProtocolError> {
        let registry = Arc::clone(&self.registry);
        let header_size = registry.header_size();
        self.header.decode(&bytes)?;
        let info = registry.family().parse_header(&self.header, params)?;

        if info.size < header_size {
            return Err(ProtocolError::PacketSize {
                declared: info.size,
                expected: header_size,
                bytes,
            });
        }
        let Ok(packet_type) = registry.resolve(info.discriminant) else {
            return Err(ProtocolError::PacketType {
                discriminant: info.discriminant,
                bytes,
            });
        };

        // Shapes the family reports for fields this type doesn't have are
        // ignored; the family's header is shared by all its types.
        let layout = packet_type.layout();
        let shapes: Shapes = info
            .shapes
            .iter()
            .filter(|(name, _)| layout.field(name).is_some_and(|f| f.is_variable()))
            .collect();
        // Sized before anything is allocated: counts come off the wire.
        let (_, expected) = layout.spans_for(&shapes)?;

        self.set_state(ChannelState::AwaitingBody);
        if !info.valid {
            self.transport.read(info.size - header_size)?;
            tracing::debug!(
                packet = packet_type.name(),
                size = info.size,
                "skipped packet addressed elsewhere"
            );
            return Ok(None);
        }
        if info.size != expected {
            return Err(ProtocolError::PacketSize {
                declared: info.size,
                expected,
                bytes,
            });
        }

        let mut packet = Record::with_shapes(layout, self.config.byte_order, &shapes)?;
        bytes.extend(self.transport.read(info.size - header_size)?);
        self.set_state(ChannelState::Dispatching);
        packet.decode(&bytes)?;
        tracing::debug!(packet = packet_type.name(), size = info.size, "packet received");
        Ok(Some(packet))
    }

    fn set_state(&mut self, state: ChannelState) {
        if self.state != state {
            tracing::trace!(from = ?self.state, to = ?state, "channel state");
            self.state = state;
        }
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for PacketChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketChannel")
            .field("transport", &self.transport)
            .field("family", &self.registry.family().name())
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}
