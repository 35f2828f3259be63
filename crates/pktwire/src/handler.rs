//! Packet handlers invoked by [`PacketServer`](crate::PacketServer).

use pktwire_record::Record;

/// Turns one received packet into an optional response.
///
/// Implemented for any `FnMut(Record) -> Option<Record>`, so a closure is
/// usually enough:
///
/// ```rust
/// use pktwire::PacketHandler;
/// use pktwire_record::Record;
///
/// fn assert_handler(_: impl PacketHandler) {}
/// assert_handler(|packet: Record| Some(packet));
/// ```
pub trait PacketHandler: Send {
    /// Returns the packet to send back, or `None` to send nothing.
    fn handle(&mut self, packet: Record) -> Option<Record>;
}

impl<F> PacketHandler for F
where
    F: FnMut(Record) -> Option<Record> + Send,
{
    fn handle(&mut self, packet: Record) -> Option<Record> {
        self(packet)
    }
}

/// Sends every packet back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl PacketHandler for EchoHandler {
    fn handle(&mut self, packet: Record) -> Option<Record> {
        Some(packet)
    }
}

#[cfg(test)]
mod tests {
    use pktwire_record::{FieldType, RecordLayout};

    use super::*;

    fn packet() -> Record {
        let layout = RecordLayout::builder("ping")
            .field("seq", FieldType::U32)
            .build()
            .unwrap();
        let mut packet = Record::new(&layout);
        packet.set("seq", 3u32).unwrap();
        packet
    }

    #[test]
    fn test_echo_returns_same_packet() {
        let packet = packet();
        assert_eq!(EchoHandler.handle(packet.clone()), Some(packet));
    }

    #[test]
    fn test_closure_handler_keeps_state() {
        let mut seen = 0;
        {
            let mut handler = |_: Record| -> Option<Record> {
                seen += 1;
                None
            };
            assert!(handler.handle(packet()).is_none());
            assert!(handler.handle(packet()).is_none());
        }
        assert_eq!(seen, 2);
    }
}
