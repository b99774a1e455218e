/*!
Listener events and the subscriber fan-out.

Every subscriber gets its own bounded crossbeam queue. Publishing never
blocks the receive loop: a full queue drops the event for that subscriber
only, and subscribers whose receiver was dropped are pruned.
*/

use crate::error::IngestFault;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use mcast_protocol::{lookup_package_type, DecodedBody, Frame, SchemaRegistry};
use serde::{Serialize, Serializer};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Mutex;
use tracing::warn;

/// One received frame with its decoded body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedPacket {
    pub timestamp: DateTime<Utc>,
    pub source: SocketAddr,
    pub package_type: u8,
    pub package_type_name: &'static str,
    pub protocol_id: u8,
    #[serde(serialize_with = "serialize_base64")]
    pub raw_frame: Bytes,
    pub body: DecodedBody,
}

impl DecodedPacket {
    /// Decode the body of an already validated frame
    pub fn from_frame(
        frame: &Frame,
        raw_frame: Bytes,
        source: SocketAddr,
        registry: &SchemaRegistry,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            package_type: frame.package_type,
            package_type_name: lookup_package_type(frame.package_type).name,
            protocol_id: frame.protocol_id,
            raw_frame,
            body: registry.decode(frame.package_type, &frame.payload),
        }
    }
}

fn serialize_base64<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// Everything a listener reports to its subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ListenerEvent {
    Packet(DecodedPacket),
    Error {
        source: SocketAddr,
        fault: IngestFault,
    },
    Started { address: Ipv4Addr, port: u16 },
    Stopped,
}

impl ListenerEvent {
    pub fn is_packet(&self) -> bool {
        matches!(self, Self::Packet(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Fan-out of listener events to any number of subscribers
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    subscribers: Mutex<Vec<Sender<ListenerEvent>>>,
}

impl EventBus {
    /// Create a bus whose subscriber queues hold `capacity` events each
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Receiver<ListenerEvent> {
        let (tx, rx) = bounded(self.capacity);
        self.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber without blocking
    pub fn publish(&self, event: ListenerEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber queue full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Number of subscribers still attached
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<ListenerEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcast_protocol::encode_frame;

    fn source() -> SocketAddr {
        "10.0.0.7:10086".parse().unwrap()
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new(4);
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(ListenerEvent::Stopped);

        assert_eq!(a.try_recv().unwrap(), ListenerEvent::Stopped);
        assert_eq!(b.try_recv().unwrap(), ListenerEvent::Stopped);
    }

    #[test]
    fn test_full_queue_drops_event() {
        let bus = EventBus::new(1);
        let rx = bus.subscribe();

        bus.publish(ListenerEvent::Stopped);
        bus.publish(ListenerEvent::Started {
            address: Ipv4Addr::LOCALHOST,
            port: 1,
        });

        assert_eq!(rx.try_recv().unwrap(), ListenerEvent::Stopped);
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let bus = EventBus::new(4);
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(ListenerEvent::Stopped);

        assert_eq!(bus.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_unknown_type_packet_json() {
        let raw = encode_frame(0x01, 0x7F, &[0xDE, 0xAD]);
        let frame = mcast_protocol::decode_frame(&raw).unwrap();
        let registry = SchemaRegistry::new();

        let packet = DecodedPacket::from_frame(&frame, raw.clone(), source(), &registry);
        assert_eq!(packet.package_type_name, "Unknown");
        assert!(!packet.body.is_parsed());

        let json = serde_json::to_value(ListenerEvent::Packet(packet)).unwrap();
        assert_eq!(json["event"], "packet");
        assert_eq!(json["packageType"], 0x7F);
        assert_eq!(json["source"], "10.0.0.7:10086");
        assert_eq!(json["rawFrame"], STANDARD.encode(&raw));
        assert_eq!(json["body"]["error"], "unknown package type");
        assert_eq!(json["body"]["rawHex"], "dead");
    }
}
