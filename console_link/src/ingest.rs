/*!
Status ingestion from the exercise multicast group.

A single tokio task owns the receive socket. Each datagram is validated,
decoded and published to subscribers before the next `recv`, so events from
one sender keep their arrival order. Bad datagrams are reported as error
events and never stop the loop.
*/

use crate::config::{LinkConfig, MulticastConfig};
use crate::error::{IngestError, IngestFault};
use crate::events::{DecodedPacket, EventBus, ListenerEvent};
use bytes::Bytes;
use crossbeam_channel::Receiver;
use mcast_protocol::{decode_frame, SchemaRegistry};
use serde::Serialize;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Snapshot of the listener for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerStatus {
    pub is_listening: bool,
    pub address: Ipv4Addr,
    pub port: u16,
}

/// State shared between the listener handle and its receive task
struct IngestContext {
    registry: Arc<SchemaRegistry>,
    bus: EventBus,
    max_datagram_size: usize,
}

impl IngestContext {
    fn handle_datagram(&self, datagram: &[u8], source: SocketAddr) {
        if datagram.len() > self.max_datagram_size {
            let fault = IngestFault::Oversized {
                len: datagram.len(),
                max: self.max_datagram_size,
            };
            warn!(%source, "⚠️ {}", fault);
            self.bus.publish(ListenerEvent::Error { source, fault });
            return;
        }

        match decode_frame(datagram) {
            Ok(frame) => {
                let raw_frame = Bytes::copy_from_slice(datagram);
                let packet = DecodedPacket::from_frame(&frame, raw_frame, source, &self.registry);
                debug!(
                    %source,
                    package_type = packet.package_type,
                    name = packet.package_type_name,
                    parsed = packet.body.is_parsed(),
                    "Received frame"
                );
                self.bus.publish(ListenerEvent::Packet(packet));
            }
            Err(err) => {
                warn!(%source, len = datagram.len(), "⚠️ Dropping datagram: {}", err);
                self.bus.publish(ListenerEvent::Error {
                    source,
                    fault: err.into(),
                });
            }
        }
    }
}

struct ReceiveLoop {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Multicast status listener
pub struct StatusListener {
    multicast: MulticastConfig,
    recv_buffer_size: usize,
    context: Arc<IngestContext>,
    running: Option<ReceiveLoop>,
}

impl StatusListener {
    /// Create a listener; nothing is bound until [`StatusListener::start`]
    pub fn new(config: &LinkConfig, registry: Arc<SchemaRegistry>) -> Self {
        let ingest = &config.ingest;
        Self {
            multicast: config.multicast.clone(),
            recv_buffer_size: ingest.recv_buffer_size,
            context: Arc::new(IngestContext {
                registry,
                bus: EventBus::new(ingest.subscriber_capacity),
                max_datagram_size: ingest.max_datagram_size,
            }),
            running: None,
        }
    }

    /// Register for listener events
    pub fn subscribe(&self) -> Receiver<ListenerEvent> {
        self.context.bus.subscribe()
    }

    /// Bind, join the group and spawn the receive loop. Resolves once the
    /// socket is listening; a second call while listening does nothing.
    pub async fn start(&mut self) -> Result<(), IngestError> {
        if self.running.is_some() {
            debug!("Listener already running");
            return Ok(());
        }

        let socket = self.open_socket()?;
        let buffer_len = receive_buffer_len(self.context.max_datagram_size);
        let context = Arc::clone(&self.context);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        // Started must precede every datagram event
        info!(
            "📡 Listening on multicast group {}:{}",
            self.multicast.address, self.multicast.port
        );
        self.context.bus.publish(ListenerEvent::Started {
            address: self.multicast.address,
            port: self.multicast.port,
        });

        let handle = tokio::spawn(async move {
            let mut buffer = vec![0u8; buffer_len];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    received = socket.recv_from(&mut buffer) => match received {
                        Ok((len, source)) => context.handle_datagram(&buffer[..len], source),
                        Err(err) => error!("Receive error: {}", err),
                    },
                }
            }
            debug!("Receive loop finished");
        });

        self.running = Some(ReceiveLoop {
            shutdown: shutdown_tx,
            handle,
        });
        Ok(())
    }

    fn open_socket(&self) -> Result<UdpSocket, IngestError> {
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.multicast.port);
        info!("🔌 Binding UDP socket to {}", bind_addr);

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;

        socket
            .bind(&SockAddr::from(bind_addr))
            .map_err(|source| IngestError::Bind {
                addr: bind_addr.into(),
                source,
            })?;

        socket
            .join_multicast_v4(&self.multicast.address, &self.multicast.interface)
            .map_err(|source| IngestError::Join {
                group: self.multicast.address,
                interface: self.multicast.interface,
                source,
            })?;

        if let Err(err) = socket.set_recv_buffer_size(self.recv_buffer_size) {
            warn!("Could not set receive buffer to {} bytes: {}", self.recv_buffer_size, err);
        } else {
            info!("📊 Socket receive buffer set to {} bytes", self.recv_buffer_size);
        }

        socket.set_nonblocking(true)?;
        Ok(UdpSocket::from_std(socket.into())?)
    }

    /// Validate, decode and publish one datagram. This is what the receive
    /// loop runs for every `recv`.
    pub fn ingest(&self, datagram: &[u8], source: SocketAddr) {
        self.context.handle_datagram(datagram, source);
    }

    /// Stop the receive loop and close the socket. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let Some(receive_loop) = self.running.take() else {
            return;
        };

        let _ = receive_loop.shutdown.send(());
        if let Err(err) = receive_loop.handle.await {
            error!("Receive loop ended abnormally: {}", err);
        }

        info!("🛑 Listener stopped");
        self.context.bus.publish(ListenerEvent::Stopped);
    }

    pub fn is_listening(&self) -> bool {
        self.running.is_some()
    }

    pub fn status(&self) -> ListenerStatus {
        ListenerStatus {
            is_listening: self.is_listening(),
            address: self.multicast.address,
            port: self.multicast.port,
        }
    }
}

impl Drop for StatusListener {
    fn drop(&mut self) {
        if let Some(receive_loop) = self.running.take() {
            let _ = receive_loop.shutdown.send(());
        }
    }
}

/// Largest payload a single UDP datagram can carry
const MAX_UDP_PAYLOAD: usize = u16::MAX as usize;

/// Receive buffer length: one spare byte past the limit so oversized
/// datagrams are detectable, capped at what UDP can deliver
fn receive_buffer_len(max_datagram_size: usize) -> usize {
    max_datagram_size.min(MAX_UDP_PAYLOAD) + 1
}
