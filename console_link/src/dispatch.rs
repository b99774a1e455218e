/*!
Command dispatch to the exercise multicast group.

The dispatcher turns a [`PlatformCommandRequest`] into a `PlatformCmd`
protobuf payload, frames it as package type `0x2A` and sends it once to the
configured group. There is no acknowledgement and no retry; replies arrive
later as status packets on the listener.
*/

use crate::command::PlatformCommandRequest;
use crate::config::LinkConfig;
use crate::error::DispatchError;
use mcast_protocol::protocol::PLATFORM_CMD;
use mcast_protocol::schema::SchemaType;
use mcast_protocol::{encode_frame, SchemaError, SchemaRegistry};
use serde::Serialize;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

/// Lifecycle of a [`CommandDispatcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DispatcherState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// What was sent, and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReceipt {
    pub command_id: String,
    pub target: SocketAddr,
    pub bytes_sent: usize,
}

/// Sends operator commands to platforms
pub struct CommandDispatcher {
    config: LinkConfig,
    injected_registry: Option<Arc<SchemaRegistry>>,
    state: DispatcherState,
    registry: Option<Arc<SchemaRegistry>>,
    socket: Option<UdpSocket>,
}

impl CommandDispatcher {
    /// Dispatcher that loads its own registry from the configured search paths
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            injected_registry: None,
            state: DispatcherState::Uninitialized,
            registry: None,
            socket: None,
        }
    }

    /// Dispatcher sharing a registry with other components
    pub fn with_registry(config: LinkConfig, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            injected_registry: Some(registry),
            ..Self::new(config)
        }
    }

    /// Load schemas and open the sending socket. Does nothing when already
    /// Ready; after a failure it starts over from scratch.
    pub async fn initialize(&mut self) -> Result<(), DispatchError> {
        if self.state == DispatcherState::Ready {
            return Ok(());
        }

        self.state = DispatcherState::Initializing;
        match self.try_initialize() {
            Ok((registry, socket)) => {
                info!(
                    "✅ Command dispatcher ready ({} schema types, target {})",
                    registry.type_count(),
                    self.target()
                );
                self.registry = Some(registry);
                self.socket = Some(socket);
                self.state = DispatcherState::Ready;
                Ok(())
            }
            Err(err) => {
                error!("❌ Command dispatcher initialization failed: {}", err);
                self.registry = None;
                self.socket = None;
                self.state = DispatcherState::Failed;
                Err(err)
            }
        }
    }

    fn try_initialize(&self) -> Result<(Arc<SchemaRegistry>, UdpSocket), DispatchError> {
        let registry = match &self.injected_registry {
            Some(registry) if registry.is_ready() => Arc::clone(registry),
            Some(registry) => {
                return Err(SchemaError::unavailable(format!(
                    "shared registry is {:?}",
                    registry.state()
                ))
                .into())
            }
            None => {
                let candidates = self.config.schema_candidates();
                Arc::new(SchemaRegistry::load(candidates.as_slice())?)
            }
        };

        // Sub-schemas are optional, the command envelope is not
        registry.lookup(SchemaType::PlatformCmd.qualified_name())?;

        let socket = self.open_socket().map_err(DispatchError::Socket)?;
        Ok((registry, socket))
    }

    fn open_socket(&self) -> std::io::Result<UdpSocket> {
        let multicast = &self.config.multicast;
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_multicast_if_v4(&multicast.interface)?;
        socket.set_multicast_ttl_v4(multicast.ttl)?;
        socket.set_multicast_loop_v4(multicast.loopback)?;
        socket.bind(&SockAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)))?;
        socket.set_nonblocking(true)?;
        debug!(
            interface = %multicast.interface,
            ttl = multicast.ttl,
            loopback = multicast.loopback,
            "Command socket opened"
        );
        UdpSocket::from_std(socket.into())
    }

    pub fn is_initialized(&self) -> bool {
        self.state == DispatcherState::Ready
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Group address and port commands are sent to
    pub fn target(&self) -> SocketAddr {
        SocketAddr::V4(self.config.multicast.group())
    }

    /// Validate, encode, frame and send one command
    pub async fn send(
        &self,
        request: &PlatformCommandRequest,
    ) -> Result<CommandReceipt, DispatchError> {
        let (Some(registry), Some(socket)) = (&self.registry, &self.socket) else {
            return Err(DispatchError::NotInitialized);
        };
        if self.state != DispatcherState::Ready {
            return Err(DispatchError::NotInitialized);
        }

        request.validate()?;

        let cmd = request.build_platform_cmd(registry);
        let payload = registry.encode(&cmd)?;
        let frame = encode_frame(self.config.dispatch.protocol_id, PLATFORM_CMD, &payload);

        let target = self.target();
        let bytes_sent = socket
            .send_to(&frame, target)
            .await
            .map_err(|source| DispatchError::Send { target, source })?;

        info!(
            command_id = %request.command_id,
            platform = %request.platform_name,
            "📤 Sent {} ({} bytes) to {}",
            request.command.name(),
            bytes_sent,
            target
        );

        Ok(CommandReceipt {
            command_id: request.command_id.clone(),
            target,
            bytes_sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcast_protocol::schema::CommandType;

    #[tokio::test]
    async fn test_send_before_initialize() {
        let dispatcher = CommandDispatcher::new(LinkConfig::default());
        let request = PlatformCommandRequest::new("uav-1", CommandType::HoverCmd);

        assert_eq!(dispatcher.state(), DispatcherState::Uninitialized);
        assert!(matches!(
            dispatcher.send(&request).await,
            Err(DispatchError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_unready_shared_registry_fails() {
        let mut dispatcher =
            CommandDispatcher::with_registry(LinkConfig::default(), Arc::new(SchemaRegistry::new()));

        let err = dispatcher.initialize().await.unwrap_err();
        assert!(matches!(err, DispatchError::Schema(SchemaError::Unavailable(_))));
        assert_eq!(dispatcher.state(), DispatcherState::Failed);
        assert!(!dispatcher.is_initialized());
    }

    #[test]
    fn test_target_from_config() {
        let dispatcher = CommandDispatcher::new(LinkConfig::default());
        assert_eq!(dispatcher.target().to_string(), "239.255.43.21:10086");
    }
}
