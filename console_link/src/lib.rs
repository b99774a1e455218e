/*!
# Console Link

Status ingestion and command dispatch between the operator console and the
platforms on the exercise multicast group.

## Components

- [`StatusListener`] - Joins the group and publishes decoded status packets
- [`CommandDispatcher`] - Encodes and sends operator commands
- [`PlatformCommandRequest`] - Typed operator command
- [`LinkConfig`] - Layered configuration (file, environment, flags)

The schema registry is loaded once and shared read-only between the two
directions through an `Arc`.
*/

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ingest;

pub use command::{CommandParams, PlatformCommandRequest};
pub use config::LinkConfig;
pub use dispatch::{CommandDispatcher, CommandReceipt, DispatcherState};
pub use error::{DispatchError, IngestError, IngestFault};
pub use events::{DecodedPacket, EventBus, ListenerEvent};
pub use ingest::{ListenerStatus, StatusListener};

use mcast_protocol::SchemaRegistry;
use tracing::warn;

/// Load the schema registry from the configured candidates.
///
/// A failed load is logged and yields the failed registry, so a listener can
/// still run and report every payload as unparsed.
pub fn load_registry(config: &LinkConfig) -> SchemaRegistry {
    let candidates = config.schema_candidates();
    let mut registry = SchemaRegistry::new();
    if let Err(err) = registry.initialize(candidates.as_slice()) {
        warn!("Continuing without schemas: {}", err);
    }
    registry
}
