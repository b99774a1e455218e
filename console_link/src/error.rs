/*!
Error types for the console link services.
*/

use mcast_protocol::{FrameError, SchemaError};
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Failures starting the status listener
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("Failed to join multicast group {group} on {interface}: {source}")]
    Join {
        group: std::net::Ipv4Addr,
        interface: std::net::Ipv4Addr,
        source: io::Error,
    },

    #[error("Socket error: {0}")]
    Socket(#[from] io::Error),
}

/// Per-datagram problem reported on the event stream
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum IngestFault {
    #[error("{0}")]
    Frame(#[serde(serialize_with = "as_display")] FrameError),

    #[error("Datagram of {len} bytes exceeds the {max} byte limit")]
    Oversized { len: usize, max: usize },
}

impl From<FrameError> for IngestFault {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

fn as_display<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Command dispatch failures
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Command dispatcher is not initialized")]
    NotInitialized,

    #[error("Invalid command request: {0}")]
    InvalidRequest(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Failed to create command socket: {0}")]
    Socket(#[source] io::Error),

    #[error("Failed to send command to {target}: {source}")]
    Send { target: SocketAddr, source: io::Error },
}

impl DispatchError {
    /// Create a new invalid-request error
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}
