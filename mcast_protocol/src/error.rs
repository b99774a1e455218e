/*!
Error types for the exercise multicast protocol.

Frame errors are local to a single datagram. Schema errors are fatal to
registry initialization; decode-time schema failures never surface as errors
and are folded into [`crate::DecodedBody::Unparsed`] instead.
*/

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Common result type used throughout the protocol library
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Header validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame too short: {len} bytes, header needs {}", crate::protocol::HEADER_LEN)]
    TooShort { len: usize },

    #[error("Bad sync bytes: {:02X} {:02X}", .found[0], .found[1])]
    BadSync { found: [u8; 2] },

    #[error("Payload length mismatch: header declares {declared} bytes, {actual} follow")]
    LengthMismatch { declared: u32, actual: usize },
}

/// Schema discovery, lookup and encoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No candidate directory held every required schema file
    #[error("Schema files not found, tried: {}", TriedPaths(.tried))]
    NotFound { tried: Vec<PathBuf> },

    #[error("Unknown schema type: {0}")]
    UnknownType(String),

    /// Registry is not Ready (never initialized, or initialization failed)
    #[error("Schema registry unavailable ({0})")]
    Unavailable(String),

    #[error("Required field `{field}` missing from {type_name}")]
    MissingField { type_name: &'static str, field: &'static str },

    #[error("Failed to parse schema file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl SchemaError {
    /// Create a new unavailable error with a reason
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Create a new parse error for a schema file
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Comprehensive error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

struct TriedPaths<'a>(&'a [PathBuf]);

impl fmt::Display for TriedPaths<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<no candidates>");
        }
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}
