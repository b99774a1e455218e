/*!
# Exercise Multicast Protocol

This crate contains the wire-level pieces shared by every component that talks
to the exercise multicast group: the frame codec, the package-type catalogue
and the schema registry that turns payloads into typed protobuf messages.

## Core Types

- [`Frame`] - Decoded 8-byte header plus payload
- [`PackageTypeDescriptor`] - Catalogue entry for a package-type code
- [`SchemaRegistry`] - Schema discovery, lookup, decode and encode
- [`DecodedBody`] - Outcome of decoding a payload

## Modules

- [`frame`] - Header validation and frame encoding
- [`catalogue`] - Static package-type table
- [`schema`] - Protobuf message types and the schema registry
- [`error`] - Protocol error types
*/

pub mod catalogue;
pub mod error;
pub mod frame;
pub mod schema;

// Re-export commonly used types
pub use catalogue::{lookup_package_type, PackageTypeDescriptor, CATALOGUE};
pub use error::{FrameError, ProtocolError, Result, SchemaError};
pub use frame::{decode_frame, encode_frame, Frame};
pub use schema::{DecodedBody, MessageBody, RegistryState, SchemaMessage, SchemaRegistry, SchemaType};

/// Version information for the protocol library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    use std::net::Ipv4Addr;

    /// Fixed sync bytes opening every frame
    pub const SYNC_BYTES: [u8; 2] = [0xAA, 0x55];

    /// Size of the frame header in bytes
    pub const HEADER_LEN: usize = 8;

    /// Protocol id carried by every frame the console emits
    pub const PROTOCOL_ID: u8 = 0x01;

    /// Package type of the platform-aggregate status message
    pub const PLATFORMS_STATUS: u8 = 0x29;

    /// Package type of operator commands
    pub const PLATFORM_CMD: u8 = 0x2A;

    /// Default exercise multicast group
    pub const DEFAULT_MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 255, 43, 21);

    /// Default exercise multicast port
    pub const DEFAULT_MULTICAST_PORT: u16 = 10086;

    /// Protobuf package every schema lives in
    pub const SCHEMA_PACKAGE: &str = "exercise";

    /// Schema files that must all be present in a schema directory
    pub const REQUIRED_SCHEMA_FILES: [&str; 2] = ["status.proto", "command.proto"];
}
