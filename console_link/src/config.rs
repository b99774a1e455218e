/*!
Configuration management for the console link.

Layering, lowest to highest precedence: built-in defaults, an optional TOML
file, environment variables (`MULTICAST_ADDRESS`, `MULTICAST_PORT`,
`INTERFACE_ADDRESS`, `SCHEMA_PATH`), then command-line flags.
*/

use anyhow::{Context, Result};
use mcast_protocol::protocol::{DEFAULT_MULTICAST_ADDRESS, DEFAULT_MULTICAST_PORT, PROTOCOL_ID};
use mcast_protocol::schema::default_search_paths;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};

pub const ENV_MULTICAST_ADDRESS: &str = "MULTICAST_ADDRESS";
pub const ENV_MULTICAST_PORT: &str = "MULTICAST_PORT";
pub const ENV_INTERFACE_ADDRESS: &str = "INTERFACE_ADDRESS";
pub const ENV_SCHEMA_PATH: &str = "SCHEMA_PATH";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkConfig {
    #[serde(default)]
    pub multicast: MulticastConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl LinkConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            multicast: MulticastConfig::default(),
            ingest: IngestConfig::default(),
            schema: SchemaConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: LinkConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// Load a config file if it exists, otherwise start from defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MULTICAST_ADDRESS) {
            self.multicast.address = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_MULTICAST_ADDRESS, value))?;
        }

        if let Some(value) = lookup(ENV_MULTICAST_PORT) {
            self.multicast.port = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_MULTICAST_PORT, value))?;
        }

        if let Some(value) = lookup(ENV_INTERFACE_ADDRESS) {
            self.multicast.interface = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_INTERFACE_ADDRESS, value))?;
        }

        if let Some(value) = lookup(ENV_SCHEMA_PATH) {
            let mut paths: Vec<PathBuf> = std::env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            // Environment paths are searched before anything from the file
            paths.append(&mut self.schema.search_paths);
            self.schema.search_paths = paths;
        }

        Ok(())
    }

    /// Ordered schema directories to search
    pub fn schema_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = self.schema.search_paths.clone();
        if self.schema.include_default_paths {
            candidates.extend(default_search_paths());
        }
        candidates
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Multicast group settings shared by both directions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MulticastConfig {
    /// Multicast group address
    pub address: Ipv4Addr,

    /// Multicast group port
    pub port: u16,

    /// Local interface used to join and to send
    pub interface: Ipv4Addr,

    /// Multicast TTL for outbound commands
    pub ttl: u32,

    /// Deliver our own outbound commands back to local listeners
    pub loopback: bool,
}

impl MulticastConfig {
    /// Group address and port as a socket address
    pub fn group(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_MULTICAST_ADDRESS,
            port: DEFAULT_MULTICAST_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
            loopback: true,
        }
    }
}

/// Status ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Socket receive buffer size in bytes
    pub recv_buffer_size: usize,

    /// Largest datagram accepted
    pub max_datagram_size: usize,

    /// Per-subscriber event queue capacity
    pub subscriber_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: 1024 * 1024,
            max_datagram_size: 65536,
            subscriber_capacity: 1000,
        }
    }
}

/// Schema discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    /// Directories searched first, in order
    pub search_paths: Vec<PathBuf>,

    /// Append the executable- and working-directory-relative defaults
    pub include_default_paths: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            include_default_paths: true,
        }
    }
}

/// Command dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Protocol id written into outbound frame headers
    pub protocol_id: u8,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            protocol_id: PROTOCOL_ID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_roundtrip() {
        let mut original_config = LinkConfig::new();
        original_config.schema.search_paths = vec![PathBuf::from("/opt/console/proto")];

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path();

        // Save and load
        original_config.save_to_file(temp_path).unwrap();
        let loaded_config = LinkConfig::load_from_file(temp_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_default_values() {
        let config = LinkConfig::new();

        assert_eq!(config.multicast.address, Ipv4Addr::new(239, 255, 43, 21));
        assert_eq!(config.multicast.port, 10086);
        assert_eq!(config.multicast.interface, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.multicast.group().to_string(), "239.255.43.21:10086");
        assert_eq!(config.dispatch.protocol_id, 0x01);
        assert!(config.schema.include_default_paths);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: LinkConfig = toml::from_str("[multicast]\nport = 20000\n").unwrap();
        assert_eq!(config.multicast.port, 20000);
        assert_eq!(config.multicast.address, DEFAULT_MULTICAST_ADDRESS);
        assert_eq!(config.ingest, IngestConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LinkConfig::new();
        config.schema.search_paths = vec![PathBuf::from("/from/file")];

        config
            .apply_env_from(env(&[
                (ENV_MULTICAST_ADDRESS, "239.1.2.3"),
                (ENV_MULTICAST_PORT, " 15000 "),
                (ENV_INTERFACE_ADDRESS, "192.168.10.5"),
                (ENV_SCHEMA_PATH, "/from/env"),
            ]))
            .unwrap();

        assert_eq!(config.multicast.address, Ipv4Addr::new(239, 1, 2, 3));
        assert_eq!(config.multicast.port, 15000);
        assert_eq!(config.multicast.interface, Ipv4Addr::new(192, 168, 10, 5));
        assert_eq!(
            config.schema.search_paths,
            vec![PathBuf::from("/from/env"), PathBuf::from("/from/file")]
        );
    }

    #[test]
    fn test_invalid_env_names_variable() {
        let mut config = LinkConfig::new();
        let err = config
            .apply_env_from(env(&[(ENV_MULTICAST_PORT, "not-a-port")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MULTICAST_PORT));
        assert_eq!(config.multicast.port, DEFAULT_MULTICAST_PORT);
    }

    #[test]
    fn test_schema_candidates_order() {
        let mut config = LinkConfig::new();
        config.schema.search_paths = vec![PathBuf::from("/first")];
        config.schema.include_default_paths = false;
        assert_eq!(config.schema_candidates(), vec![PathBuf::from("/first")]);

        config.schema.include_default_paths = true;
        let candidates = config.schema_candidates();
        assert_eq!(candidates[0], PathBuf::from("/first"));
        assert!(candidates.len() > 1);
    }
}
