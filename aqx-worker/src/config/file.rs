//! TOML file configuration structures.
//!
//! These structs directly map to the `aqx-worker.toml` file format. Every
//! section is optional; a missing section takes its defaults.

use alloy_primitives::Address;
use aqx_sdk::objects::EntityKind;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub queue: QueueConfig,
    pub hub: HubConfig,
    pub contracts: Vec<ContractConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
        }
    }
}

/// Chain node and scanning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// HTTP JSON-RPC endpoint of the node.
    pub rpc_url: String,
    /// Seconds between two monitor ticks.
    pub poll_interval_secs: u64,
    /// First block to scan. Defaults to the head at startup.
    pub start_height: Option<u64>,
    /// How many times to try the node before giving up at startup.
    pub connect_attempts: u32,
    /// Seconds between two startup attempts.
    pub connect_retry_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            poll_interval_secs: 5,
            start_height: None,
            connect_attempts: 30,
            connect_retry_secs: 2,
        }
    }
}

/// Message queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub redis_url: String,
    /// Key prefix of the per-topic lists.
    pub prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".into(),
            prefix: "aqx".into(),
        }
    }
}

/// Real-time subscriber fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Events buffered per websocket client before it is disconnected.
    pub client_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { client_buffer: 256 }
    }
}

/// A contract to watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub name: CompactString,
    pub address: Address,
    /// Which event family the contract emits: `rfq` or `auction`.
    pub role: EntityKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[chain]
rpc_url = "http://node.internal:8545"
poll_interval_secs = 12
start_height = 19000000

[queue]
redis_url = "redis://queue:6379"
prefix = "lending"

[hub]
client_buffer = 64

[[contracts]]
name = "rfq"
address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
role = "rfq"

[[contracts]]
name = "auction"
address = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512"
role = "auction"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.chain.rpc_url, "http://node.internal:8545");
        assert_eq!(config.chain.poll_interval_secs, 12);
        assert_eq!(config.chain.start_height, Some(19_000_000));
        assert_eq!(config.chain.connect_attempts, 30);
        assert_eq!(config.queue.prefix, "lending");
        assert_eq!(config.hub.client_buffer, 64);
        assert_eq!(config.contracts.len(), 2);
        assert_eq!(config.contracts[1].role, EntityKind::Auction);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.chain.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.chain.poll_interval_secs, 5);
        assert_eq!(config.chain.start_height, None);
        assert_eq!(config.queue.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.hub.client_buffer, 256);
        assert!(config.contracts.is_empty());
    }

    #[test]
    fn test_invalid_role_rejected() {
        let toml_str = r#"
[[contracts]]
name = "vault"
address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
role = "vault"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
