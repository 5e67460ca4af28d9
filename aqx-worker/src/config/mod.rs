//! Configuration module for aqx-worker.
//!
//! Handles loading configuration from the TOML file and applying CLI and
//! environment overrides on top of it.

pub mod file;

use crate::config::file::{ContractConfig, FileConfig};
use alloy_primitives::Address;
use aqx_core::processors::MonitorConfig;
use aqx_sdk::objects::EntityKind;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid rpc url: {0}")]
    InvalidRpcUrl(#[from] url::ParseError),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Values given on the command line or in the environment. They take
/// precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<SocketAddr>,
    pub rpc_url: Option<String>,
    pub redis_url: Option<String>,
    pub start_height: Option<u64>,
    pub rfq_contract: Option<Address>,
    pub auction_contract: Option<Address>,
}

/// Fully resolved worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub listen: SocketAddr,
    pub rpc_url: Url,
    pub monitor: MonitorConfig,
    pub connect_attempts: u32,
    pub connect_retry: Duration,
    pub redis_url: String,
    pub queue_prefix: String,
    pub hub_buffer: usize,
    pub contracts: Vec<ContractConfig>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, overrides: ConfigOverrides) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            overrides,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file (a missing file means all defaults)
    /// 2. Apply overrides
    /// 3. Validate and resolve the configuration
    pub fn load(&self) -> Result<WorkerConfig, ConfigError> {
        let file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = ?self.config_path, "Config file not found, using defaults");
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        self.resolve(file_config)
    }

    fn resolve(&self, mut file_config: FileConfig) -> Result<WorkerConfig, ConfigError> {
        let overrides = &self.overrides;
        if let Some(listen) = overrides.listen {
            file_config.server.listen = listen;
        }
        if let Some(rpc_url) = &overrides.rpc_url {
            file_config.chain.rpc_url = rpc_url.clone();
        }
        if let Some(redis_url) = &overrides.redis_url {
            file_config.queue.redis_url = redis_url.clone();
        }
        if let Some(start_height) = overrides.start_height {
            file_config.chain.start_height = Some(start_height);
        }
        if let Some(address) = overrides.rfq_contract {
            override_contract(&mut file_config.contracts, EntityKind::Rfq, address);
        }
        if let Some(address) = overrides.auction_contract {
            override_contract(&mut file_config.contracts, EntityKind::Auction, address);
        }

        validate(&file_config)?;

        let chain = file_config.chain;
        Ok(WorkerConfig {
            listen: file_config.server.listen,
            rpc_url: Url::parse(&chain.rpc_url)?,
            monitor: MonitorConfig {
                poll_interval: Duration::from_secs(chain.poll_interval_secs),
                start_height: chain.start_height,
            },
            connect_attempts: chain.connect_attempts,
            connect_retry: Duration::from_secs(chain.connect_retry_secs),
            redis_url: file_config.queue.redis_url,
            queue_prefix: file_config.queue.prefix,
            hub_buffer: file_config.hub.client_buffer,
            contracts: file_config.contracts,
        })
    }
}

/// Replace the address of every contract with `role`, or add one named
/// after the role if there is none.
fn override_contract(contracts: &mut Vec<ContractConfig>, role: EntityKind, address: Address) {
    let mut found = false;
    for contract in contracts.iter_mut().filter(|c| c.role == role) {
        contract.address = address;
        found = true;
    }
    if !found {
        let name = match role {
            EntityKind::Rfq => "rfq",
            EntityKind::Auction => "auction",
        };
        contracts.push(ContractConfig {
            name: name.into(),
            address,
            role,
        });
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.chain.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "chain.poll_interval_secs must be positive".into(),
        ));
    }
    if config.chain.connect_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "chain.connect_attempts must be positive".into(),
        ));
    }
    if config.hub.client_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "hub.client_buffer must be positive".into(),
        ));
    }

    let mut names = HashSet::new();
    let mut addresses = HashSet::new();
    for contract in &config.contracts {
        if contract.address == Address::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "contract {} has the zero address",
                contract.name
            )));
        }
        if !names.insert(contract.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate contract name {}",
                contract.name
            )));
        }
        if !addresses.insert(contract.address) {
            return Err(ConfigError::ValidationError(format!(
                "contract address {} is configured twice",
                contract.address
            )));
        }
    }
    Ok(())
}
