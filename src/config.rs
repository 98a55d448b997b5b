//! Node configuration
//!
//! Stored as JSON. Missing fields fall back to their defaults.

use crate::network::capabilities::NodeCapability;
use crate::network::ipfilter::{IpFilter, IpFilterConfig, IpFilterError};
use crate::network::payloads::version::{VersionPayload, MAX_USER_AGENT_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Default network magic
pub const DEFAULT_NETWORK: u32 = 860_833_102;

/// Default P2P listen port
pub const DEFAULT_PORT: u16 = 10333;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Validation(String),
}

impl From<IpFilterError> for ConfigError {
    fn from(e: IpFilterError) -> Self {
        ConfigError::Validation(e.to_string())
    }
}

/// Settings of the local node's protocol layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Network magic sent in VERSION
    pub network: u32,
    pub user_agent: String,
    /// TCP port advertised to peers
    pub port: u16,
    /// Compress outbound payloads (advertises `DisableCompression` when off)
    pub enable_compression: bool,
    pub ip_filter: IpFilterConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK,
            user_agent: format!("/epicchain-p2p:{}/", env!("CARGO_PKG_VERSION")),
            port: DEFAULT_PORT,
            enable_compression: true,
            ip_filter: IpFilterConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&data)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation("port must not be 0".to_string()));
        }
        if self.user_agent.len() > MAX_USER_AGENT_SIZE {
            return Err(ConfigError::Validation("user agent too long".to_string()));
        }
        self.ip_filter.validate()?;
        Ok(())
    }

    /// Filter populated from `ip_filter`
    pub fn build_ip_filter(&self) -> Result<IpFilter, ConfigError> {
        Ok(IpFilter::from_config(&self.ip_filter)?)
    }

    /// Capabilities advertised in VERSION and ADDR
    pub fn capabilities(&self, start_height: u32) -> Vec<NodeCapability> {
        let mut capabilities = vec![
            NodeCapability::TcpServer { port: self.port },
            NodeCapability::FullNode { start_height },
        ];
        if !self.enable_compression {
            capabilities.push(NodeCapability::DisableCompression);
        }
        capabilities
    }

    /// VERSION payload for the local node at `start_height`
    pub fn version_payload(&self, start_height: u32) -> VersionPayload {
        VersionPayload::new(
            self.network,
            rand::random(),
            self.user_agent.clone(),
            self.capabilities(start_height),
        )
    }
}
