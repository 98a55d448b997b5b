//! Handshake payload (`VERSION`)

use crate::core::serialization::{
    var_bytes_size, var_list_size, BinaryReader, BinaryWriter, FormatError, Serializable,
};
use crate::network::capabilities::NodeCapability;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Protocol version spoken by this implementation
pub const PROTOCOL_VERSION: u32 = 0;

/// Maximum capabilities in one payload
pub const MAX_CAPABILITIES: usize = 32;

/// Maximum user agent length in bytes
pub const MAX_USER_AGENT_SIZE: usize = 1024;

/// First message sent on every connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPayload {
    /// Network magic
    pub network: u32,
    pub version: u32,
    pub timestamp: u32,
    pub nonce: u32,
    pub user_agent: String,
    pub capabilities: Vec<NodeCapability>,
}

impl VersionPayload {
    pub fn new(
        network: u32,
        nonce: u32,
        user_agent: impl Into<String>,
        capabilities: Vec<NodeCapability>,
    ) -> Self {
        Self {
            network,
            version: PROTOCOL_VERSION,
            timestamp: Utc::now().timestamp() as u32,
            nonce,
            user_agent: user_agent.into(),
            capabilities,
        }
    }

    /// Whether the sender accepts compressed payloads
    pub fn allow_compression(&self) -> bool {
        !self.capabilities.contains(&NodeCapability::DisableCompression)
    }

    /// Height advertised by a full node capability
    pub fn start_height(&self) -> Option<u32> {
        self.capabilities.iter().find_map(|cap| match cap {
            NodeCapability::FullNode { start_height } => Some(*start_height),
            _ => None,
        })
    }
}

impl Serializable for VersionPayload {
    fn size(&self) -> usize {
        4 + 4 + 4 + 4 + var_bytes_size(self.user_agent.len()) + var_list_size(&self.capabilities)
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.network);
        writer.write_u32(self.version);
        writer.write_u32(self.timestamp);
        writer.write_u32(self.nonce);
        writer.write_var_string(&self.user_agent);
        writer.write_serializable_list(&self.capabilities);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let network = reader.read_u32()?;
        let version = reader.read_u32()?;
        let timestamp = reader.read_u32()?;
        let nonce = reader.read_u32()?;
        let user_agent = reader.read_var_string(MAX_USER_AGENT_SIZE)?;
        let capabilities: Vec<NodeCapability> = reader.read_serializable_list(MAX_CAPABILITIES)?;

        let mut seen = HashSet::new();
        if !capabilities.iter().all(|cap| seen.insert(cap.type_code())) {
            return Err(FormatError::invalid("duplicate capability type"));
        }

        Ok(Self {
            network,
            version,
            timestamp,
            nonce,
            user_agent,
            capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VersionPayload {
        VersionPayload {
            network: 0x334F_454E,
            version: PROTOCOL_VERSION,
            timestamp: 1_700_000_000,
            nonce: 0xDEADBEEF,
            user_agent: "/epicchain-p2p:0.1.0/".to_string(),
            capabilities: vec![
                NodeCapability::TcpServer { port: 10333 },
                NodeCapability::FullNode { start_height: 99 },
            ],
        }
    }

    #[test]
    fn test_version_round_trip() {
        let payload = sample();
        let bytes = payload.to_array();
        assert_eq!(bytes.len(), payload.size());
        assert_eq!(VersionPayload::from_array(&bytes).unwrap(), payload);
        assert_eq!(payload.start_height(), Some(99));
        assert!(payload.allow_compression());
    }

    #[test]
    fn test_duplicate_capabilities_rejected() {
        let mut payload = sample();
        payload
            .capabilities
            .push(NodeCapability::TcpServer { port: 1 });
        assert!(matches!(
            VersionPayload::from_array(&payload.to_array()),
            Err(FormatError::Invalid(_))
        ));
    }

    #[test]
    fn test_user_agent_bound() {
        let mut payload = sample();
        payload.user_agent = "x".repeat(MAX_USER_AGENT_SIZE + 1);
        assert!(matches!(
            VersionPayload::from_array(&payload.to_array()),
            Err(FormatError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_disable_compression() {
        let mut payload = sample();
        payload.capabilities.push(NodeCapability::DisableCompression);
        assert!(!payload.allow_compression());
    }
}
