//! Node capabilities advertised in `VERSION` and `ADDR` payloads

use crate::core::serialization::{BinaryReader, BinaryWriter, FormatError, Serializable};
use serde::{Deserialize, Serialize};

/// Capability type codes
pub const CAP_TCP_SERVER: u8 = 0x01;
pub const CAP_WS_SERVER: u8 = 0x02;
pub const CAP_DISABLE_COMPRESSION: u8 = 0x03;
pub const CAP_FULL_NODE: u8 = 0x10;
pub const CAP_ARCHIVAL_NODE: u8 = 0x11;

/// A single advertised capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeCapability {
    /// Accepts TCP connections on `port`
    TcpServer { port: u16 },
    /// Accepts WebSocket connections on `port`
    WsServer { port: u16 },
    /// Peer does not want compressed payloads
    DisableCompression,
    /// Full node holding blocks from `start_height`
    FullNode { start_height: u32 },
    /// Keeps the complete block history
    ArchivalNode,
}

impl NodeCapability {
    pub fn type_code(&self) -> u8 {
        match self {
            NodeCapability::TcpServer { .. } => CAP_TCP_SERVER,
            NodeCapability::WsServer { .. } => CAP_WS_SERVER,
            NodeCapability::DisableCompression => CAP_DISABLE_COMPRESSION,
            NodeCapability::FullNode { .. } => CAP_FULL_NODE,
            NodeCapability::ArchivalNode => CAP_ARCHIVAL_NODE,
        }
    }

    /// Listening port, if this is a server capability
    pub fn server_port(&self) -> Option<u16> {
        match self {
            NodeCapability::TcpServer { port } | NodeCapability::WsServer { port } => Some(*port),
            _ => None,
        }
    }
}

fn read_zero_byte(reader: &mut BinaryReader<'_>) -> Result<(), FormatError> {
    match reader.read_u8()? {
        0 => Ok(()),
        other => Err(FormatError::invalid(format!(
            "capability padding byte {:#04x}",
            other
        ))),
    }
}

impl Serializable for NodeCapability {
    fn size(&self) -> usize {
        1 + match self {
            NodeCapability::TcpServer { .. } | NodeCapability::WsServer { .. } => 2,
            NodeCapability::DisableCompression | NodeCapability::ArchivalNode => 1,
            NodeCapability::FullNode { .. } => 4,
        }
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.type_code());
        match self {
            NodeCapability::TcpServer { port } | NodeCapability::WsServer { port } => {
                writer.write_u16(*port)
            }
            NodeCapability::DisableCompression | NodeCapability::ArchivalNode => writer.write_u8(0),
            NodeCapability::FullNode { start_height } => writer.write_u32(*start_height),
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        match reader.read_u8()? {
            CAP_TCP_SERVER => Ok(NodeCapability::TcpServer {
                port: reader.read_u16()?,
            }),
            CAP_WS_SERVER => Ok(NodeCapability::WsServer {
                port: reader.read_u16()?,
            }),
            CAP_DISABLE_COMPRESSION => {
                read_zero_byte(reader)?;
                Ok(NodeCapability::DisableCompression)
            }
            CAP_FULL_NODE => Ok(NodeCapability::FullNode {
                start_height: reader.read_u32()?,
            }),
            CAP_ARCHIVAL_NODE => {
                read_zero_byte(reader)?;
                Ok(NodeCapability::ArchivalNode)
            }
            other => Err(FormatError::invalid(format!(
                "capability type {:#04x}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_layouts() {
        assert_eq!(
            NodeCapability::TcpServer { port: 10333 }.to_array(),
            vec![0x01, 0x5D, 0x28]
        );
        assert_eq!(
            NodeCapability::FullNode { start_height: 1 }.to_array(),
            vec![0x10, 0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(NodeCapability::ArchivalNode.to_array(), vec![0x11, 0x00]);
    }

    #[test]
    fn test_capability_decode() {
        let cap = NodeCapability::from_array(&[0x02, 0x5E, 0x28]).unwrap();
        assert_eq!(cap, NodeCapability::WsServer { port: 10334 });
        assert_eq!(cap.server_port(), Some(10334));
        assert_eq!(NodeCapability::DisableCompression.server_port(), None);
    }

    #[test]
    fn test_unknown_capability_rejected() {
        assert!(matches!(
            NodeCapability::from_array(&[0x7F, 0x00]),
            Err(FormatError::Invalid(_))
        ));
        assert!(NodeCapability::from_array(&[0x03, 0x01]).is_err());
    }
}
