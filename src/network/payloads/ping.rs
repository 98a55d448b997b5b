//! Keep-alive payload (`PING` / `PONG`)

use crate::core::serialization::{BinaryReader, BinaryWriter, FormatError, Serializable};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Liveness probe carrying the sender's chain height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPayload {
    pub last_block_index: u32,
    pub timestamp: u32,
    pub nonce: u32,
}

impl PingPayload {
    /// Ping stamped with the current time and a random nonce
    pub fn new(last_block_index: u32) -> Self {
        Self {
            last_block_index,
            timestamp: Utc::now().timestamp() as u32,
            nonce: rand::random(),
        }
    }

    /// Pong answering `ping`, echoing its nonce
    pub fn reply(ping: &PingPayload, last_block_index: u32) -> Self {
        Self {
            last_block_index,
            timestamp: Utc::now().timestamp() as u32,
            nonce: ping.nonce,
        }
    }
}

impl Serializable for PingPayload {
    fn size(&self) -> usize {
        12
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.last_block_index);
        writer.write_u32(self.timestamp);
        writer.write_u32(self.nonce);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            last_block_index: reader.read_u32()?,
            timestamp: reader.read_u32()?,
            nonce: reader.read_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_layout() {
        let ping = PingPayload {
            last_block_index: 1,
            timestamp: 2,
            nonce: 3,
        };
        assert_eq!(ping.to_array(), vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);
        assert_eq!(PingPayload::from_array(&ping.to_array()).unwrap(), ping);
    }

    #[test]
    fn test_pong_echoes_nonce() {
        let ping = PingPayload::new(10);
        let pong = PingPayload::reply(&ping, 12);
        assert_eq!(pong.nonce, ping.nonce);
        assert_eq!(pong.last_block_index, 12);
    }

    #[test]
    fn test_short_ping_rejected() {
        assert!(matches!(
            PingPayload::from_array(&[0u8; 11]),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }
}
