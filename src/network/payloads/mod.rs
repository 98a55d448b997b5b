//! Payload codec registry
//!
//! Every message type maps to exactly one payload schema. The envelope hands
//! the raw (decompressed) payload bytes to [`Payload::decode`], which selects
//! the schema from the message type and requires the bytes to be fully
//! consumed. Types without a schema decode to [`Payload::Empty`].

pub mod address;
pub mod block;
pub mod extensible;
pub mod filter;
pub mod inventory;
pub mod ping;
pub mod transaction;
pub mod version;
pub mod witness;

pub use address::{
    AddrPayload, AddressState, DisconnectReason, NetworkAddress, MAX_ADDR_PER_MESSAGE,
};
pub use block::{
    Block, GetBlockByIndexPayload, GetBlocksPayload, Header, HeadersPayload, MerkleBlockPayload,
    MAX_HEADERS_COUNT,
};
pub use extensible::ExtensiblePayload;
pub use filter::{FilterAddPayload, FilterLoadPayload};
pub use inventory::{InventoryPayload, InventoryType, MAX_HASHES_COUNT};
pub use ping::PingPayload;
pub use transaction::{Transaction, TransactionAttribute};
pub use version::{VersionPayload, MAX_CAPABILITIES, PROTOCOL_VERSION};
pub use witness::{Signer, Witness, WitnessCondition, WitnessRule, WitnessRuleAction, WitnessScope};

use crate::core::serialization::{BinaryReader, BinaryWriter, FormatError, Serializable};
use crate::network::message::MessageType;
use serde::{Deserialize, Serialize};

/// Decoded body of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    /// No body (VERACK, GETADDR, MEMPOOL, FILTERCLEAR and unmapped types)
    Empty,
    Version(VersionPayload),
    Addr(AddrPayload),
    Ping(PingPayload),
    Inventory(InventoryPayload),
    GetBlocks(GetBlocksPayload),
    GetBlockByIndex(GetBlockByIndexPayload),
    Headers(HeadersPayload),
    Block(Block),
    Transaction(Transaction),
    Extensible(ExtensiblePayload),
    FilterLoad(FilterLoadPayload),
    FilterAdd(FilterAddPayload),
    MerkleBlock(MerkleBlockPayload),
}

impl Payload {
    /// Decode `data` with the schema registered for `msg_type`
    ///
    /// Zero bytes always yield [`Payload::Empty`].
    pub fn decode(msg_type: MessageType, data: &[u8]) -> Result<Self, FormatError> {
        if data.is_empty() {
            return Ok(Payload::Empty);
        }

        let mut reader = BinaryReader::new(data);
        let payload = match msg_type {
            MessageType::Version => Payload::Version(reader.read_serializable()?),
            MessageType::Addr => Payload::Addr(reader.read_serializable()?),
            MessageType::Ping | MessageType::Pong => Payload::Ping(reader.read_serializable()?),
            MessageType::Inv | MessageType::GetData | MessageType::NotFound => {
                Payload::Inventory(reader.read_serializable()?)
            }
            MessageType::GetBlocks => Payload::GetBlocks(reader.read_serializable()?),
            MessageType::GetHeaders | MessageType::GetBlockByIndex => {
                Payload::GetBlockByIndex(reader.read_serializable()?)
            }
            MessageType::Headers => Payload::Headers(reader.read_serializable()?),
            MessageType::Block => Payload::Block(reader.read_serializable()?),
            MessageType::Transaction => Payload::Transaction(reader.read_serializable()?),
            MessageType::Extensible => Payload::Extensible(reader.read_serializable()?),
            MessageType::FilterLoad => Payload::FilterLoad(reader.read_serializable()?),
            MessageType::FilterAdd => Payload::FilterAdd(reader.read_serializable()?),
            MessageType::MerkleBlock => Payload::MerkleBlock(reader.read_serializable()?),
            MessageType::Verack
            | MessageType::GetAddr
            | MessageType::Mempool
            | MessageType::FilterClear => return Err(FormatError::TrailingBytes(data.len())),
            other => {
                log::debug!(
                    "No payload schema for message type {}, ignoring {} bytes",
                    other,
                    data.len()
                );
                return Ok(Payload::Empty);
            }
        };
        reader.finish()?;
        Ok(payload)
    }

    /// Canonical bytes of the payload
    pub fn to_array(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(self.size());
        self.encode(&mut writer);
        writer.into_bytes()
    }

    pub fn size(&self) -> usize {
        match self {
            Payload::Empty => 0,
            Payload::Version(p) => p.size(),
            Payload::Addr(p) => p.size(),
            Payload::Ping(p) => p.size(),
            Payload::Inventory(p) => p.size(),
            Payload::GetBlocks(p) => p.size(),
            Payload::GetBlockByIndex(p) => p.size(),
            Payload::Headers(p) => p.size(),
            Payload::Block(p) => p.size(),
            Payload::Transaction(p) => p.size(),
            Payload::Extensible(p) => p.size(),
            Payload::FilterLoad(p) => p.size(),
            Payload::FilterAdd(p) => p.size(),
            Payload::MerkleBlock(p) => p.size(),
        }
    }

    pub fn encode(&self, writer: &mut BinaryWriter) {
        match self {
            Payload::Empty => {}
            Payload::Version(p) => writer.write_serializable(p),
            Payload::Addr(p) => writer.write_serializable(p),
            Payload::Ping(p) => writer.write_serializable(p),
            Payload::Inventory(p) => writer.write_serializable(p),
            Payload::GetBlocks(p) => writer.write_serializable(p),
            Payload::GetBlockByIndex(p) => writer.write_serializable(p),
            Payload::Headers(p) => writer.write_serializable(p),
            Payload::Block(p) => writer.write_serializable(p),
            Payload::Transaction(p) => writer.write_serializable(p),
            Payload::Extensible(p) => writer.write_serializable(p),
            Payload::FilterLoad(p) => writer.write_serializable(p),
            Payload::FilterAdd(p) => writer.write_serializable(p),
            Payload::MerkleBlock(p) => writer.write_serializable(p),
        }
    }

    /// Schema name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Empty => "Empty",
            Payload::Version(_) => "Version",
            Payload::Addr(_) => "Addr",
            Payload::Ping(_) => "Ping",
            Payload::Inventory(_) => "Inventory",
            Payload::GetBlocks(_) => "GetBlocks",
            Payload::GetBlockByIndex(_) => "GetBlockByIndex",
            Payload::Headers(_) => "Headers",
            Payload::Block(_) => "Block",
            Payload::Transaction(_) => "Transaction",
            Payload::Extensible(_) => "Extensible",
            Payload::FilterLoad(_) => "FilterLoad",
            Payload::FilterAdd(_) => "FilterAdd",
            Payload::MerkleBlock(_) => "MerkleBlock",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UInt256;

    #[test]
    fn test_zero_bytes_is_empty_for_any_type() {
        for msg_type in [MessageType::Version, MessageType::Ping, MessageType::Verack] {
            assert_eq!(Payload::decode(msg_type, &[]).unwrap(), Payload::Empty);
        }
    }

    #[test]
    fn test_dispatch_by_type() {
        let ping = PingPayload {
            last_block_index: 1,
            timestamp: 2,
            nonce: 3,
        };
        let bytes = ping.to_array();
        assert_eq!(
            Payload::decode(MessageType::Pong, &bytes).unwrap(),
            Payload::Ping(ping)
        );

        let inv = InventoryPayload::new(InventoryType::Transaction, vec![UInt256::zero()]);
        let decoded = Payload::decode(MessageType::NotFound, &inv.to_array()).unwrap();
        assert_eq!(decoded, Payload::Inventory(inv));
        assert_eq!(decoded.type_name(), "Inventory");
    }

    #[test]
    fn test_unmapped_type_ignores_body() {
        let decoded = Payload::decode(MessageType::Unknown(0x77), &[1, 2, 3]).unwrap();
        assert!(decoded.is_empty());
        let decoded = Payload::decode(MessageType::Consensus, &[1, 2, 3]).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = PingPayload::new(5).to_array();
        bytes.push(0);
        assert_eq!(
            Payload::decode(MessageType::Ping, &bytes),
            Err(FormatError::TrailingBytes(1))
        );
        assert!(Payload::decode(MessageType::Verack, &[0]).is_err());
    }

    #[test]
    fn test_encode_matches_schema() {
        let payload = Payload::GetBlockByIndex(GetBlockByIndexPayload::new(7, 10));
        assert_eq!(payload.size(), 6);
        assert_eq!(payload.to_array(), vec![7, 0, 0, 0, 10, 0]);
        assert_eq!(Payload::Empty.to_array(), Vec::<u8>::new());
    }

    #[test]
    fn test_header_request_for_all_available() {
        use crate::network::message::Message;

        for msg_type in [MessageType::GetHeaders, MessageType::GetBlockByIndex] {
            let msg = Message::new(
                msg_type,
                Payload::GetBlockByIndex(GetBlockByIndexPayload::new(100, -1)),
            );
            let decoded = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
            assert_eq!(decoded, msg);
        }
    }
}
