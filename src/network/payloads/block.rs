//! Block and header payloads
//!
//! Covers `BLOCK`, `HEADERS`, `GETBLOCKS`, `GETHEADERS`, `GETBLOCKBYINDEX`
//! and `MERKLEBLOCK`.

use crate::core::serialization::{
    var_bytes_size, var_int_size, var_list_size, BinaryReader, BinaryWriter, FormatError,
    Serializable,
};
use crate::core::types::{UInt160, UInt256};
use crate::network::payloads::transaction::Transaction;
use crate::network::payloads::witness::Witness;
use serde::{Deserialize, Serialize};

/// Maximum headers in one `HEADERS` reply (and per index request)
pub const MAX_HEADERS_COUNT: usize = 2000;

/// Maximum transactions in a block
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = u16::MAX as usize;

// =============================================================================
// Header
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub prev_hash: UInt256,
    pub merkle_root: UInt256,
    pub timestamp: u64,
    pub nonce: u64,
    pub index: u32,
    pub primary_index: u8,
    pub next_consensus: UInt160,
    pub witness: Witness,
}

impl Header {
    const UNSIGNED_SIZE: usize = 4 + 32 + 32 + 8 + 8 + 4 + 1 + 20;

    /// Hash of the unsigned part
    pub fn hash(&self) -> UInt256 {
        let mut writer = BinaryWriter::with_capacity(Self::UNSIGNED_SIZE);
        self.encode_unsigned(&mut writer);
        UInt256::sha256(&writer.into_bytes())
    }

    fn encode_unsigned(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.version);
        writer.write_serializable(&self.prev_hash);
        writer.write_serializable(&self.merkle_root);
        writer.write_u64(self.timestamp);
        writer.write_u64(self.nonce);
        writer.write_u32(self.index);
        writer.write_u8(self.primary_index);
        writer.write_serializable(&self.next_consensus);
    }
}

impl Serializable for Header {
    fn size(&self) -> usize {
        Self::UNSIGNED_SIZE + 1 + self.witness.size()
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        self.encode_unsigned(writer);
        writer.write_var_int(1);
        writer.write_serializable(&self.witness);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let version = reader.read_u32()?;
        let prev_hash = reader.read_serializable()?;
        let merkle_root = reader.read_serializable()?;
        let timestamp = reader.read_u64()?;
        let nonce = reader.read_u64()?;
        let index = reader.read_u32()?;
        let primary_index = reader.read_u8()?;
        let next_consensus = reader.read_serializable()?;
        if reader.read_var_int(1)? != 1 {
            return Err(FormatError::invalid("header must carry exactly one witness"));
        }
        let witness = reader.read_serializable()?;

        Ok(Self {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            nonce,
            index,
            primary_index,
            next_consensus,
            witness,
        })
    }
}

// =============================================================================
// Block
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> UInt256 {
        self.header.hash()
    }

    pub fn index(&self) -> u32 {
        self.header.index
    }
}

impl Serializable for Block {
    fn size(&self) -> usize {
        self.header.size() + var_list_size(&self.transactions)
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_serializable(&self.header);
        writer.write_serializable_list(&self.transactions);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let header = reader.read_serializable()?;
        let transactions = reader.read_serializable_list(MAX_TRANSACTIONS_PER_BLOCK)?;
        Ok(Self {
            header,
            transactions,
        })
    }
}

// =============================================================================
// Header / block requests
// =============================================================================

/// Reply to `GETHEADERS`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadersPayload {
    pub headers: Vec<Header>,
}

impl Serializable for HeadersPayload {
    fn size(&self) -> usize {
        var_list_size(&self.headers)
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_serializable_list(&self.headers);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            headers: reader.read_serializable_list(MAX_HEADERS_COUNT)?,
        })
    }
}

/// Request blocks following `hash_start`; `count == -1` means "as many as allowed"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlocksPayload {
    pub hash_start: UInt256,
    pub count: i16,
}

impl GetBlocksPayload {
    pub fn new(hash_start: UInt256, count: i16) -> Self {
        Self { hash_start, count }
    }
}

impl Serializable for GetBlocksPayload {
    fn size(&self) -> usize {
        UInt256::LEN + 2
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_serializable(&self.hash_start);
        writer.write_i16(self.count);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let hash_start = reader.read_serializable()?;
        let count = reader.read_i16()?;
        if count < -1 || count == 0 {
            return Err(FormatError::invalid(format!("block request count {}", count)));
        }
        Ok(Self { hash_start, count })
    }
}

/// Request blocks or headers by height range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlockByIndexPayload {
    pub index_start: u32,
    pub count: i16,
}

impl GetBlockByIndexPayload {
    pub fn new(index_start: u32, count: i16) -> Self {
        Self { index_start, count }
    }
}

impl Serializable for GetBlockByIndexPayload {
    fn size(&self) -> usize {
        4 + 2
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.index_start);
        writer.write_i16(self.count);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let index_start = reader.read_u32()?;
        let count = reader.read_i16()?;
        if count == 0 || count < -1 || count > MAX_HEADERS_COUNT as i16 {
            return Err(FormatError::invalid(format!("index request count {}", count)));
        }
        Ok(Self { index_start, count })
    }
}

// =============================================================================
// Merkle block
// =============================================================================

/// Header plus the partial merkle tree matching a loaded bloom filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleBlockPayload {
    pub header: Header,
    pub tx_count: u32,
    pub hashes: Vec<UInt256>,
    #[serde(with = "hex::serde")]
    pub flags: Vec<u8>,
}

impl Serializable for MerkleBlockPayload {
    fn size(&self) -> usize {
        self.header.size()
            + var_int_size(self.tx_count as u64)
            + var_list_size(&self.hashes)
            + var_bytes_size(self.flags.len())
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_serializable(&self.header);
        writer.write_var_int(self.tx_count as u64);
        writer.write_serializable_list(&self.hashes);
        writer.write_var_bytes(&self.flags);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let header = reader.read_serializable()?;
        let tx_count = reader.read_var_int(MAX_TRANSACTIONS_PER_BLOCK as u64)? as usize;
        let hashes = reader.read_serializable_list(tx_count)?;
        let flags = reader.read_var_bytes((tx_count.max(1) + 7) / 8)?;
        Ok(Self {
            header,
            tx_count: tx_count as u32,
            hashes,
            flags,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::network::payloads::transaction::tests::sample_tx;

    pub(crate) fn sample_header(index: u32) -> Header {
        Header {
            version: 0,
            prev_hash: UInt256::from_bytes([index as u8; 32]),
            merkle_root: UInt256::zero(),
            timestamp: 1_700_000_000_000,
            nonce: 42,
            index,
            primary_index: 0,
            next_consensus: UInt160::from_bytes([9; 20]),
            witness: Witness::new(vec![0x0C, 0x40], vec![0x41]),
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = sample_header(5);
        let bytes = header.to_array();
        assert_eq!(bytes.len(), header.size());
        assert_eq!(Header::from_array(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_hash_excludes_witness() {
        let header = sample_header(5);
        let mut other = header.clone();
        other.witness = Witness::new(vec![1, 2, 3], vec![4]);
        assert_eq!(header.hash(), other.hash());
        assert_ne!(header.hash(), sample_header(6).hash());
    }

    #[test]
    fn test_header_witness_count_must_be_one() {
        let mut bytes = sample_header(1).to_array();
        bytes[Header::UNSIGNED_SIZE] = 2;
        assert!(Header::from_array(&bytes).is_err());
    }

    #[test]
    fn test_block_round_trip() {
        let block = Block {
            header: sample_header(10),
            transactions: vec![sample_tx(1), sample_tx(2)],
        };
        let decoded = Block::from_array(&block.to_array()).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.index(), 10);
    }

    #[test]
    fn test_empty_headers_payload() {
        let payload = HeadersPayload::default();
        assert_eq!(payload.to_array(), vec![0x00]);
        assert_eq!(HeadersPayload::from_array(&[0x00]).unwrap(), payload);
    }

    #[test]
    fn test_request_counts() {
        let ok = GetBlockByIndexPayload::new(100, -1);
        assert_eq!(GetBlockByIndexPayload::from_array(&ok.to_array()).unwrap(), ok);

        for bad in [0i16, -2, 2001] {
            let payload = GetBlockByIndexPayload::new(100, bad);
            assert!(GetBlockByIndexPayload::from_array(&payload.to_array()).is_err());
        }

        let blocks = GetBlocksPayload::new(UInt256::zero(), 500);
        assert_eq!(GetBlocksPayload::from_array(&blocks.to_array()).unwrap(), blocks);
        let zero = GetBlocksPayload::new(UInt256::zero(), 0);
        assert!(GetBlocksPayload::from_array(&zero.to_array()).is_err());
    }

    #[test]
    fn test_request_count_limits() {
        for count in [1i16, 2000] {
            let payload = GetBlockByIndexPayload::new(0, count);
            assert_eq!(GetBlockByIndexPayload::from_array(&payload.to_array()).unwrap(), payload);
        }
        let payload = GetBlockByIndexPayload::new(0, i16::MIN);
        assert!(GetBlockByIndexPayload::from_array(&payload.to_array()).is_err());
    }

    #[test]
    fn test_headers_payload_limit() {
        let full = HeadersPayload {
            headers: (0..MAX_HEADERS_COUNT as u32).map(sample_header).collect(),
        };
        let decoded = HeadersPayload::from_array(&full.to_array()).unwrap();
        assert_eq!(decoded.headers.len(), MAX_HEADERS_COUNT);
        assert_eq!(decoded, full);

        let mut over = full;
        over.headers.push(sample_header(MAX_HEADERS_COUNT as u32));
        assert!(matches!(
            HeadersPayload::from_array(&over.to_array()),
            Err(FormatError::TooLarge { value: 2001, max: 2000 })
        ));
    }

    #[test]
    fn test_merkle_block_flag_bound() {
        let payload = MerkleBlockPayload {
            header: sample_header(3),
            tx_count: 9,
            hashes: vec![UInt256::zero(); 3],
            flags: vec![0b1011, 0x01],
        };
        assert_eq!(MerkleBlockPayload::from_array(&payload.to_array()).unwrap(), payload);

        let mut oversized = payload.clone();
        oversized.flags = vec![0; 3];
        assert!(MerkleBlockPayload::from_array(&oversized.to_array()).is_err());
    }
}
