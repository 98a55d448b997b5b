//! Extensible payload (`EXTENSIBLE`), the carrier for consensus and
//! other plugin traffic

use crate::core::serialization::{
    var_bytes_size, BinaryReader, BinaryWriter, FormatError, Serializable,
};
use crate::core::types::{UInt160, UInt256};
use crate::network::payloads::witness::Witness;
use serde::{Deserialize, Serialize};

/// Maximum category name length
pub const MAX_CATEGORY_SIZE: usize = 32;

/// Maximum data size
pub const MAX_EXTENSIBLE_DATA: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensiblePayload {
    pub category: String,
    pub valid_block_start: u32,
    pub valid_block_end: u32,
    pub sender: UInt160,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    pub witness: Witness,
}

impl ExtensiblePayload {
    pub fn hash(&self) -> UInt256 {
        let mut writer = BinaryWriter::new();
        self.encode_unsigned(&mut writer);
        UInt256::sha256(&writer.into_bytes())
    }

    /// Whether the payload may be relayed at `height`
    pub fn is_valid_at(&self, height: u32) -> bool {
        height >= self.valid_block_start && height < self.valid_block_end
    }

    fn encode_unsigned(&self, writer: &mut BinaryWriter) {
        writer.write_var_string(&self.category);
        writer.write_u32(self.valid_block_start);
        writer.write_u32(self.valid_block_end);
        writer.write_serializable(&self.sender);
        writer.write_var_bytes(&self.data);
    }
}

impl Serializable for ExtensiblePayload {
    fn size(&self) -> usize {
        var_bytes_size(self.category.len())
            + 4
            + 4
            + UInt160::LEN
            + var_bytes_size(self.data.len())
            + 1
            + self.witness.size()
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        self.encode_unsigned(writer);
        writer.write_u8(1);
        writer.write_serializable(&self.witness);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let category = reader.read_var_string(MAX_CATEGORY_SIZE)?;
        let valid_block_start = reader.read_u32()?;
        let valid_block_end = reader.read_u32()?;
        if valid_block_start >= valid_block_end {
            return Err(FormatError::invalid(format!(
                "validity range {}..{}",
                valid_block_start, valid_block_end
            )));
        }
        let sender = reader.read_serializable()?;
        let data = reader.read_var_bytes(MAX_EXTENSIBLE_DATA)?;
        if reader.read_u8()? != 1 {
            return Err(FormatError::invalid("extensible witness marker"));
        }
        let witness = reader.read_serializable()?;

        Ok(Self {
            category,
            valid_block_start,
            valid_block_end,
            sender,
            data,
            witness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtensiblePayload {
        ExtensiblePayload {
            category: "dBFT".to_string(),
            valid_block_start: 10,
            valid_block_end: 20,
            sender: UInt160::from_bytes([7; 20]),
            data: vec![1, 2, 3, 4],
            witness: Witness::new(vec![0x0C], vec![0x41]),
        }
    }

    #[test]
    fn test_extensible_round_trip() {
        let payload = sample();
        let bytes = payload.to_array();
        assert_eq!(bytes.len(), payload.size());
        assert_eq!(ExtensiblePayload::from_array(&bytes).unwrap(), payload);
        assert!(payload.is_valid_at(10));
        assert!(!payload.is_valid_at(20));
    }

    #[test]
    fn test_empty_validity_range_rejected() {
        let mut payload = sample();
        payload.valid_block_end = payload.valid_block_start;
        assert!(ExtensiblePayload::from_array(&payload.to_array()).is_err());
    }

    #[test]
    fn test_category_too_long() {
        let mut payload = sample();
        payload.category = "x".repeat(33);
        assert!(matches!(
            ExtensiblePayload::from_array(&payload.to_array()),
            Err(FormatError::TooLarge { value: 33, max: 32 })
        ));
    }

    #[test]
    fn test_witness_marker() {
        let payload = sample();
        let mut bytes = payload.to_array();
        let marker = bytes.len() - payload.witness.size() - 1;
        bytes[marker] = 0;
        assert!(ExtensiblePayload::from_array(&bytes).is_err());
        assert_ne!(payload.hash(), UInt256::zero());
    }
}
