//! Inventory announcements (`INV`, `GETDATA`, `NOTFOUND`)

use crate::core::serialization::{
    var_list_size, BinaryReader, BinaryWriter, FormatError, Serializable,
};
use crate::core::types::UInt256;
use serde::{Deserialize, Serialize};

/// Maximum hashes in one inventory payload
pub const MAX_HASHES_COUNT: usize = 500;

/// Kind of inventory being announced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryType {
    Transaction = 0x2B,
    Block = 0x2C,
    Consensus = 0x2D,
    Extensible = 0x2E,
}

impl TryFrom<u8> for InventoryType {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x2B => Ok(InventoryType::Transaction),
            0x2C => Ok(InventoryType::Block),
            0x2D => Ok(InventoryType::Consensus),
            0x2E => Ok(InventoryType::Extensible),
            other => Err(FormatError::invalid(format!(
                "inventory type {:#04x}",
                other
            ))),
        }
    }
}

/// Batch of hashes of a single inventory type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPayload {
    #[serde(rename = "type")]
    pub inventory_type: InventoryType,
    pub hashes: Vec<UInt256>,
}

impl InventoryPayload {
    pub fn new(inventory_type: InventoryType, hashes: Vec<UInt256>) -> Self {
        Self {
            inventory_type,
            hashes,
        }
    }

    /// Split a long hash list into payloads that each fit the protocol limit
    pub fn create_group(inventory_type: InventoryType, hashes: &[UInt256]) -> Vec<Self> {
        hashes
            .chunks(MAX_HASHES_COUNT)
            .map(|chunk| Self::new(inventory_type, chunk.to_vec()))
            .collect()
    }
}

impl Serializable for InventoryPayload {
    fn size(&self) -> usize {
        1 + var_list_size(&self.hashes)
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.inventory_type as u8);
        writer.write_serializable_list(&self.hashes);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let inventory_type = InventoryType::try_from(reader.read_u8()?)?;
        let hashes = reader.read_serializable_list(MAX_HASHES_COUNT)?;
        Ok(Self {
            inventory_type,
            hashes,
        })
    }
}
