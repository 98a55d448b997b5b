//! Transaction wire format (`TRANSACTION`, block bodies)
//!
//! Only structure is checked here. Fees, witnesses and scripts are verified
//! by the consensus layer.

use crate::core::serialization::{
    var_bytes_size, var_list_size, BinaryReader, BinaryWriter, FormatError, Serializable,
};
use crate::core::types::{UInt160, UInt256};
use crate::network::payloads::witness::{Signer, Witness};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Only transaction version understood
pub const TX_VERSION: u8 = 0;

/// Maximum signers + attributes
pub const MAX_TRANSACTION_ATTRIBUTES: usize = 16;

/// Maximum script / oracle result size
pub const MAX_SCRIPT_SIZE: usize = u16::MAX as usize;

const ATTR_HIGH_PRIORITY: u8 = 0x01;
const ATTR_ORACLE_RESPONSE: u8 = 0x11;
const ATTR_NOT_VALID_BEFORE: u8 = 0x20;
const ATTR_CONFLICTS: u8 = 0x21;
const ATTR_NOTARY_ASSISTED: u8 = 0x22;

// =============================================================================
// Attributes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionAttribute {
    HighPriority,
    OracleResponse {
        id: u64,
        code: u8,
        #[serde(with = "hex::serde")]
        result: Vec<u8>,
    },
    NotValidBefore {
        height: u32,
    },
    Conflicts {
        hash: UInt256,
    },
    NotaryAssisted {
        n_keys: u8,
    },
}

impl TransactionAttribute {
    pub fn type_code(&self) -> u8 {
        match self {
            TransactionAttribute::HighPriority => ATTR_HIGH_PRIORITY,
            TransactionAttribute::OracleResponse { .. } => ATTR_ORACLE_RESPONSE,
            TransactionAttribute::NotValidBefore { .. } => ATTR_NOT_VALID_BEFORE,
            TransactionAttribute::Conflicts { .. } => ATTR_CONFLICTS,
            TransactionAttribute::NotaryAssisted { .. } => ATTR_NOTARY_ASSISTED,
        }
    }

    /// Whether several attributes of this type may appear together
    pub fn allow_multiple(&self) -> bool {
        matches!(self, TransactionAttribute::Conflicts { .. })
    }
}

impl Serializable for TransactionAttribute {
    fn size(&self) -> usize {
        1 + match self {
            TransactionAttribute::HighPriority => 0,
            TransactionAttribute::OracleResponse { result, .. } => {
                8 + 1 + var_bytes_size(result.len())
            }
            TransactionAttribute::NotValidBefore { .. } => 4,
            TransactionAttribute::Conflicts { .. } => UInt256::LEN,
            TransactionAttribute::NotaryAssisted { .. } => 1,
        }
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.type_code());
        match self {
            TransactionAttribute::HighPriority => {}
            TransactionAttribute::OracleResponse { id, code, result } => {
                writer.write_u64(*id);
                writer.write_u8(*code);
                writer.write_var_bytes(result);
            }
            TransactionAttribute::NotValidBefore { height } => writer.write_u32(*height),
            TransactionAttribute::Conflicts { hash } => writer.write_serializable(hash),
            TransactionAttribute::NotaryAssisted { n_keys } => writer.write_u8(*n_keys),
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        match reader.read_u8()? {
            ATTR_HIGH_PRIORITY => Ok(TransactionAttribute::HighPriority),
            ATTR_ORACLE_RESPONSE => Ok(TransactionAttribute::OracleResponse {
                id: reader.read_u64()?,
                code: reader.read_u8()?,
                result: reader.read_var_bytes(MAX_SCRIPT_SIZE)?,
            }),
            ATTR_NOT_VALID_BEFORE => Ok(TransactionAttribute::NotValidBefore {
                height: reader.read_u32()?,
            }),
            ATTR_CONFLICTS => Ok(TransactionAttribute::Conflicts {
                hash: reader.read_serializable()?,
            }),
            ATTR_NOTARY_ASSISTED => Ok(TransactionAttribute::NotaryAssisted {
                n_keys: reader.read_u8()?,
            }),
            other => Err(FormatError::invalid(format!(
                "transaction attribute type {:#04x}",
                other
            ))),
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub nonce: u32,
    pub system_fee: i64,
    pub network_fee: i64,
    pub valid_until_block: u32,
    pub signers: Vec<Signer>,
    pub attributes: Vec<TransactionAttribute>,
    #[serde(with = "hex::serde")]
    pub script: Vec<u8>,
    pub witnesses: Vec<Witness>,
}

impl Transaction {
    /// Hash of the unsigned part (everything but the witnesses)
    pub fn hash(&self) -> UInt256 {
        let mut writer = BinaryWriter::with_capacity(self.size());
        self.encode_unsigned(&mut writer);
        UInt256::sha256(&writer.into_bytes())
    }

    /// Account paying the fees
    pub fn sender(&self) -> Option<UInt160> {
        self.signers.first().map(|s| s.account)
    }

    fn encode_unsigned(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.version);
        writer.write_u32(self.nonce);
        writer.write_i64(self.system_fee);
        writer.write_i64(self.network_fee);
        writer.write_u32(self.valid_until_block);
        writer.write_serializable_list(&self.signers);
        writer.write_serializable_list(&self.attributes);
        writer.write_var_bytes(&self.script);
    }

    fn read_signers(reader: &mut BinaryReader<'_>) -> Result<Vec<Signer>, FormatError> {
        let signers: Vec<Signer> = reader.read_serializable_list(MAX_TRANSACTION_ATTRIBUTES)?;
        if signers.is_empty() {
            return Err(FormatError::invalid("transaction without signers"));
        }
        let mut accounts = HashSet::new();
        if !signers.iter().all(|s| accounts.insert(s.account)) {
            return Err(FormatError::invalid("duplicate signer account"));
        }
        Ok(signers)
    }

    fn read_attributes(
        reader: &mut BinaryReader<'_>,
        max: usize,
    ) -> Result<Vec<TransactionAttribute>, FormatError> {
        let attributes: Vec<TransactionAttribute> = reader.read_serializable_list(max)?;
        let mut single = HashSet::new();
        for attr in attributes.iter().filter(|a| !a.allow_multiple()) {
            if !single.insert(attr.type_code()) {
                return Err(FormatError::invalid("duplicate transaction attribute"));
            }
        }
        Ok(attributes)
    }
}

impl Serializable for Transaction {
    fn size(&self) -> usize {
        1 + 4
            + 8
            + 8
            + 4
            + var_list_size(&self.signers)
            + var_list_size(&self.attributes)
            + var_bytes_size(self.script.len())
            + var_list_size(&self.witnesses)
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        self.encode_unsigned(writer);
        writer.write_serializable_list(&self.witnesses);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let version = reader.read_u8()?;
        if version != TX_VERSION {
            return Err(FormatError::invalid(format!("transaction version {}", version)));
        }
        let nonce = reader.read_u32()?;
        let system_fee = reader.read_i64()?;
        if system_fee < 0 {
            return Err(FormatError::invalid("negative system fee"));
        }
        let network_fee = reader.read_i64()?;
        if network_fee < 0 {
            return Err(FormatError::invalid("negative network fee"));
        }
        let valid_until_block = reader.read_u32()?;
        let signers = Self::read_signers(reader)?;
        let attributes = Self::read_attributes(reader, MAX_TRANSACTION_ATTRIBUTES - signers.len())?;
        let script = reader.read_var_bytes(MAX_SCRIPT_SIZE)?;
        if script.is_empty() {
            return Err(FormatError::invalid("empty transaction script"));
        }
        let witnesses: Vec<Witness> = reader.read_serializable_list(signers.len())?;
        if witnesses.len() != signers.len() {
            return Err(FormatError::invalid("witness count differs from signer count"));
        }

        Ok(Self {
            version,
            nonce,
            system_fee,
            network_fee,
            valid_until_block,
            signers,
            attributes,
            script,
            witnesses,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::network::payloads::witness::WitnessScope;

    pub(crate) fn sample_tx(nonce: u32) -> Transaction {
        Transaction {
            version: TX_VERSION,
            nonce,
            system_fee: 100,
            network_fee: 50,
            valid_until_block: 5_760,
            signers: vec![Signer::new(
                UInt160::from_bytes([3; 20]),
                WitnessScope::CALLED_BY_ENTRY,
            )],
            attributes: vec![TransactionAttribute::HighPriority],
            script: vec![0x11, 0x40],
            witnesses: vec![Witness::new(vec![0x0C], vec![0x41])],
        }
    }

    #[test]
    fn test_transaction_round_trip() {
        let tx = sample_tx(7);
        let bytes = tx.to_array();
        assert_eq!(bytes.len(), tx.size());
        assert_eq!(Transaction::from_array(&bytes).unwrap(), tx);
        assert_eq!(tx.sender(), Some(UInt160::from_bytes([3; 20])));
    }

    #[test]
    fn test_hash_ignores_witnesses() {
        let tx = sample_tx(7);
        let mut resigned = tx.clone();
        resigned.witnesses[0].invocation_script = vec![0xFF; 64];
        assert_eq!(tx.hash(), resigned.hash());
        assert_ne!(tx.hash(), sample_tx(8).hash());
    }

    #[test]
    fn test_witness_count_must_match() {
        let mut tx = sample_tx(1);
        tx.witnesses.clear();
        assert!(Transaction::from_array(&tx.to_array()).is_err());
    }

    #[test]
    fn test_rejects_structural_violations() {
        let mut tx = sample_tx(1);
        tx.system_fee = -1;
        assert!(Transaction::from_array(&tx.to_array()).is_err());

        let mut tx = sample_tx(1);
        tx.version = 1;
        assert!(Transaction::from_array(&tx.to_array()).is_err());

        let mut tx = sample_tx(1);
        tx.script.clear();
        assert!(Transaction::from_array(&tx.to_array()).is_err());

        let mut tx = sample_tx(1);
        tx.attributes.push(TransactionAttribute::HighPriority);
        assert!(Transaction::from_array(&tx.to_array()).is_err());
    }

    #[test]
    fn test_conflicts_may_repeat() {
        let mut tx = sample_tx(1);
        tx.attributes = vec![
            TransactionAttribute::Conflicts {
                hash: UInt256::from_bytes([1; 32]),
            },
            TransactionAttribute::Conflicts {
                hash: UInt256::from_bytes([2; 32]),
            },
            TransactionAttribute::OracleResponse {
                id: 9,
                code: 0,
                result: vec![1, 2, 3],
            },
        ];
        assert_eq!(Transaction::from_array(&tx.to_array()).unwrap(), tx);
    }
}
