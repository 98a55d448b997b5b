//! Witnesses, signers and witness rules
//!
//! Shared by transactions, block headers and extensible payloads.

use crate::core::serialization::{
    var_bytes_size, var_list_size, BinaryReader, BinaryWriter, FormatError, Serializable,
};
use crate::core::types::{PublicKey, UInt160};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Maximum invocation script size
pub const MAX_INVOCATION_SCRIPT: usize = 1024;

/// Maximum verification script size
pub const MAX_VERIFICATION_SCRIPT: usize = 1024;

/// Maximum entries in any signer sub-list and in `And` / `Or` conditions
pub const MAX_SUBITEMS: usize = 16;

/// Maximum nesting of witness conditions
pub const MAX_NESTING_DEPTH: usize = 3;

// =============================================================================
// Witness
// =============================================================================

/// Invocation + verification script pair proving authorization
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Witness {
    #[serde(with = "hex::serde")]
    pub invocation_script: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub verification_script: Vec<u8>,
}

impl Witness {
    pub fn new(invocation_script: Vec<u8>, verification_script: Vec<u8>) -> Self {
        Self {
            invocation_script,
            verification_script,
        }
    }

    /// Script hash of the verification script
    pub fn script_hash(&self) -> UInt160 {
        UInt160::from_script(&self.verification_script)
    }
}

impl Serializable for Witness {
    fn size(&self) -> usize {
        var_bytes_size(self.invocation_script.len())
            + var_bytes_size(self.verification_script.len())
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_var_bytes(&self.invocation_script);
        writer.write_var_bytes(&self.verification_script);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            invocation_script: reader.read_var_bytes(MAX_INVOCATION_SCRIPT)?,
            verification_script: reader.read_var_bytes(MAX_VERIFICATION_SCRIPT)?,
        })
    }
}

// =============================================================================
// Witness Scope
// =============================================================================

bitflags! {
    /// Where a signer's witness is valid
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct WitnessScope: u8 {
        const CALLED_BY_ENTRY = 0x01;
        const CUSTOM_CONTRACTS = 0x10;
        const CUSTOM_GROUPS = 0x20;
        const WITNESS_RULES = 0x40;
        const GLOBAL = 0x80;
    }
}

impl WitnessScope {
    fn from_wire(value: u8) -> Result<Self, FormatError> {
        let scopes = WitnessScope::from_bits(value)
            .ok_or_else(|| FormatError::invalid(format!("witness scope {:#04x}", value)))?;
        if scopes.contains(WitnessScope::GLOBAL) && scopes != WitnessScope::GLOBAL {
            return Err(FormatError::invalid("global scope combined with others"));
        }
        Ok(scopes)
    }
}

// =============================================================================
// Witness Conditions
// =============================================================================

const COND_BOOLEAN: u8 = 0x00;
const COND_NOT: u8 = 0x01;
const COND_AND: u8 = 0x02;
const COND_OR: u8 = 0x03;
const COND_SCRIPT_HASH: u8 = 0x18;
const COND_GROUP: u8 = 0x19;
const COND_CALLED_BY_ENTRY: u8 = 0x20;
const COND_CALLED_BY_CONTRACT: u8 = 0x28;
const COND_CALLED_BY_GROUP: u8 = 0x29;

/// Predicate over the execution context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WitnessCondition {
    Boolean { expression: bool },
    Not { expression: Box<WitnessCondition> },
    And { expressions: Vec<WitnessCondition> },
    Or { expressions: Vec<WitnessCondition> },
    ScriptHash { hash: UInt160 },
    Group { group: PublicKey },
    CalledByEntry,
    CalledByContract { hash: UInt160 },
    CalledByGroup { group: PublicKey },
}

impl WitnessCondition {
    fn type_code(&self) -> u8 {
        match self {
            WitnessCondition::Boolean { .. } => COND_BOOLEAN,
            WitnessCondition::Not { .. } => COND_NOT,
            WitnessCondition::And { .. } => COND_AND,
            WitnessCondition::Or { .. } => COND_OR,
            WitnessCondition::ScriptHash { .. } => COND_SCRIPT_HASH,
            WitnessCondition::Group { .. } => COND_GROUP,
            WitnessCondition::CalledByEntry => COND_CALLED_BY_ENTRY,
            WitnessCondition::CalledByContract { .. } => COND_CALLED_BY_CONTRACT,
            WitnessCondition::CalledByGroup { .. } => COND_CALLED_BY_GROUP,
        }
    }

    /// Decode allowing at most `depth` levels including this one
    fn decode_nested(reader: &mut BinaryReader<'_>, depth: usize) -> Result<Self, FormatError> {
        if depth == 0 {
            return Err(FormatError::invalid("witness condition nested too deeply"));
        }

        match reader.read_u8()? {
            COND_BOOLEAN => Ok(WitnessCondition::Boolean {
                expression: reader.read_bool()?,
            }),
            COND_NOT => Ok(WitnessCondition::Not {
                expression: Box::new(Self::decode_nested(reader, depth - 1)?),
            }),
            COND_AND => Ok(WitnessCondition::And {
                expressions: Self::decode_list(reader, depth - 1)?,
            }),
            COND_OR => Ok(WitnessCondition::Or {
                expressions: Self::decode_list(reader, depth - 1)?,
            }),
            COND_SCRIPT_HASH => Ok(WitnessCondition::ScriptHash {
                hash: reader.read_serializable()?,
            }),
            COND_GROUP => Ok(WitnessCondition::Group {
                group: reader.read_serializable()?,
            }),
            COND_CALLED_BY_ENTRY => Ok(WitnessCondition::CalledByEntry),
            COND_CALLED_BY_CONTRACT => Ok(WitnessCondition::CalledByContract {
                hash: reader.read_serializable()?,
            }),
            COND_CALLED_BY_GROUP => Ok(WitnessCondition::CalledByGroup {
                group: reader.read_serializable()?,
            }),
            other => Err(FormatError::invalid(format!(
                "witness condition type {:#04x}",
                other
            ))),
        }
    }

    fn decode_list(
        reader: &mut BinaryReader<'_>,
        depth: usize,
    ) -> Result<Vec<Self>, FormatError> {
        let count = reader.read_var_int(MAX_SUBITEMS as u64)? as usize;
        if count == 0 {
            return Err(FormatError::invalid("empty witness condition list"));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(Self::decode_nested(reader, depth)?);
        }
        Ok(items)
    }
}

impl Serializable for WitnessCondition {
    fn size(&self) -> usize {
        1 + match self {
            WitnessCondition::Boolean { .. } => 1,
            WitnessCondition::Not { expression } => expression.size(),
            WitnessCondition::And { expressions } | WitnessCondition::Or { expressions } => {
                var_list_size(expressions)
            }
            WitnessCondition::ScriptHash { .. } | WitnessCondition::CalledByContract { .. } => {
                UInt160::LEN
            }
            WitnessCondition::Group { .. } | WitnessCondition::CalledByGroup { .. } => {
                PublicKey::LEN
            }
            WitnessCondition::CalledByEntry => 0,
        }
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.type_code());
        match self {
            WitnessCondition::Boolean { expression } => writer.write_bool(*expression),
            WitnessCondition::Not { expression } => writer.write_serializable(expression.as_ref()),
            WitnessCondition::And { expressions } | WitnessCondition::Or { expressions } => {
                writer.write_serializable_list(expressions)
            }
            WitnessCondition::ScriptHash { hash } | WitnessCondition::CalledByContract { hash } => {
                writer.write_serializable(hash)
            }
            WitnessCondition::Group { group } | WitnessCondition::CalledByGroup { group } => {
                writer.write_serializable(group)
            }
            WitnessCondition::CalledByEntry => {}
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        Self::decode_nested(reader, MAX_NESTING_DEPTH)
    }
}

// =============================================================================
// Witness Rules
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessRuleAction {
    Deny = 0,
    Allow = 1,
}

/// Allow or deny a witness when `condition` holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessRule {
    pub action: WitnessRuleAction,
    pub condition: WitnessCondition,
}

impl Serializable for WitnessRule {
    fn size(&self) -> usize {
        1 + self.condition.size()
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.action as u8);
        writer.write_serializable(&self.condition);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let action = match reader.read_u8()? {
            0 => WitnessRuleAction::Deny,
            1 => WitnessRuleAction::Allow,
            other => {
                return Err(FormatError::invalid(format!(
                    "witness rule action {:#04x}",
                    other
                )))
            }
        };
        Ok(Self {
            action,
            condition: reader.read_serializable()?,
        })
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Account co-signing a transaction and the scope of its signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub account: UInt160,
    pub scopes: WitnessScope,
    pub allowed_contracts: Vec<UInt160>,
    pub allowed_groups: Vec<PublicKey>,
    pub rules: Vec<WitnessRule>,
}

impl Signer {
    pub fn new(account: UInt160, scopes: WitnessScope) -> Self {
        Self {
            account,
            scopes,
            allowed_contracts: Vec::new(),
            allowed_groups: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl Serializable for Signer {
    fn size(&self) -> usize {
        let mut size = UInt160::LEN + 1;
        if self.scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            size += var_list_size(&self.allowed_contracts);
        }
        if self.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            size += var_list_size(&self.allowed_groups);
        }
        if self.scopes.contains(WitnessScope::WITNESS_RULES) {
            size += var_list_size(&self.rules);
        }
        size
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_serializable(&self.account);
        writer.write_u8(self.scopes.bits());
        if self.scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            writer.write_serializable_list(&self.allowed_contracts);
        }
        if self.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            writer.write_serializable_list(&self.allowed_groups);
        }
        if self.scopes.contains(WitnessScope::WITNESS_RULES) {
            writer.write_serializable_list(&self.rules);
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let account = reader.read_serializable()?;
        let scopes = WitnessScope::from_wire(reader.read_u8()?)?;
        let mut signer = Signer::new(account, scopes);
        if scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            signer.allowed_contracts = reader.read_serializable_list(MAX_SUBITEMS)?;
        }
        if scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            signer.allowed_groups = reader.read_serializable_list(MAX_SUBITEMS)?;
        }
        if scopes.contains(WitnessScope::WITNESS_RULES) {
            signer.rules = reader.read_serializable_list(MAX_SUBITEMS)?;
        }
        Ok(signer)
    }
}

// =============================================================================
// Tests
// =============================================================================
