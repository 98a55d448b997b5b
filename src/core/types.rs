//! Fixed-size hash and key types
//!
//! Hashes are stored in wire (little-endian) order and displayed the way
//! block explorers show them: byte-reversed, hex, `0x` prefixed.

use crate::core::serialization::{BinaryReader, BinaryWriter, FormatError, Serializable};
use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

macro_rules! fixed_hash {
    ($name:ident, $len:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn zero() -> Self {
                Self([0u8; $len])
            }

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut reversed = self.0;
                reversed.reverse();
                write!(f, "0x{}", hex::encode(reversed))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = FormatError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let raw = hex::decode(digits)
                    .map_err(|e| FormatError::invalid(format!("{} hex: {}", stringify!($name), e)))?;
                let mut bytes: [u8; $len] = raw.try_into().map_err(|_| {
                    FormatError::invalid(format!("{} length, expected {} bytes", stringify!($name), $len))
                })?;
                bytes.reverse();
                Ok(Self(bytes))
            }
        }

        impl Serializable for $name {
            fn size(&self) -> usize {
                $len
            }

            fn encode(&self, writer: &mut BinaryWriter) {
                writer.write_bytes(&self.0);
            }

            fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
                Ok(Self(reader.read_array::<$len>()?))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_hash!(UInt160, 20, "160-bit script hash (account / contract identifier)");
fixed_hash!(UInt256, 32, "256-bit hash (block, header and transaction identifier)");

impl UInt160 {
    /// Script hash of a verification script: RIPEMD160(SHA256(script))
    pub fn from_script(script: &[u8]) -> Self {
        let sha = Sha256::digest(script);
        let digest = Ripemd160::digest(sha);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

impl UInt256 {
    /// Single SHA-256 of `data`
    pub fn sha256(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

// =============================================================================
// Public Key
// =============================================================================

/// Compressed secp256r1 public key (33 bytes, `0x02`/`0x03` prefix)
///
/// Only the encoding is checked; curve membership is the consensus layer's job.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 33]);

impl PublicKey {
    pub const LEN: usize = 33;

    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, FormatError> {
        match bytes[0] {
            0x02 | 0x03 => Ok(Self(bytes)),
            other => Err(FormatError::invalid(format!(
                "public key prefix {:#04x}",
                other
            ))),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl Serializable for PublicKey {
    fn size(&self) -> usize {
        Self::LEN
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(&self.0);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        Self::from_bytes(reader.read_array::<33>()?)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let bytes: [u8; 33] = raw
            .try_into()
            .map_err(|_| serde::de::Error::custom("public key must be 33 bytes"))?;
        PublicKey::from_bytes(bytes).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        let hash = UInt256::from_bytes(bytes);
        let shown = hash.to_string();
        assert!(shown.starts_with("0x00"));
        assert!(shown.ends_with("ab"));
        assert_eq!(shown.parse::<UInt256>().unwrap(), hash);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!("0x0102".parse::<UInt160>().is_err());
        assert!("zz".parse::<UInt160>().is_err());
    }

    #[test]
    fn test_script_hash_is_deterministic() {
        let a = UInt160::from_script(&[0x0C, 0x21]);
        let b = UInt160::from_script(&[0x0C, 0x21]);
        let c = UInt160::from_script(&[0x0C, 0x22]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_public_key_prefix() {
        let mut key = [0x11u8; 33];
        assert!(PublicKey::from_bytes(key).is_err());
        key[0] = 0x02;
        assert!(PublicKey::from_bytes(key).is_ok());
    }

    #[test]
    fn test_serde_as_string() {
        let hash = UInt160::from_bytes([7u8; 20]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash));
        let back: UInt160 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
