//! Message envelope
//!
//! Wire form: `u8 config | u8 type | var_bytes payload`. Payloads longer than
//! [`COMPRESSION_MIN_SIZE`] are LZ4 compressed (block format, prefixed with
//! the original length as a little-endian `u32`) when that saves more than
//! [`COMPRESSION_THRESHOLD`] bytes.

use crate::core::serialization::{BinaryReader, BinaryWriter, FormatError};
use crate::network::payloads::Payload;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest payload accepted, before compression and after decompression
pub const PAYLOAD_MAX_SIZE: usize = 0x0200_0000;

/// Payloads up to this size are never compressed
pub const COMPRESSION_MIN_SIZE: usize = 128;

/// Bytes compression must save to be worth it
pub const COMPRESSION_THRESHOLD: usize = 64;

/// Envelope errors
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Format(#[from] FormatError),
    #[error("Decompression failed: {0}")]
    Decompression(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Message Type
// =============================================================================

macro_rules! message_types {
    ($($variant:ident = $code:literal => $name:literal,)+) => {
        /// Message type tag
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum MessageType {
            $($variant,)+
            /// Tag with no known meaning, kept for logging
            Unknown(u8),
        }

        impl From<u8> for MessageType {
            fn from(code: u8) -> Self {
                match code {
                    $($code => MessageType::$variant,)+
                    other => MessageType::Unknown(other),
                }
            }
        }

        impl MessageType {
            pub fn as_u8(&self) -> u8 {
                match self {
                    $(MessageType::$variant => $code,)+
                    MessageType::Unknown(code) => *code,
                }
            }

            /// Protocol name for logging
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(MessageType::$variant => $name,)+
                    MessageType::Unknown(_) => "UNKNOWN",
                }
            }
        }
    };
}

message_types! {
    Version = 0x00 => "VERSION",
    Verack = 0x01 => "VERACK",
    GetAddr = 0x10 => "GETADDR",
    Addr = 0x11 => "ADDR",
    Ping = 0x18 => "PING",
    Pong = 0x19 => "PONG",
    GetHeaders = 0x20 => "GETHEADERS",
    Headers = 0x21 => "HEADERS",
    GetBlocks = 0x24 => "GETBLOCKS",
    Mempool = 0x25 => "MEMPOOL",
    Inv = 0x27 => "INV",
    GetData = 0x28 => "GETDATA",
    GetBlockByIndex = 0x29 => "GETBLOCKBYINDEX",
    NotFound = 0x2A => "NOTFOUND",
    Transaction = 0x2B => "TRANSACTION",
    Block = 0x2C => "BLOCK",
    Consensus = 0x2D => "CONSENSUS",
    Extensible = 0x2E => "EXTENSIBLE",
    Reject = 0x2F => "REJECT",
    FilterLoad = 0x30 => "FILTERLOAD",
    FilterAdd = 0x31 => "FILTERADD",
    FilterClear = 0x32 => "FILTERCLEAR",
    MerkleBlock = 0x38 => "MERKLEBLOCK",
    Alert = 0x40 => "ALERT",
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Unknown(code) => write!(f, "UNKNOWN({:#04x})", code),
            known => f.write_str(known.type_name()),
        }
    }
}

bitflags! {
    /// Envelope flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MessageConfig: u8 {
        const NONE = 0x00;
        const COMPRESSED = 0x01;
    }
}

// =============================================================================
// Message
// =============================================================================

/// A typed protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_type: MessageType,
    /// Flags as received; recomputed on every encode
    pub config: MessageConfig,
    pub payload: Payload,
}

impl Message {
    pub fn new(msg_type: MessageType, payload: Payload) -> Self {
        Self {
            msg_type,
            config: MessageConfig::NONE,
            payload,
        }
    }

    /// Message without a body (VERACK, GETADDR, MEMPOOL, FILTERCLEAR)
    pub fn empty(msg_type: MessageType) -> Self {
        Self::new(msg_type, Payload::Empty)
    }

    /// Encode, compressing the payload when worthwhile
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        self.to_bytes_with(true)
    }

    /// Encode; `allow_compression` is false for peers that advertised
    /// `DisableCompression`
    pub fn to_bytes_with(&self, allow_compression: bool) -> Result<Vec<u8>, MessageError> {
        let raw = self.payload.to_array();
        if raw.len() > PAYLOAD_MAX_SIZE {
            return Err(FormatError::TooLarge {
                value: raw.len() as u64,
                max: PAYLOAD_MAX_SIZE as u64,
            }
            .into());
        }

        let mut config = self.config.difference(MessageConfig::COMPRESSED);
        let compressed = if allow_compression {
            compress_payload(&raw)
        } else {
            None
        };
        let body = match compressed {
            Some(compressed) => {
                log::trace!(
                    "Compressed {} payload {} -> {} bytes",
                    self.msg_type,
                    raw.len(),
                    compressed.len()
                );
                config |= MessageConfig::COMPRESSED;
                compressed
            }
            None => raw,
        };

        let mut writer = BinaryWriter::with_capacity(2 + 9 + body.len());
        writer.write_u8(config.bits());
        writer.write_u8(self.msg_type.as_u8());
        writer.write_var_bytes(&body);
        Ok(writer.into_bytes())
    }

    /// Decode one complete envelope
    pub fn from_bytes(data: &[u8]) -> Result<Self, MessageError> {
        let mut reader = BinaryReader::new(data);
        let config = MessageConfig::from_bits_retain(reader.read_u8()?);
        let msg_type = MessageType::from(reader.read_u8()?);
        let body = reader.read_var_bytes(PAYLOAD_MAX_SIZE)?;
        reader.finish()?;

        let raw = if config.contains(MessageConfig::COMPRESSED) {
            decompress_payload(&body)?
        } else {
            body
        };

        let payload = Payload::decode(msg_type, &raw)?;
        Ok(Self {
            msg_type,
            config,
            payload,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.config.contains(MessageConfig::COMPRESSED)
    }
}

/// Compressed body if it beats the raw payload by the threshold
fn compress_payload(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() <= COMPRESSION_MIN_SIZE {
        return None;
    }
    let compressed = lz4_flex::block::compress_prepend_size(raw);
    if compressed.len() < raw.len() - COMPRESSION_THRESHOLD {
        Some(compressed)
    } else {
        None
    }
}

fn decompress_payload(body: &[u8]) -> Result<Vec<u8>, MessageError> {
    if body.len() < 4 {
        return Err(MessageError::Decompression(format!(
            "compressed body of {} bytes has no size prefix",
            body.len()
        )));
    }
    let declared = u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;
    if declared > PAYLOAD_MAX_SIZE {
        return Err(FormatError::TooLarge {
            value: declared as u64,
            max: PAYLOAD_MAX_SIZE as u64,
        }
        .into());
    }

    let raw = lz4_flex::block::decompress(&body[4..], declared)
        .map_err(|e| MessageError::Decompression(e.to_string()))?;
    if raw.len() != declared {
        return Err(MessageError::Decompression(format!(
            "declared {} bytes, got {}",
            declared,
            raw.len()
        )));
    }
    Ok(raw)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::serialization::Serializable;
    use crate::network::payloads::{FilterAddPayload, PingPayload};
    use proptest::prelude::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn filter_add(data: Vec<u8>) -> Message {
        Message::new(MessageType::FilterAdd, Payload::FilterAdd(FilterAddPayload { data }))
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(0xEC);
        let mut data = vec![0u8; len];
        rng.fill(&mut data[..]);
        data
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(MessageType::from(0x18), MessageType::Ping);
        assert_eq!(MessageType::MerkleBlock.as_u8(), 0x38);
        assert_eq!(MessageType::from(0x99), MessageType::Unknown(0x99));
        assert_eq!(MessageType::Unknown(0x99).as_u8(), 0x99);
        assert_eq!(MessageType::GetBlockByIndex.to_string(), "GETBLOCKBYINDEX");
    }

    #[test]
    fn test_ping_envelope_layout() {
        let ping = PingPayload {
            last_block_index: 1,
            timestamp: 2,
            nonce: 3,
        };
        let msg = Message::new(MessageType::Ping, Payload::Ping(ping));
        let bytes = msg.to_bytes().unwrap();

        assert_eq!(&bytes[..3], &[0x00, 0x18, 12]);
        assert_eq!(&bytes[3..], &ping.to_array()[..]);
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_compression_boundary_not_compressed() {
        // 1 length byte + 127 data bytes = 128 bytes of payload
        let msg = filter_add(vec![0; 127]);
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(bytes[0], MessageConfig::NONE.bits());
        assert_eq!(bytes.len(), 2 + 1 + 128);
    }

    #[test]
    fn test_low_entropy_payload_compressed() {
        let msg = filter_add(vec![0; 128]);
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(bytes[0], MessageConfig::COMPRESSED.bits());
        assert!(bytes.len() < 129);

        let decoded = Message::from_bytes(&bytes).unwrap();
        assert!(decoded.is_compressed());
        assert_eq!(decoded.payload, msg.payload);
    }

    #[test]
    fn test_high_entropy_payload_not_compressed() {
        let msg = filter_add(noise(128));
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(bytes[0], MessageConfig::NONE.bits());
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_compression_can_be_disabled() {
        let msg = filter_add(vec![0; 400]);
        let bytes = msg.to_bytes_with(false).unwrap();
        assert_eq!(bytes[0], MessageConfig::NONE.bits());
        assert!(!Message::from_bytes(&bytes).unwrap().is_compressed());
    }

    #[test]
    fn test_oversized_length_rejected_before_read() {
        // var_int 0xFE + u32 0x02000001
        let bytes = [0x00, 0x18, 0xFE, 0x01, 0x00, 0x00, 0x02];
        match Message::from_bytes(&bytes) {
            Err(MessageError::Format(FormatError::TooLarge { value, max })) => {
                assert_eq!(value, 0x0200_0001);
                assert_eq!(max, PAYLOAD_MAX_SIZE as u64);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_payload_not_encoded() {
        // var_bytes prefix (5) + data
        let msg = filter_add(vec![0; PAYLOAD_MAX_SIZE]);
        match msg.to_bytes_with(false) {
            Err(MessageError::Format(FormatError::TooLarge { value, max })) => {
                assert_eq!(value, PAYLOAD_MAX_SIZE as u64 + 5);
                assert_eq!(max, PAYLOAD_MAX_SIZE as u64);
            }
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
        assert!(msg.to_bytes().is_err());

        let at_limit = filter_add(vec![0; PAYLOAD_MAX_SIZE - 5]);
        assert_eq!(at_limit.payload.size(), PAYLOAD_MAX_SIZE);
        assert!(at_limit.to_bytes_with(false).is_ok());
    }

    #[test]
    fn test_oversized_declared_size_rejected() {
        let bytes = [0x01, 0x31, 0x05, 0xFF, 0xFF, 0xFF, 0x7F, 0x00];
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(MessageError::Format(FormatError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_corrupt_compressed_body() {
        let short = [0x01, 0x31, 0x02, 0x00, 0x00];
        assert!(matches!(
            Message::from_bytes(&short),
            Err(MessageError::Decompression(_))
        ));

        let garbage = [0x01, 0x31, 0x07, 100, 0, 0, 0, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            Message::from_bytes(&garbage),
            Err(MessageError::Decompression(_))
        ));
    }

    #[test]
    fn test_unknown_type_has_no_payload() {
        let msg = Message::from_bytes(&[0x00, 0x99, 0x02, 0xAB, 0xCD]).unwrap();
        assert_eq!(msg.msg_type, MessageType::Unknown(0x99));
        assert_eq!(msg.payload, Payload::Empty);
    }

    #[test]
    fn test_empty_message() {
        let msg = Message::empty(MessageType::Verack);
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x00]);
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_trailing_envelope_bytes() {
        assert!(matches!(
            Message::from_bytes(&[0x00, 0x01, 0x00, 0x00]),
            Err(MessageError::Format(FormatError::TrailingBytes(1)))
        ));
    }

    proptest! {
        #[test]
        fn prop_filter_add_round_trip(
            data in proptest::collection::vec(any::<u8>(), 0..=520),
            allow in any::<bool>(),
        ) {
            let msg = filter_add(data);
            let bytes = msg.to_bytes_with(allow).unwrap();
            let decoded = Message::from_bytes(&bytes).unwrap();
            prop_assert_eq!(decoded.payload, msg.payload);
        }
    }
}
