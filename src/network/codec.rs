//! Stream framing for message envelopes
//!
//! Splits a byte stream into envelopes using the length prefix of the payload.
//! Socket handling is left to the caller; this only turns bytes into
//! [`Message`]s and back.

use crate::core::serialization::FormatError;
use crate::network::message::{Message, MessageError, PAYLOAD_MAX_SIZE};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Envelope codec for `tokio_util` framed streams
#[derive(Debug, Clone, Copy)]
pub struct MessageCodec {
    allow_compression: bool,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            allow_compression: true,
        }
    }

    /// Codec for a peer that advertised `DisableCompression`
    pub fn without_compression() -> Self {
        Self {
            allow_compression: false,
        }
    }

    pub fn set_allow_compression(&mut self, allow: bool) {
        self.allow_compression = allow;
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Total frame length once the header is buffered
fn frame_len(src: &[u8]) -> Result<Option<usize>, MessageError> {
    // config (1) + type (1) + first length byte (1)
    if src.len() < 3 {
        return Ok(None);
    }
    let extra = match src[2] {
        0xFD => 2,
        0xFE => 4,
        0xFF => 8,
        _ => 0,
    };
    let header_len = 3 + extra;
    if src.len() < header_len {
        return Ok(None);
    }

    let mut prefix = &src[3..header_len];
    let payload_len = match extra {
        2 => prefix.get_u16_le() as u64,
        4 => prefix.get_u32_le() as u64,
        8 => prefix.get_u64_le(),
        _ => src[2] as u64,
    };
    if payload_len > PAYLOAD_MAX_SIZE as u64 {
        return Err(FormatError::TooLarge {
            value: payload_len,
            max: PAYLOAD_MAX_SIZE as u64,
        }
        .into());
    }
    Ok(Some(header_len + payload_len as usize))
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = MessageError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let total = match frame_len(src)? {
            Some(total) => total,
            None => return Ok(None),
        };

        // Need the full frame
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        let msg = Message::from_bytes(&frame)?;
        log::trace!("Decoded {} ({} bytes)", msg.msg_type, total);
        Ok(Some(msg))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = MessageError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data = item.to_bytes_with(self.allow_compression)?;
        dst.extend_from_slice(&data);
        Ok(())
    }
}
