//! Binary serialization primitives for the wire protocol
//!
//! Every protocol structure is written little-endian with Bitcoin-style
//! compact-size prefixes for variable length data:
//! - `< 0xFD`: the value itself in one byte
//! - `0xFD`: followed by a `u16`
//! - `0xFE`: followed by a `u32`
//! - `0xFF`: followed by a `u64`
//!
//! Readers take an explicit upper bound for every length or count and reject
//! anything larger before touching the data that follows it.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Malformed binary data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("Value {value} exceeds maximum {max}")]
    TooLarge { value: u64, max: u64 },
    #[error("Invalid {0}")]
    Invalid(String),
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

impl FormatError {
    pub fn invalid(what: impl Into<String>) -> Self {
        FormatError::Invalid(what.into())
    }
}

// =============================================================================
// Serializable
// =============================================================================

/// A type with a canonical binary form
pub trait Serializable: Sized {
    /// Size of the encoded form in bytes
    fn size(&self) -> usize;

    /// Write the encoded form
    fn encode(&self, writer: &mut BinaryWriter);

    /// Read a value, failing on the first structural violation
    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError>;

    /// Encode into a fresh byte vector
    fn to_array(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(self.size());
        self.encode(&mut writer);
        writer.into_bytes()
    }

    /// Decode from a complete buffer; trailing bytes are rejected
    fn from_array(data: &[u8]) -> Result<Self, FormatError> {
        let mut reader = BinaryReader::new(data);
        let value = Self::decode(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

/// Size of a compact-size prefix for `value`
pub fn var_int_size(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Size of a length-prefixed byte string
pub fn var_bytes_size(len: usize) -> usize {
    var_int_size(len as u64) + len
}

/// Size of a count-prefixed list of serializable items
pub fn var_list_size<T: Serializable>(items: &[T]) -> usize {
    var_int_size(items.len() as u64) + items.iter().map(Serializable::size).sum::<usize>()
}

// =============================================================================
// Writer
// =============================================================================

/// Growable little-endian writer
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    pub fn write_var_int(&mut self, value: u64) {
        match value {
            0..=0xFC => self.buf.put_u8(value as u8),
            0xFD..=0xFFFF => {
                self.buf.put_u8(0xFD);
                self.buf.put_u16_le(value as u16);
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.buf.put_u8(0xFE);
                self.buf.put_u32_le(value as u32);
            }
            _ => {
                self.buf.put_u8(0xFF);
                self.buf.put_u64_le(value);
            }
        }
    }

    pub fn write_var_bytes(&mut self, data: &[u8]) {
        self.write_var_int(data.len() as u64);
        self.buf.put_slice(data);
    }

    pub fn write_var_string(&mut self, value: &str) {
        self.write_var_bytes(value.as_bytes());
    }

    pub fn write_serializable<T: Serializable>(&mut self, value: &T) {
        value.encode(self);
    }

    pub fn write_serializable_list<T: Serializable>(&mut self, items: &[T]) {
        self.write_var_int(items.len() as u64);
        for item in items {
            item.encode(self);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Bounds-checked little-endian reader over a borrowed buffer
#[derive(Debug)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { buf: data }
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Fail if any input is left over
    pub fn finish(&self) -> Result<(), FormatError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(FormatError::TrailingBytes(n)),
        }
    }

    fn ensure(&self, needed: usize) -> Result<(), FormatError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(FormatError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, FormatError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FormatError::invalid(format!("boolean byte {:#04x}", other))),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i16(&mut self) -> Result<i16, FormatError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn read_i64(&mut self) -> Result<i64, FormatError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    /// Read exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, FormatError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head.to_vec())
    }

    /// Read a fixed-size array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Read a compact-size integer no larger than `max`
    pub fn read_var_int(&mut self, max: u64) -> Result<u64, FormatError> {
        let value = match self.read_u8()? {
            0xFD => self.read_u16()? as u64,
            0xFE => self.read_u32()? as u64,
            0xFF => self.read_u64()?,
            n => n as u64,
        };
        if value > max {
            return Err(FormatError::TooLarge { value, max });
        }
        Ok(value)
    }

    /// Read a length-prefixed byte string of at most `max` bytes
    pub fn read_var_bytes(&mut self, max: usize) -> Result<Vec<u8>, FormatError> {
        let len = self.read_var_int(max as u64)? as usize;
        self.read_bytes(len)
    }

    /// Read a length-prefixed UTF-8 string of at most `max` bytes
    pub fn read_var_string(&mut self, max: usize) -> Result<String, FormatError> {
        let raw = self.read_var_bytes(max)?;
        String::from_utf8(raw).map_err(|_| FormatError::invalid("utf-8 string"))
    }

    pub fn read_serializable<T: Serializable>(&mut self) -> Result<T, FormatError> {
        T::decode(self)
    }

    /// Read a count-prefixed list of at most `max` items
    ///
    /// The count is validated before anything is allocated, and capacity is
    /// never reserved beyond what the remaining input could possibly hold.
    pub fn read_serializable_list<T: Serializable>(
        &mut self,
        max: usize,
    ) -> Result<Vec<T>, FormatError> {
        let count = self.read_var_int(max as u64)? as usize;
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_int_encoding_widths() {
        for (value, expected) in [
            (0u64, vec![0x00]),
            (0xFC, vec![0xFC]),
            (0xFD, vec![0xFD, 0xFD, 0x00]),
            (0xFFFF, vec![0xFD, 0xFF, 0xFF]),
            (0x1_0000, vec![0xFE, 0x00, 0x00, 0x01, 0x00]),
            (
                0x1_0000_0000,
                vec![0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            ),
        ] {
            let mut writer = BinaryWriter::new();
            writer.write_var_int(value);
            assert_eq!(writer.len(), var_int_size(value));
            let bytes = writer.into_bytes();
            assert_eq!(bytes, expected);

            let mut reader = BinaryReader::new(&bytes);
            assert_eq!(reader.read_var_int(u64::MAX).unwrap(), value);
        }
    }

    #[test]
    fn test_var_int_bound_enforced() {
        let mut reader = BinaryReader::new(&[0xFD, 0x00, 0x01]);
        assert_eq!(
            reader.read_var_int(255),
            Err(FormatError::TooLarge { value: 256, max: 255 })
        );
    }

    #[test]
    fn test_var_bytes_rejected_before_reading() {
        // Declares 1000 bytes but carries 2; the bound fires first
        let mut reader = BinaryReader::new(&[0xFD, 0xE8, 0x03, 0xAA, 0xBB]);
        assert!(matches!(
            reader.read_var_bytes(10),
            Err(FormatError::TooLarge { value: 1000, max: 10 })
        ));

        let mut reader = BinaryReader::new(&[0xFD, 0xE8, 0x03, 0xAA, 0xBB]);
        assert_eq!(
            reader.read_var_bytes(2000),
            Err(FormatError::UnexpectedEof {
                needed: 1000,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_fixed_width_little_endian() {
        let mut writer = BinaryWriter::new();
        writer.write_u16(0x0102);
        writer.write_u32(0x03040506);
        writer.write_i64(-2);
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..6], &[0x02, 0x01, 0x06, 0x05, 0x04, 0x03]);

        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.read_u32().unwrap(), 0x03040506);
        assert_eq!(reader.read_i64().unwrap(), -2);
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_var_string_utf8() {
        let mut writer = BinaryWriter::new();
        writer.write_var_string("epic/1.0");
        let bytes = writer.into_bytes();
        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_var_string(32).unwrap(), "epic/1.0");

        let mut reader = BinaryReader::new(&[0x02, 0xC3, 0x28]);
        assert!(matches!(
            reader.read_var_string(32),
            Err(FormatError::Invalid(_))
        ));
    }

    #[test]
    fn test_finish_reports_trailing() {
        let reader = BinaryReader::new(&[1, 2, 3]);
        assert_eq!(reader.finish(), Err(FormatError::TrailingBytes(3)));
    }
}
