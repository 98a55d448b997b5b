//! Light-client filter payloads (`FILTERLOAD`, `FILTERADD`)

use crate::core::bloom::{BloomError, BloomFilter, MAX_FILTER_SIZE, MAX_HASH_FUNCS};
use crate::core::serialization::{
    var_bytes_size, BinaryReader, BinaryWriter, FormatError, Serializable,
};
use serde::{Deserialize, Serialize};

/// Largest element a peer may add to a loaded filter
pub const MAX_FILTER_ADD_SIZE: usize = 520;

/// Replace the peer's bloom filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterLoadPayload {
    #[serde(with = "hex::serde")]
    pub filter: Vec<u8>,
    pub k: u8,
    pub tweak: u32,
}

impl FilterLoadPayload {
    /// Payload carrying `bloom`
    ///
    /// The receiver sizes the filter from the byte count, so only filters of
    /// a whole number of bytes can be sent.
    pub fn from_bloom(bloom: &BloomFilter) -> Result<Self, BloomError> {
        if bloom.bit_len() % 8 != 0 {
            return Err(BloomError::UnalignedSize(bloom.bit_len()));
        }
        Ok(Self {
            filter: bloom.get_bits().to_vec(),
            k: bloom.hash_funcs() as u8,
            tweak: bloom.tweak(),
        })
    }

    /// Rebuild the filter; its size is the whole bit array
    pub fn to_bloom(&self) -> Result<BloomFilter, BloomError> {
        BloomFilter::new(self.filter.len() * 8, self.k, self.tweak, Some(&self.filter))
    }
}

impl Serializable for FilterLoadPayload {
    fn size(&self) -> usize {
        var_bytes_size(self.filter.len()) + 1 + 4
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_var_bytes(&self.filter);
        writer.write_u8(self.k);
        writer.write_u32(self.tweak);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let filter = reader.read_var_bytes(MAX_FILTER_SIZE)?;
        let k = reader.read_u8()?;
        if k > MAX_HASH_FUNCS {
            return Err(FormatError::TooLarge {
                value: k as u64,
                max: MAX_HASH_FUNCS as u64,
            });
        }
        let tweak = reader.read_u32()?;
        Ok(Self { filter, k, tweak })
    }
}

/// Add one element to the peer's loaded filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterAddPayload {
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl Serializable for FilterAddPayload {
    fn size(&self) -> usize {
        var_bytes_size(self.data.len())
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_var_bytes(&self.data);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            data: reader.read_var_bytes(MAX_FILTER_ADD_SIZE)?,
        })
    }
}
