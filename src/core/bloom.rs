//! Bloom filter for light-client transaction filtering
//!
//! Peers send the raw filter bits in a `FILTERLOAD` message and extend it with
//! `FILTERADD`. Each of the `k` hash functions is MurmurHash3 (x86, 32 bit)
//! seeded with `i * 0xFBA4C795 + tweak`, reduced modulo the filter size.
//! Bits are addressed little-endian within each byte.

use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Multiplier used to derive per-function seeds from the tweak
pub const SEED_MULTIPLIER: u32 = 0xFBA4_C795;

/// Largest filter a peer may load (bytes)
pub const MAX_FILTER_SIZE: usize = 36_000;

/// Largest number of hash functions a peer may request
pub const MAX_HASH_FUNCS: u8 = 50;

/// Bloom filter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BloomError {
    #[error("Bloom filter must have at least one bit")]
    ZeroSize,
    #[error("Bloom filter of {0} bits cannot be sent as whole bytes")]
    UnalignedSize(usize),
}

// =============================================================================
// Bloom Filter
// =============================================================================

/// Fixed-size probabilistic set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomFilter {
    /// Bit array, `ceil(bit_len / 8)` bytes, padding bits always clear
    bits: Vec<u8>,
    /// Number of addressable bits (`m`)
    bit_len: usize,
    /// One seed per hash function
    seeds: Vec<u32>,
    /// Tweak the seeds were derived from
    tweak: u32,
}

impl BloomFilter {
    /// Create a filter of `m` bits with `k` hash functions
    ///
    /// When `elements` is given it seeds the bit array and is truncated or
    /// zero-padded to exactly `m` bits. A zero-bit filter is rejected since
    /// every lookup would need a modulo by zero.
    pub fn new(m: usize, k: u8, tweak: u32, elements: Option<&[u8]>) -> Result<Self, BloomError> {
        if m == 0 {
            return Err(BloomError::ZeroSize);
        }

        let byte_len = (m + 7) / 8;
        let mut bits = match elements {
            Some(data) => data.iter().copied().take(byte_len).collect::<Vec<u8>>(),
            None => Vec::with_capacity(byte_len),
        };
        bits.resize(byte_len, 0);

        let spare = byte_len * 8 - m;
        if spare > 0 {
            if let Some(last) = bits.last_mut() {
                *last &= 0xFF >> spare;
            }
        }

        let seeds = (0..k as u32)
            .map(|i| i.wrapping_mul(SEED_MULTIPLIER).wrapping_add(tweak))
            .collect();

        Ok(Self {
            bits,
            bit_len: m,
            seeds,
            tweak,
        })
    }

    /// Add an element
    pub fn add(&mut self, element: &[u8]) {
        for i in 0..self.seeds.len() {
            let idx = self.index(element, self.seeds[i]);
            self.bits[idx / 8] |= 1 << (idx % 8);
        }
    }

    /// `false` means definitely absent, `true` means possibly present
    pub fn check(&self, element: &[u8]) -> bool {
        self.seeds.iter().all(|&seed| {
            let idx = self.index(element, seed);
            self.bits[idx / 8] & (1 << (idx % 8)) != 0
        })
    }

    /// Raw filter bits for a `FILTERLOAD` payload
    pub fn get_bits(&self) -> &[u8] {
        &self.bits
    }

    /// Number of bits (`m`)
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Number of hash functions (`k`)
    pub fn hash_funcs(&self) -> usize {
        self.seeds.len()
    }

    pub fn tweak(&self) -> u32 {
        self.tweak
    }

    pub fn seeds(&self) -> &[u32] {
        &self.seeds
    }

    /// Check if no bit is set
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    fn index(&self, element: &[u8], seed: u32) -> usize {
        // Reading from an in-memory cursor never fails
        let hash = murmur3::murmur3_32(&mut Cursor::new(element), seed).unwrap_or_default();
        hash as usize % self.bit_len
    }
}

// =============================================================================
// Tests
// =============================================================================
