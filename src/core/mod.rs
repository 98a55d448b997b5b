//! Core building blocks shared by the protocol layer
//!
//! - Binary serialization (compact-size integers, bounded reads)
//! - Fixed-size hashes and public keys
//! - Bloom filters for light clients

pub mod bloom;
pub mod serialization;
pub mod types;

pub use bloom::{BloomError, BloomFilter};
pub use serialization::{BinaryReader, BinaryWriter, FormatError, Serializable};
pub use types::{PublicKey, UInt160, UInt256};
