//! EpicChain P2P: the wire protocol layer of an EpicChain node
//!
//! This crate provides:
//! - Message envelopes with optional LZ4 payload compression
//! - Binary codecs for every protocol payload (version, addr, inventory,
//!   headers, blocks, transactions, extensible, filters)
//! - A `tokio_util` codec for framing envelopes on a byte stream
//! - Per-height request / flight tracking for syncing from several peers
//! - An IP allow / deny filter for inbound connections
//! - Bloom filters for light-client filtering
//!
//! # Example
//!
//! ```rust
//! use epicchain_p2p::network::payloads::PingPayload;
//! use epicchain_p2p::network::{Message, MessageType, Payload};
//!
//! let ping = Message::new(MessageType::Ping, Payload::Ping(PingPayload::new(100)));
//! let bytes = ping.to_bytes().unwrap();
//!
//! let decoded = Message::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded.msg_type, MessageType::Ping);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod network;

// Re-export commonly used types
pub use config::{ConfigError, NodeConfig};
pub use core::{BloomFilter, FormatError, Serializable, UInt160, UInt256};
pub use network::{
    IpFilter, Message, MessageCodec, MessageError, MessageType, Payload, RequestTracker,
};
