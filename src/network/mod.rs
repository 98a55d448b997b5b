//! P2P wire protocol
//!
//! Everything between raw connection bytes and the sync / consensus layer:
//! - Message envelopes with LZ4 payload compression
//! - Payload schemas keyed by message type
//! - Stream framing for `tokio_util` codecs
//! - Outstanding request tracking per height
//! - IP allow / deny filtering at accept time

pub mod capabilities;
pub mod codec;
pub mod ipfilter;
pub mod message;
pub mod payloads;
pub mod request;

pub use capabilities::NodeCapability;
pub use codec::MessageCodec;
pub use ipfilter::{IpFilter, IpFilterConfig, IpFilterError};
pub use message::{
    Message, MessageConfig, MessageError, MessageType, COMPRESSION_MIN_SIZE,
    COMPRESSION_THRESHOLD, PAYLOAD_MAX_SIZE,
};
pub use payloads::Payload;
pub use request::{FlightInfo, NodeId, RequestInfo, RequestTracker};
