//! Peer address records and the `ADDR` payload

use crate::core::serialization::{
    var_list_size, BinaryReader, BinaryWriter, FormatError, Serializable,
};
use crate::network::capabilities::NodeCapability;
use crate::network::payloads::version::MAX_CAPABILITIES;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

/// Maximum addresses in one `ADDR` message
pub const MAX_ADDR_PER_MESSAGE: usize = 200;

/// Connection state of a known address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AddressState {
    /// Not used yet in the current connection cycle
    #[default]
    New = 0x0,
    /// Associated with a live, well-behaved peer
    Connected = 0x1,
    /// Disconnected for bad performance, bad data or capacity reasons
    Poor = 0x2,
    /// Unreachable or timed out
    Dead = 0x3,
}

/// Why a peer was disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    Unknown = 0x0,
    MaxConnectionsReached = 0x1,
    PoorPerformance = 0x2,
    IpFilterNotAllowed = 0x3,
    HandshakeVersionError = 0x4,
    HandshakeVerackError = 0x5,
    ShuttingDown = 0x6,
}

// =============================================================================
// Network Address
// =============================================================================

/// A peer endpoint with its advertised capabilities
///
/// Only `timestamp`, the IP and `capabilities` travel on the wire. The port is
/// carried by a server capability; state bookkeeping stays local.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub address: SocketAddr,
    pub capabilities: Vec<NodeCapability>,
    /// Seconds since the Unix epoch
    pub timestamp: u32,
    pub state: AddressState,
    pub disconnect_reason: Option<DisconnectReason>,
    pub last_connected: Option<DateTime<Utc>>,
}

impl NetworkAddress {
    pub fn new(address: SocketAddr, capabilities: Vec<NodeCapability>) -> Self {
        Self::with_timestamp(address, capabilities, Utc::now().timestamp() as u32)
    }

    pub fn with_timestamp(
        address: SocketAddr,
        capabilities: Vec<NodeCapability>,
        timestamp: u32,
    ) -> Self {
        Self {
            address,
            capabilities,
            timestamp,
            state: AddressState::New,
            disconnect_reason: None,
            last_connected: None,
        }
    }

    /// Address of a TCP listener, advertising the port as a capability
    pub fn tcp_server(address: SocketAddr, timestamp: u32) -> Self {
        let caps = vec![NodeCapability::TcpServer {
            port: address.port(),
        }];
        Self::with_timestamp(address, caps, timestamp)
    }

    pub fn ip(&self) -> IpAddr {
        self.address.ip()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn is_state_new(&self) -> bool {
        self.state == AddressState::New
    }

    pub fn set_state_new(&mut self) {
        self.state = AddressState::New;
    }

    pub fn is_state_connected(&self) -> bool {
        self.state == AddressState::Connected
    }

    pub fn set_state_connected(&mut self) {
        self.state = AddressState::Connected;
        self.last_connected = Some(Utc::now());
    }

    pub fn is_state_poor(&self) -> bool {
        self.state == AddressState::Poor
    }

    pub fn set_state_poor(&mut self) {
        self.state = AddressState::Poor;
    }

    pub fn is_state_dead(&self) -> bool {
        self.state == AddressState::Dead
    }

    pub fn set_state_dead(&mut self) {
        self.state = AddressState::Dead;
    }

    /// IP in its 16-byte wire form (IPv4 mapped into IPv6)
    fn wire_ip(&self) -> [u8; 16] {
        match self.address.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
            IpAddr::V6(v6) => v6.octets(),
        }
    }
}

impl PartialEq for NetworkAddress {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for NetworkAddress {}

/// Hashes the socket address only, so it agrees with `PartialEq` (the timestamp is left out)
impl Hash for NetworkAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl std::fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl Serializable for NetworkAddress {
    fn size(&self) -> usize {
        4 + 16 + var_list_size(&self.capabilities)
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.timestamp);
        writer.write_bytes(&self.wire_ip());
        writer.write_serializable_list(&self.capabilities);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let timestamp = reader.read_u32()?;
        let raw_ip = Ipv6Addr::from(reader.read_array::<16>()?);
        let ip = match raw_ip.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(raw_ip),
        };
        let capabilities: Vec<NodeCapability> = reader.read_serializable_list(MAX_CAPABILITIES)?;
        let port = capabilities
            .iter()
            .filter_map(NodeCapability::server_port)
            .last()
            .unwrap_or(0);

        Ok(Self::with_timestamp(
            SocketAddr::new(ip, port),
            capabilities,
            timestamp,
        ))
    }
}

// =============================================================================
// Addr Payload
// =============================================================================

/// List of known peer addresses (`ADDR`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddrPayload {
    pub addresses: Vec<NetworkAddress>,
}

impl AddrPayload {
    pub fn new(addresses: Vec<NetworkAddress>) -> Self {
        Self { addresses }
    }
}

impl Serializable for AddrPayload {
    fn size(&self) -> usize {
        var_list_size(&self.addresses)
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_serializable_list(&self.addresses);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, FormatError> {
        let addresses = reader.read_serializable_list(MAX_ADDR_PER_MESSAGE)?;
        Ok(Self { addresses })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ip: &str, port: u16) -> NetworkAddress {
        let ip: IpAddr = ip.parse().unwrap();
        NetworkAddress::tcp_server(SocketAddr::new(ip, port), 1_700_000_000)
    }

    #[test]
    fn test_ipv4_wire_layout() {
        let addr = sample("127.0.0.1", 10333);
        let bytes = addr.to_array();

        assert_eq!(bytes.len(), addr.size());
        assert_eq!(&bytes[..4], &1_700_000_000u32.to_le_bytes());
        assert_eq!(
            &bytes[4..20],
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 127, 0, 0, 1]
        );
        assert_eq!(&bytes[20..], &[0x01, 0x01, 0x5D, 0x28]);
    }

    #[test]
    fn test_port_recovered_from_capability() {
        let addr = sample("10.0.0.7", 20333);
        let decoded = NetworkAddress::from_array(&addr.to_array()).unwrap();

        assert_eq!(decoded.address.to_string(), "10.0.0.7:20333");
        assert_eq!(decoded.timestamp, addr.timestamp);
        assert_eq!(decoded.capabilities, addr.capabilities);
        assert!(decoded.is_state_new());
    }

    #[test]
    fn test_no_server_capability_means_port_zero() {
        let addr = NetworkAddress::with_timestamp(
            "10.0.0.7:20333".parse().unwrap(),
            vec![NodeCapability::FullNode { start_height: 5 }],
            1,
        );
        let decoded = NetworkAddress::from_array(&addr.to_array()).unwrap();
        assert_eq!(decoded.port(), 0);
    }

    #[test]
    fn test_ipv6_kept_native() {
        let addr = sample("2001:db8::1", 10333);
        let bytes = addr.to_array();
        assert_eq!(&bytes[4..6], &[0x20, 0x01]);
        let decoded = NetworkAddress::from_array(&bytes).unwrap();
        assert_eq!(decoded, addr);
    }

    #[test]
    fn test_equality_ignores_state_and_capabilities() {
        let mut a = sample("8.8.8.8", 10333);
        let b = NetworkAddress::with_timestamp(a.address, vec![], 42);
        a.set_state_poor();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_state_transitions() {
        let mut addr = sample("8.8.4.4", 10333);
        addr.set_state_connected();
        assert!(addr.is_state_connected());
        assert!(addr.last_connected.is_some());
        addr.set_state_dead();
        assert!(addr.is_state_dead());
        addr.set_state_new();
        assert!(addr.is_state_new());
    }

    #[test]
    fn test_addr_payload_round_trip() {
        let payload = AddrPayload::new(vec![sample("1.1.1.1", 1), sample("2.2.2.2", 2)]);
        let decoded = AddrPayload::from_array(&payload.to_array()).unwrap();
        assert_eq!(decoded, payload);

        let empty = AddrPayload::default();
        assert_eq!(empty.to_array(), vec![0x00]);
        assert_eq!(AddrPayload::from_array(&[0x00]).unwrap(), empty);
    }

    #[test]
    fn test_addr_payload_count_bound() {
        // 201 addresses declared, nothing following
        let err = AddrPayload::from_array(&[0xC9]).unwrap_err();
        assert_eq!(err, FormatError::TooLarge { value: 201, max: 200 });
    }

    #[test]
    fn test_addr_payload_limit() {
        let addresses: Vec<NetworkAddress> = (0..MAX_ADDR_PER_MESSAGE as u16)
            .map(|i| sample(&format!("10.0.{}.{}", i / 256, i % 256), 10333 + i))
            .collect();
        let full = AddrPayload::new(addresses);
        let decoded = AddrPayload::from_array(&full.to_array()).unwrap();
        assert_eq!(decoded.addresses.len(), MAX_ADDR_PER_MESSAGE);
        assert_eq!(decoded, full);

        let mut over = full;
        over.addresses.push(sample("10.1.0.0", 1));
        assert_eq!(
            AddrPayload::from_array(&over.to_array()),
            Err(FormatError::TooLarge { value: 201, max: 200 })
        );
    }

    #[test]
    fn test_capability_limit() {
        let caps: Vec<NodeCapability> = (0..MAX_CAPABILITIES as u32)
            .map(|start_height| NodeCapability::FullNode { start_height })
            .collect();
        let addr = NetworkAddress::with_timestamp("10.0.0.1:0".parse().unwrap(), caps, 7);
        let decoded = NetworkAddress::from_array(&addr.to_array()).unwrap();
        assert_eq!(decoded.capabilities.len(), MAX_CAPABILITIES);
        assert_eq!(decoded.capabilities, addr.capabilities);

        let mut over = addr;
        over.capabilities.push(NodeCapability::FullNode { start_height: 0 });
        assert!(matches!(
            NetworkAddress::from_array(&over.to_array()),
            Err(FormatError::TooLarge { value: 33, max: 32 })
        ));
    }

    #[test]
    fn test_truncated_list_fails_whole_payload() {
        let payload = AddrPayload::new(vec![sample("1.1.1.1", 1), sample("2.2.2.2", 2)]);
        let bytes = payload.to_array();
        assert!(AddrPayload::from_array(&bytes[..bytes.len() - 1]).is_err());
    }
}
