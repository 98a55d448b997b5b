//! Request / flight tracking for block and header sync
//!
//! A flight is one outstanding request for a height sent to one peer. The
//! sync scheduler owns the timing policy; this module only records flights
//! and failures. Peers are referred to by plain integer ids.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Stable peer identifier handed out by the peer registry
pub type NodeId = u64;

// =============================================================================
// Flight Info
// =============================================================================

/// One outstanding request for `height` sent to `node_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightInfo {
    pub node_id: NodeId,
    pub height: u32,
    pub start_time: Instant,
}

impl FlightInfo {
    pub fn new(node_id: NodeId, height: u32) -> Self {
        Self {
            node_id,
            height,
            start_time: Instant::now(),
        }
    }

    /// Restart the clock, e.g. after re-sending the same request
    pub fn reset_start_time(&mut self) {
        self.start_time = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

// =============================================================================
// Request Info
// =============================================================================

/// Bookkeeping for one requested height
#[derive(Debug, Clone)]
pub struct RequestInfo {
    height: u32,
    flights: HashMap<NodeId, FlightInfo>,
    failed_nodes: BTreeMap<NodeId, u32>,
    /// Always the sum of `failed_nodes`
    failed_total: u32,
    last_used_node: Option<NodeId>,
}

impl RequestInfo {
    pub fn new(height: u32) -> Self {
        Self {
            height,
            flights: HashMap::new(),
            failed_nodes: BTreeMap::new(),
            failed_total: 0,
            last_used_node: None,
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Record a flight, replacing any earlier one to the same peer
    pub fn add_new_flight(&mut self, flight: FlightInfo) {
        self.last_used_node = Some(flight.node_id);
        self.flights.insert(flight.node_id, flight);
    }

    /// Flight to the most recently used peer, if it is still recorded
    pub fn most_recent_flight(&self) -> Option<&FlightInfo> {
        self.last_used_node.and_then(|node_id| self.flights.get(&node_id))
    }

    /// Count a failure against `node_id`; its flight record is kept
    pub fn mark_failed_node(&mut self, node_id: NodeId) {
        *self.failed_nodes.entry(node_id).or_insert(0) += 1;
        self.failed_total += 1;
    }

    pub fn failed_total(&self) -> u32 {
        self.failed_total
    }

    pub fn failed_count(&self, node_id: NodeId) -> u32 {
        self.failed_nodes.get(&node_id).copied().unwrap_or(0)
    }

    pub fn failed_nodes(&self) -> &BTreeMap<NodeId, u32> {
        &self.failed_nodes
    }

    pub fn last_used_node(&self) -> Option<NodeId> {
        self.last_used_node
    }

    pub fn flight(&self, node_id: NodeId) -> Option<&FlightInfo> {
        self.flights.get(&node_id)
    }

    pub fn flights(&self) -> impl Iterator<Item = &FlightInfo> {
        self.flights.values()
    }

    /// Drop the flight to `node_id` (the peer disconnected)
    pub fn remove_flight(&mut self, node_id: NodeId) -> Option<FlightInfo> {
        self.flights.remove(&node_id)
    }
}

// =============================================================================
// Request Tracker
// =============================================================================

/// All outstanding heights behind a single lock
#[derive(Debug, Default)]
pub struct RequestTracker {
    requests: Mutex<BTreeMap<u32, RequestInfo>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a flight, starting to track its height if needed
    pub fn add_new_flight(&self, flight: FlightInfo) {
        log::debug!(
            "Requesting height {} from node {}",
            flight.height,
            flight.node_id
        );
        self.requests
            .lock()
            .entry(flight.height)
            .or_insert_with(|| RequestInfo::new(flight.height))
            .add_new_flight(flight);
    }

    pub fn most_recent_flight(&self, height: u32) -> Option<FlightInfo> {
        self.requests
            .lock()
            .get(&height)
            .and_then(|info| info.most_recent_flight().copied())
    }

    /// Count a failure; returns false if `height` is not tracked
    pub fn mark_failed_node(&self, height: u32, node_id: NodeId) -> bool {
        let mut requests = self.requests.lock();
        match requests.get_mut(&height) {
            Some(info) => {
                info.mark_failed_node(node_id);
                log::debug!(
                    "Node {} failed height {} ({} failures total)",
                    node_id,
                    height,
                    info.failed_total()
                );
                true
            }
            None => false,
        }
    }

    /// Stop tracking a height once its data arrived or it was abandoned
    pub fn complete(&self, height: u32) -> Option<RequestInfo> {
        self.requests.lock().remove(&height)
    }

    /// Snapshot of one height's state
    pub fn get(&self, height: u32) -> Option<RequestInfo> {
        self.requests.lock().get(&height).cloned()
    }

    /// Flights that have been outstanding for at least `max_age`, lowest height first
    pub fn stale_flights(&self, max_age: Duration) -> Vec<FlightInfo> {
        let requests = self.requests.lock();
        let mut stale: Vec<FlightInfo> = requests
            .values()
            .flat_map(|info| info.flights())
            .filter(|flight| flight.elapsed() >= max_age)
            .copied()
            .collect();
        stale.sort_by_key(|flight| (flight.height, flight.node_id));
        stale
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
