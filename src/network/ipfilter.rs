//! IP allow / deny filter for inbound connections
//!
//! Rules are IPv4 networks in CIDR notation (a bare address is a /32). An
//! address is allowed unless it overlaps a blacklist entry, and a blacklisted
//! address is allowed again if it overlaps any whitelist entry. Overlap, not
//! containment, is what matters on both lists.

use ipnet::Ipv4Net;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Config key of the deny list
pub const BLACKLIST_KEY: &str = "blacklist";

/// Config key of the allow list
pub const WHITELIST_KEY: &str = "whitelist";

/// IP filter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IpFilterError {
    #[error("Invalid IPv4 address or network: {0}")]
    InvalidAddress(String),
    #[error("Invalid filter config: {0}")]
    ConfigValidation(String),
}

/// Serializable form of the filter lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpFilterConfig {
    pub blacklist: Vec<String>,
    pub whitelist: Vec<String>,
}

impl IpFilterConfig {
    /// Check every entry parses
    pub fn validate(&self) -> Result<(), IpFilterError> {
        parse_rules(&self.blacklist)?;
        parse_rules(&self.whitelist)?;
        Ok(())
    }
}

/// Parse an IPv4 address or strict CIDR network (no host bits set)
pub fn parse_network(value: &str) -> Result<Ipv4Net, IpFilterError> {
    let value = value.trim();
    let invalid = || IpFilterError::InvalidAddress(value.to_string());

    if value.contains('/') {
        let net = Ipv4Net::from_str(value).map_err(|_| invalid())?;
        if net.trunc() != net {
            return Err(invalid());
        }
        Ok(net)
    } else {
        let addr = Ipv4Addr::from_str(value).map_err(|_| invalid())?;
        Ipv4Net::new(addr, 32).map_err(|_| invalid())
    }
}

fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

// =============================================================================
// Rules
// =============================================================================

/// A list entry, keeping the text it was added with
#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterRule {
    raw: String,
    net: Ipv4Net,
}

impl FilterRule {
    fn parse(raw: &str) -> Result<Self, IpFilterError> {
        Ok(Self {
            raw: raw.to_string(),
            net: parse_network(raw)?,
        })
    }
}

fn parse_rules(entries: &[String]) -> Result<Vec<FilterRule>, IpFilterError> {
    entries.iter().map(|raw| FilterRule::parse(raw)).collect()
}

#[derive(Debug, Default)]
struct Rules {
    blacklist: Vec<FilterRule>,
    whitelist: Vec<FilterRule>,
}

impl Rules {
    fn allows(&self, net: &Ipv4Net) -> bool {
        if !self.blacklist.iter().any(|rule| overlaps(&rule.net, net)) {
            return true;
        }
        self.whitelist.iter().any(|rule| overlaps(&rule.net, net))
    }
}

// =============================================================================
// IP Filter
// =============================================================================

/// Shared allow / deny filter, read on every accept and rarely updated
#[derive(Debug, Default)]
pub struct IpFilter {
    rules: RwLock<Rules>,
}

impl IpFilter {
    /// Filter with empty lists (everything allowed)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &IpFilterConfig) -> Result<Self, IpFilterError> {
        let filter = Self::new();
        filter.apply_config(config)?;
        Ok(filter)
    }

    /// Decide whether `address` (an address or network) may connect
    pub fn is_allowed(&self, address: &str) -> Result<bool, IpFilterError> {
        let net = parse_network(address)?;
        let allowed = self.rules.read().allows(&net);
        if !allowed {
            log::debug!("IP filter denied {}", address);
        }
        Ok(allowed)
    }

    /// Accept-path check for an already parsed address
    pub fn is_allowed_ip(&self, ip: Ipv4Addr) -> bool {
        let net = Ipv4Net::from(ip);
        let allowed = self.rules.read().allows(&net);
        if !allowed {
            log::debug!("IP filter denied {}", ip);
        }
        allowed
    }

    pub fn blacklist_add(&self, address: &str) -> Result<(), IpFilterError> {
        let rule = FilterRule::parse(address)?;
        self.rules.write().blacklist.push(rule);
        Ok(())
    }

    /// Remove the first entry added as exactly `address`; absent is a no-op
    pub fn blacklist_remove(&self, address: &str) {
        remove_rule(&mut self.rules.write().blacklist, address);
    }

    pub fn whitelist_add(&self, address: &str) -> Result<(), IpFilterError> {
        let rule = FilterRule::parse(address)?;
        self.rules.write().whitelist.push(rule);
        Ok(())
    }

    /// Remove the first entry added as exactly `address`; absent is a no-op
    pub fn whitelist_remove(&self, address: &str) {
        remove_rule(&mut self.rules.write().whitelist, address);
    }

    /// Replace both lists from a JSON object with `whitelist` and `blacklist` arrays
    ///
    /// Nothing changes unless the whole config is valid.
    pub fn load_config(&self, config: &serde_json::Value) -> Result<(), IpFilterError> {
        let whitelist = string_list(config, WHITELIST_KEY)?;
        let blacklist = string_list(config, BLACKLIST_KEY)?;
        self.apply_config(&IpFilterConfig {
            blacklist,
            whitelist,
        })
    }

    /// Replace both lists; nothing changes unless every entry parses
    pub fn apply_config(&self, config: &IpFilterConfig) -> Result<(), IpFilterError> {
        let rules = Rules {
            blacklist: parse_rules(&config.blacklist)?,
            whitelist: parse_rules(&config.whitelist)?,
        };
        log::info!(
            "Loaded IP filter: {} blacklist, {} whitelist entries",
            rules.blacklist.len(),
            rules.whitelist.len()
        );
        *self.rules.write() = rules;
        Ok(())
    }

    /// Back to empty lists
    pub fn reset(&self) {
        *self.rules.write() = Rules::default();
    }

    /// Snapshot of the lists as added
    pub fn config(&self) -> IpFilterConfig {
        let rules = self.rules.read();
        IpFilterConfig {
            blacklist: rules.blacklist.iter().map(|r| r.raw.clone()).collect(),
            whitelist: rules.whitelist.iter().map(|r| r.raw.clone()).collect(),
        }
    }
}

fn remove_rule(list: &mut Vec<FilterRule>, address: &str) {
    if let Some(pos) = list.iter().position(|rule| rule.raw == address) {
        list.remove(pos);
    }
}

fn string_list(config: &serde_json::Value, key: &str) -> Result<Vec<String>, IpFilterError> {
    let entries = config
        .get(key)
        .ok_or_else(|| IpFilterError::ConfigValidation(format!("missing '{}' key", key)))?
        .as_array()
        .ok_or_else(|| IpFilterError::ConfigValidation(format!("'{}' must be a list", key)))?;

    entries
        .iter()
        .map(|entry| {
            entry.as_str().map(str::to_string).ok_or_else(|| {
                IpFilterError::ConfigValidation(format!("'{}' entries must be strings", key))
            })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
