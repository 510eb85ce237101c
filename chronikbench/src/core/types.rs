//! Result records produced by a benchmark run
//!
//! A [`ProbeResult`] is created once per (node, capability) pair and a
//! [`CombinedResult`] once per node. Neither is mutated after creation.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;
use url::Url;

use super::{NodeError, ProbeFailure};

/// Sentinel shown for a timing that could not be measured
pub const NOT_AVAILABLE: &str = "N/A";

/// Sentinel shown while a hostname has no cached address yet
pub const RESOLVING: &str = "Resolving...";

/// Sentinel shown when an address or location is not known
pub const UNKNOWN: &str = "Unknown";

/// URL-like identifier of a remote node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeEndpoint {
    raw: String,
}

impl NodeEndpoint {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into().trim().to_string(),
        }
    }

    /// Parse a newline separated node list, dropping blank lines
    pub fn parse_list(text: &str) -> Vec<NodeEndpoint> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(NodeEndpoint::new)
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> Result<Url, NodeError> {
        Url::parse(&self.raw).map_err(|e| NodeError::InvalidEndpoint(format!("{}: {e}", self.raw)))
    }

    /// Hostname used as the resolution cache key
    pub fn hostname(&self) -> Option<String> {
        self.url().ok()?.host_str().map(str::to_string)
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for NodeEndpoint {
    fn from(raw: &str) -> Self {
        NodeEndpoint::new(raw)
    }
}

/// A wall-clock measurement in whole milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Millis(u64),
    NotAvailable,
}

impl Timing {
    pub fn millis(&self) -> Option<u64> {
        match self {
            Timing::Millis(ms) => Some(*ms),
            Timing::NotAvailable => None,
        }
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timing::Millis(ms) => write!(f, "{ms}"),
            Timing::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for Timing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timing::Millis(ms) => serializer.serialize_u64(*ms),
            Timing::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

/// Resolved network address of a node, or why there is none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAddress {
    Resolved(String),
    Resolving,
    Unknown,
}

impl NodeAddress {
    pub fn ip(&self) -> Option<&str> {
        match self {
            NodeAddress::Resolved(ip) => Some(ip),
            _ => None,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAddress::Resolved(ip) => f.write_str(ip),
            NodeAddress::Resolving => f.write_str(RESOLVING),
            NodeAddress::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for NodeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The two capabilities exercised per node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Paginated address transaction history
    History,
    /// Marketplace offer history for a token
    Offers,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::History => f.write_str("history"),
            Capability::Offers => f.write_str("offers"),
        }
    }
}

/// Format a byte count as kilobytes with two decimals
pub fn kilobytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0)
}

fn serialize_kilobytes<S: Serializer>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&kilobytes(*bytes))
}

fn serialize_failure<S: Serializer>(
    failure: &Option<ProbeFailure>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(failure) => serializer.collect_str(failure),
        None => serializer.serialize_none(),
    }
}

/// Outcome of one capability test against one node
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub node: String,
    pub capability: Capability,
    pub address: NodeAddress,
    pub location: String,
    pub connect_latency: Timing,
    pub fetch_time: Timing,
    /// Transactions for history tests, offers for offer tests
    pub item_count: usize,
    /// Offers with status `TAKEN`; always zero for history tests
    pub taken_count: usize,
    #[serde(rename = "data_size", serialize_with = "serialize_kilobytes")]
    pub payload_bytes: u64,
    #[serde(serialize_with = "serialize_failure")]
    pub error: Option<ProbeFailure>,
    #[serde(skip)]
    pub payload: Option<Arc<Value>>,
}

impl ProbeResult {
    /// A test that failed before producing any measurement
    pub fn failed(
        endpoint: &NodeEndpoint,
        capability: Capability,
        address: NodeAddress,
        failure: ProbeFailure,
    ) -> Self {
        Self {
            node: endpoint.to_string(),
            capability,
            address,
            location: UNKNOWN.to_string(),
            connect_latency: Timing::NotAvailable,
            fetch_time: Timing::NotAvailable,
            item_count: 0,
            taken_count: 0,
            payload_bytes: 0,
            error: Some(failure),
            payload: None,
        }
    }

    pub fn payload_kb(&self) -> String {
        kilobytes(self.payload_bytes)
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-node union of the history and offer test outcomes
#[derive(Debug, Clone, Serialize)]
pub struct CombinedResult {
    pub node: String,
    pub address: NodeAddress,
    pub location: String,
    pub connect_latency: Timing,
    pub history_time: Timing,
    pub record_count: usize,
    pub token_time: Timing,
    pub offer_count: usize,
    pub taken_count: usize,
    #[serde(rename = "data_size", serialize_with = "serialize_kilobytes")]
    pub payload_bytes: u64,
    pub offers_supported: bool,
    pub error: Option<String>,
    /// Why the offer test failed; never part of the combined error
    #[serde(skip)]
    pub offer_failure: Option<ProbeFailure>,
    #[serde(skip)]
    pub data: Option<Arc<Value>>,
    #[serde(skip)]
    pub token_data: Option<Arc<Value>>,
}

impl CombinedResult {
    /// Merge the two sub-test outcomes of one node
    ///
    /// Only a failed history test sets the combined error. A failed offer
    /// test clears offer support and leaves the offer timing unavailable.
    pub fn combine(history: ProbeResult, offers: ProbeResult) -> Self {
        Self {
            error: history.error.as_ref().map(|e| format!("Address: {e}")),
            node: history.node,
            address: history.address,
            location: history.location,
            connect_latency: history.connect_latency,
            history_time: history.fetch_time,
            record_count: history.item_count,
            token_time: offers.fetch_time,
            offer_count: offers.item_count,
            taken_count: offers.taken_count,
            payload_bytes: history.payload_bytes,
            offers_supported: offers.payload.is_some(),
            offer_failure: offers.error,
            data: history.payload,
            token_data: offers.payload,
        }
    }

    pub fn payload_kb(&self) -> String {
        kilobytes(self.payload_bytes)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
