//! Collaborator interfaces used by the engine
//!
//! The engine never speaks a wire protocol itself. Node capabilities, name
//! resolution and geolocation are reached through the traits below; the
//! `chronikbench-client` crate provides HTTP implementations and
//! [`crate::mock`] provides scripted ones for tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::NodeEndpoint;
use super::{LookupError, NodeError};

/// Offer status marking an offer that was accepted on chain
pub const OFFER_STATUS_TAKEN: &str = "TAKEN";

/// Chain tip reported by a node's metadata call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainInfo {
    pub tip_hash: String,
    pub tip_height: i64,
}

/// One page of an address's transaction history
///
/// Transactions are kept as opaque documents; the engine only counts them
/// and measures their serialized size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxHistoryPage {
    #[serde(default)]
    pub txs: Vec<Value>,
    #[serde(default)]
    pub num_pages: u64,
    #[serde(default)]
    pub num_txs: u64,
}

/// One page of a token's marketplace offer history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferHistory {
    #[serde(default)]
    pub offers: Vec<Value>,
    #[serde(default)]
    pub num_pages: u64,
    #[serde(default)]
    pub num_txs: u64,
}

impl OfferHistory {
    /// Number of offers whose status is `TAKEN`
    pub fn taken_count(&self) -> usize {
        self.offers
            .iter()
            .filter(|offer| offer.get("status").and_then(Value::as_str) == Some(OFFER_STATUS_TAKEN))
            .count()
    }
}

/// Capability client bound to a single node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Lightweight metadata call used for latency probing
    async fn blockchain_info(&self) -> Result<BlockchainInfo, NodeError>;

    /// Fetch up to `limit` history records starting at `offset`
    async fn address_history(
        &self,
        address: &str,
        offset: usize,
        limit: usize,
    ) -> Result<TxHistoryPage, NodeError>;

    /// Fetch one page of historic marketplace offers for a token
    async fn historic_offers(
        &self,
        token_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<OfferHistory, NodeError>;
}

/// Builds capability clients from node endpoints
pub trait NodeConnector: Send + Sync {
    fn connect(&self, endpoint: &NodeEndpoint) -> Result<Arc<dyn NodeClient>, NodeError>;
}

/// DNS record type for an IPv4 address
pub const RECORD_TYPE_A: u16 = 1;

/// DNS record type for an alias
pub const RECORD_TYPE_CNAME: u16 = 5;

/// A single answer record from the name-resolution collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub record_type: u16,
    pub data: String,
}

impl DnsRecord {
    pub fn new(record_type: u16, data: impl Into<String>) -> Self {
        Self {
            record_type,
            data: data.into(),
        }
    }

    pub fn is_address(&self) -> bool {
        self.record_type == RECORD_TYPE_A
    }
}

#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Look up the address records for `name`
    ///
    /// An empty answer is not an error.
    async fn lookup(&self, name: &str) -> Result<Vec<DnsRecord>, LookupError>;
}

/// Response document of the geolocation collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GeoResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// `country[, city]`, or `None` when the lookup did not succeed
    pub fn label(&self) -> Option<String> {
        if !self.is_success() {
            return None;
        }
        let country = self.country.as_deref().unwrap_or_default();
        match self.city.as_deref() {
            Some(city) if !city.is_empty() => Some(format!("{country}, {city}")),
            _ => Some(country.to_string()),
        }
    }
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Locate a resolved node address
    async fn locate(&self, ip: &str) -> Result<GeoResponse, LookupError>;

    /// Locate the machine running the benchmark
    async fn locate_self(&self) -> Result<GeoResponse, LookupError>;
}
