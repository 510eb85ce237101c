//! Scripted collaborators for deterministic tests
//!
//! Latencies are simulated with `tokio::time::sleep`, so tests running with a
//! paused clock observe exact durations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::core::client::{
    BlockchainInfo, DnsRecord, GeoLocator, GeoResponse, NameResolver, NodeClient, NodeConnector,
    OfferHistory, TxHistoryPage,
};
use crate::core::types::NodeEndpoint;
use crate::core::{LookupError, NodeError};

/// Behaviour of one simulated node
#[derive(Debug, Clone)]
pub struct NodeScript {
    /// Latency of each probe call, cycled when shorter than the call count
    pub probe_latencies: Vec<Duration>,
    /// Zero-based index of the probe call that fails
    pub probe_failure_at: Option<usize>,
    /// Records the node holds for any address
    pub history_len: usize,
    pub page_latency: Duration,
    pub history_error: Option<NodeError>,
    pub offers: Vec<Value>,
    pub offer_latency: Duration,
    pub offer_error: Option<NodeError>,
}

impl Default for NodeScript {
    fn default() -> Self {
        Self {
            probe_latencies: vec![Duration::from_millis(10)],
            probe_failure_at: None,
            history_len: 1_000,
            page_latency: Duration::from_millis(5),
            history_error: None,
            offers: vec![
                json!({"status": "TAKEN", "txid": "aa"}),
                json!({"status": "OPEN", "txid": "bb"}),
            ],
            offer_latency: Duration::from_millis(5),
            offer_error: None,
        }
    }
}

/// A node that answers according to a [`NodeScript`] and records its traffic
pub struct ScriptedNode {
    script: NodeScript,
    probe_calls: Mutex<usize>,
    history_requests: Mutex<Vec<(usize, usize)>>,
    offer_calls: Mutex<usize>,
}

impl ScriptedNode {
    pub fn new(script: NodeScript) -> Self {
        Self {
            script,
            probe_calls: Mutex::new(0),
            history_requests: Mutex::new(Vec::new()),
            offer_calls: Mutex::new(0),
        }
    }

    pub fn probe_calls(&self) -> usize {
        *self.probe_calls.lock()
    }

    /// `(offset, limit)` of every history request, in issue order
    pub fn history_requests(&self) -> Vec<(usize, usize)> {
        self.history_requests.lock().clone()
    }

    pub fn offer_calls(&self) -> usize {
        *self.offer_calls.lock()
    }
}

/// Deterministic transaction document for record `index`
pub fn sample_tx(index: usize) -> Value {
    json!({
        "txid": format!("{index:064x}"),
        "size": 219,
        "outputs": [{"sats": 18_446_744_073_709_551_615u64, "outputScript": "76a914"}],
    })
}

#[async_trait]
impl NodeClient for ScriptedNode {
    async fn blockchain_info(&self) -> Result<BlockchainInfo, NodeError> {
        let call = {
            let mut calls = self.probe_calls.lock();
            *calls += 1;
            *calls - 1
        };

        let latencies = &self.script.probe_latencies;
        if !latencies.is_empty() {
            tokio::time::sleep(latencies[call % latencies.len()]).await;
        }

        if self.script.probe_failure_at == Some(call) {
            return Err(NodeError::Connection("probe refused".to_string()));
        }

        Ok(BlockchainInfo {
            tip_hash: "0".repeat(64),
            tip_height: 900_000,
        })
    }

    async fn address_history(
        &self,
        _address: &str,
        offset: usize,
        limit: usize,
    ) -> Result<TxHistoryPage, NodeError> {
        self.history_requests.lock().push((offset, limit));
        tokio::time::sleep(self.script.page_latency).await;

        if let Some(err) = &self.script.history_error {
            return Err(err.clone());
        }

        let end = (offset + limit).min(self.script.history_len);
        let txs = (offset.min(end)..end).map(sample_tx).collect();
        Ok(TxHistoryPage {
            txs,
            num_pages: self.script.history_len.div_ceil(limit.max(1)) as u64,
            num_txs: self.script.history_len as u64,
        })
    }

    async fn historic_offers(
        &self,
        _token_id: &str,
        _page: usize,
        page_size: usize,
    ) -> Result<OfferHistory, NodeError> {
        *self.offer_calls.lock() += 1;
        tokio::time::sleep(self.script.offer_latency).await;

        if let Some(err) = &self.script.offer_error {
            return Err(err.clone());
        }

        let offers: Vec<Value> = self.script.offers.iter().take(page_size).cloned().collect();
        Ok(OfferHistory {
            num_txs: offers.len() as u64,
            num_pages: 1,
            offers,
        })
    }
}

/// Connector handing out [`ScriptedNode`]s by endpoint URL
///
/// Endpoints without a registered node fail to connect.
#[derive(Default)]
pub struct ScriptedConnector {
    nodes: Mutex<HashMap<String, Arc<ScriptedNode>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, url: &str, script: NodeScript) -> Arc<ScriptedNode> {
        let node = Arc::new(ScriptedNode::new(script));
        self.nodes.lock().insert(url.to_string(), node.clone());
        node
    }

    pub fn node(&self, url: &str) -> Option<Arc<ScriptedNode>> {
        self.nodes.lock().get(url).cloned()
    }
}

impl NodeConnector for ScriptedConnector {
    fn connect(&self, endpoint: &NodeEndpoint) -> Result<Arc<dyn NodeClient>, NodeError> {
        endpoint.url()?;
        match self.nodes.lock().get(endpoint.as_str()) {
            Some(node) => Ok(node.clone() as Arc<dyn NodeClient>),
            None => Err(NodeError::Connection(format!("no route to {endpoint}"))),
        }
    }
}

/// Name resolver answering from a fixed table
///
/// Names without an entry fail the lookup.
#[derive(Default)]
pub struct MockResolver {
    answers: Mutex<HashMap<String, Vec<DnsRecord>>>,
    calls: Mutex<HashMap<String, usize>>,
    latency: Duration,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn answer(&self, name: &str, records: Vec<DnsRecord>) {
        self.answers.lock().insert(name.to_string(), records);
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl NameResolver for MockResolver {
    async fn lookup(&self, name: &str) -> Result<Vec<DnsRecord>, LookupError> {
        *self.calls.lock().entry(name.to_string()).or_default() += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.answers
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| LookupError::Request(format!("no answer for {name}")))
    }
}

/// Geolocation service answering from a fixed table
///
/// Unknown addresses get a `fail` status document.
#[derive(Default)]
pub struct MockLocator {
    places: Mutex<HashMap<String, GeoResponse>>,
    broken: Mutex<Vec<String>>,
    calls: Mutex<HashMap<String, usize>>,
    operator: Mutex<Option<GeoResponse>>,
    latency: Duration,
}

impl MockLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn place(&self, ip: &str, country: &str, city: Option<&str>) {
        self.places.lock().insert(
            ip.to_string(),
            GeoResponse {
                status: "success".to_string(),
                country: Some(country.to_string()),
                city: city.map(str::to_string),
                query: Some(ip.to_string()),
                message: None,
            },
        );
    }

    /// Make lookups of `ip` fail at the transport level
    pub fn fail_with_error(&self, ip: &str) {
        self.broken.lock().push(ip.to_string());
    }

    pub fn set_operator(&self, ip: &str, country: &str, city: Option<&str>) {
        *self.operator.lock() = Some(GeoResponse {
            status: "success".to_string(),
            country: Some(country.to_string()),
            city: city.map(str::to_string),
            query: Some(ip.to_string()),
            message: None,
        });
    }

    pub fn calls(&self, ip: &str) -> usize {
        self.calls.lock().get(ip).copied().unwrap_or(0)
    }
}

#[async_trait]
impl GeoLocator for MockLocator {
    async fn locate(&self, ip: &str) -> Result<GeoResponse, LookupError> {
        *self.calls.lock().entry(ip.to_string()).or_default() += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.broken.lock().iter().any(|broken| broken == ip) {
            return Err(LookupError::Status(500));
        }

        Ok(self.places.lock().get(ip).cloned().unwrap_or_else(|| GeoResponse {
            status: "fail".to_string(),
            message: Some("reserved range".to_string()),
            query: Some(ip.to_string()),
            ..Default::default()
        }))
    }

    async fn locate_self(&self) -> Result<GeoResponse, LookupError> {
        self.operator
            .lock()
            .clone()
            .ok_or_else(|| LookupError::Request("operator location unavailable".to_string()))
    }
}
