//! Single capability tests against a single node
//!
//! Both test variants walk the same pipeline:
//!
//! ```text
//! Built -> Probed -> Resolving -> Fetching -> Done
//! ```
//!
//! Cancellation may interrupt any stage and is returned to the caller as
//! [`Cancelled`]. Every other failure is captured here and converted into a
//! [`ProbeResult`] carrying the error, so one bad node never stops a run.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::ResolutionCache;
use super::cancel::{Cancelled, cancellable, check};
use super::client::{NodeClient, NodeConnector};
use super::fetcher::PaginatedFetcher;
use super::prober::LatencyProber;
use super::types::{Capability, NodeAddress, NodeEndpoint, ProbeResult, Timing, UNKNOWN};
use super::{FetchError, MAX_PAGE_SIZE, ProbeFailure, payload};

/// Offers requested by the offer test (first page only)
pub const OFFER_PAGE_SIZE: usize = 50;

/// Upper bound on the offer fetch
pub const OFFER_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables of the capability tests
#[derive(Debug, Clone, Copy)]
pub struct ExecutorSettings {
    pub page_size_ceiling: usize,
    pub offer_page_size: usize,
    pub offer_timeout: Duration,
    pub probe_rounds: u32,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            page_size_ceiling: MAX_PAGE_SIZE,
            offer_page_size: OFFER_PAGE_SIZE,
            offer_timeout: OFFER_TIMEOUT,
            probe_rounds: super::prober::PROBE_ROUNDS,
        }
    }
}

/// Stages of a capability test, used for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Built,
    Probed,
    Resolving,
    Fetching,
    Done,
}

/// Measurements common to both variants, gathered before the fetch phase
struct Prepared {
    client: Arc<dyn NodeClient>,
    connect_latency: Timing,
    address: NodeAddress,
    location: String,
}

pub struct NodeTestExecutor {
    connector: Arc<dyn NodeConnector>,
    cache: Arc<ResolutionCache>,
    prober: LatencyProber,
    fetcher: PaginatedFetcher,
    settings: ExecutorSettings,
}

impl NodeTestExecutor {
    pub fn new(
        connector: Arc<dyn NodeConnector>,
        cache: Arc<ResolutionCache>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            connector,
            cache,
            prober: LatencyProber::new(settings.probe_rounds),
            fetcher: PaginatedFetcher::new(settings.page_size_ceiling),
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Build, probe and resolve; shared by both variants
    async fn prepare(
        &self,
        endpoint: &NodeEndpoint,
        capability: Capability,
        cancel: &CancellationToken,
    ) -> Result<Result<Prepared, ProbeResult>, Cancelled> {
        check(cancel)?;

        let client = match self.connector.connect(endpoint) {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build client for {}: {}", endpoint, e);
                return Ok(Err(self.failure(
                    endpoint,
                    capability,
                    ProbeFailure::ConnectionError,
                )));
            }
        };
        trace_stage(endpoint, capability, Stage::Built);

        let connect_latency = self.prober.probe(client.as_ref(), cancel).await?;
        check(cancel)?;
        trace_stage(endpoint, capability, Stage::Probed);

        trace_stage(endpoint, capability, Stage::Resolving);
        let address = match endpoint.hostname() {
            Some(host) => match cancellable(cancel, self.cache.resolve(&host)).await? {
                Some(ip) => NodeAddress::Resolved(ip),
                None => NodeAddress::Resolving,
            },
            None => NodeAddress::Unknown,
        };
        let location = match address.ip() {
            Some(ip) => cancellable(cancel, self.cache.locate(ip)).await?,
            None => UNKNOWN.to_string(),
        };

        Ok(Ok(Prepared {
            client,
            connect_latency,
            address,
            location,
        }))
    }

    /// Result for a test that failed outright; consults only the cache
    fn failure(
        &self,
        endpoint: &NodeEndpoint,
        capability: Capability,
        failure: ProbeFailure,
    ) -> ProbeResult {
        let address = endpoint
            .hostname()
            .and_then(|host| self.cache.cached_address(&host))
            .map_or(NodeAddress::Unknown, NodeAddress::Resolved);
        ProbeResult::failed(endpoint, capability, address, failure)
    }

    /// Paginated address-history test
    pub async fn run_history_test(
        &self,
        endpoint: &NodeEndpoint,
        address: &str,
        record_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<ProbeResult, Cancelled> {
        let capability = Capability::History;
        let prepared = match self.prepare(endpoint, capability, cancel).await? {
            Ok(prepared) => prepared,
            Err(failed) => return Ok(failed),
        };

        trace_stage(endpoint, capability, Stage::Fetching);
        let start = Instant::now();
        let outcome = match self
            .fetcher
            .fetch(prepared.client.as_ref(), address, record_budget, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(FetchError::Cancelled(cancelled)) => return Err(cancelled),
            Err(FetchError::Node(e)) => {
                warn!("History fetch from {} failed: {}", endpoint, e);
                return Ok(self.failure(endpoint, capability, ProbeFailure::from(&e)));
            }
        };
        check(cancel)?;
        let duration = elapsed_millis(start);
        trace_stage(endpoint, capability, Stage::Done);

        let item_count = outcome.txs.len();
        let payload = (item_count > 0).then(|| Arc::new(json!({ "txs": outcome.txs })));

        Ok(ProbeResult {
            node: endpoint.to_string(),
            capability,
            address: prepared.address,
            location: prepared.location,
            connect_latency: prepared.connect_latency,
            fetch_time: Timing::Millis(duration),
            item_count,
            taken_count: 0,
            payload_bytes: outcome.payload_bytes,
            error: None,
            payload,
        })
    }

    /// Single-page marketplace offer test, bounded by the offer timeout
    pub async fn run_offer_test(
        &self,
        endpoint: &NodeEndpoint,
        token_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ProbeResult, Cancelled> {
        let capability = Capability::Offers;
        let prepared = match self.prepare(endpoint, capability, cancel).await? {
            Ok(prepared) => prepared,
            Err(failed) => return Ok(failed),
        };

        trace_stage(endpoint, capability, Stage::Fetching);
        let start = Instant::now();
        let fetch = prepared
            .client
            .historic_offers(token_id, 0, self.settings.offer_page_size);
        let raced = cancellable(cancel, tokio::time::timeout(self.settings.offer_timeout, fetch))
            .await?;

        let failure = match raced {
            Ok(Ok(history)) => {
                check(cancel)?;
                let duration = elapsed_millis(start);
                trace_stage(endpoint, capability, Stage::Done);

                match offer_document(endpoint, &history) {
                    Ok((document, payload_bytes)) => {
                        return Ok(ProbeResult {
                            node: endpoint.to_string(),
                            capability,
                            address: prepared.address,
                            location: prepared.location,
                            connect_latency: prepared.connect_latency,
                            fetch_time: Timing::Millis(duration),
                            item_count: history.offers.len(),
                            taken_count: history.taken_count(),
                            payload_bytes,
                            error: None,
                            payload: Some(Arc::new(document)),
                        });
                    }
                    Err(failure) => failure,
                }
            }
            Ok(Err(e)) => {
                debug!("Offer history unsupported by {}: {}", endpoint, e);
                ProbeFailure::CapabilityNotSupported
            }
            Err(_) => {
                warn!(
                    "Offer history from {} timed out after {:?}",
                    endpoint, self.settings.offer_timeout
                );
                ProbeFailure::Timeout
            }
        };

        Ok(ProbeResult {
            node: endpoint.to_string(),
            capability,
            address: prepared.address,
            location: prepared.location,
            connect_latency: prepared.connect_latency,
            fetch_time: Timing::NotAvailable,
            item_count: 0,
            taken_count: 0,
            payload_bytes: 0,
            error: Some(failure),
            payload: None,
        })
    }
}

/// Raw offer payload and its size
///
/// A document that cannot be represented as JSON fails the offer test; a
/// size that cannot be computed only degrades to zero.
fn offer_document<T: Serialize>(
    endpoint: &NodeEndpoint,
    history: &T,
) -> Result<(Value, u64), ProbeFailure> {
    let document = serde_json::to_value(history).map_err(|e| {
        warn!("Unreadable offer history from {}: {}", endpoint, e);
        ProbeFailure::Other(format!("unreadable offer history: {e}"))
    })?;
    let payload_bytes = match payload::serialized_len(&document) {
        Ok(len) => len,
        Err(e) => {
            warn!("Error calculating data size: {}", e);
            0
        }
    };
    Ok((document, payload_bytes))
}

fn elapsed_millis(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn trace_stage(endpoint: &NodeEndpoint, capability: Capability, stage: Stage) {
    debug!(node = %endpoint, %capability, ?stage, "capability test stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NodeError;
    use crate::core::client::{DnsRecord, RECORD_TYPE_A};
    use crate::mock::{MockLocator, MockResolver, NodeScript, ScriptedConnector};

    const NODE: &str = "https://chronik.example.org";

    struct UnreadableDocument;

    impl Serialize for UnreadableDocument {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("offer list truncated"))
        }
    }

    #[test]
    fn test_unreadable_offer_document_fails_the_test() {
        let failure = offer_document(&NODE.into(), &UnreadableDocument).unwrap_err();
        assert_eq!(
            failure,
            ProbeFailure::Other("unreadable offer history: offer list truncated".to_string())
        );

        let history = crate::core::client::OfferHistory {
            offers: vec![json!({"status": "TAKEN"})],
            num_pages: 1,
            num_txs: 1,
        };
        let (document, bytes) = offer_document(&NODE.into(), &history).unwrap();
        assert_eq!(document["offers"][0]["status"], "TAKEN");
        assert_eq!(bytes, payload::serialized_len(&document).unwrap());
    }

    struct Fixture {
        connector: Arc<ScriptedConnector>,
        resolver: Arc<MockResolver>,
        executor: NodeTestExecutor,
    }

    fn fixture() -> Fixture {
        let connector = Arc::new(ScriptedConnector::new());
        let resolver = Arc::new(MockResolver::new());
        resolver.answer("chronik.example.org", vec![DnsRecord::new(RECORD_TYPE_A, "203.0.113.10")]);
        let locator = Arc::new(MockLocator::new());
        locator.place("203.0.113.10", "Netherlands", Some("Amsterdam"));
        let cache = Arc::new(ResolutionCache::new(resolver.clone(), locator));
        let executor =
            NodeTestExecutor::new(connector.clone(), cache, ExecutorSettings::default());
        Fixture {
            connector,
            resolver,
            executor,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_success() {
        let fx = fixture();
        fx.connector.add(
            NODE,
            NodeScript {
                probe_latencies: vec![Duration::from_millis(25)],
                page_latency: Duration::from_millis(40),
                ..Default::default()
            },
        );

        let result = fx
            .executor
            .run_history_test(&NODE.into(), "ecash:qq", 450, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.error.is_none());
        assert_eq!(result.address, NodeAddress::Resolved("203.0.113.10".to_string()));
        assert_eq!(result.location, "Netherlands, Amsterdam");
        assert_eq!(result.connect_latency, Timing::Millis(25));
        // three pages, probe time excluded
        assert_eq!(result.fetch_time, Timing::Millis(120));
        assert_eq!(result.item_count, 450);
        assert!(result.payload.is_some());
        assert!(result.payload_bytes > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_without_records_has_no_payload() {
        let fx = fixture();
        fx.connector.add(
            NODE,
            NodeScript {
                history_len: 0,
                ..Default::default()
            },
        );

        let result = fx
            .executor
            .run_history_test(&NODE.into(), "ecash:qq", 10, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.error.is_none());
        assert_eq!(result.item_count, 0);
        assert!(result.payload.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_host_reports_resolving() {
        let fx = fixture();
        let other = "https://unlisted.example.net";
        fx.connector.add(other, NodeScript::default());

        let result = fx
            .executor
            .run_history_test(&other.into(), "ecash:qq", 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.address, NodeAddress::Resolving);
        assert_eq!(result.location, UNKNOWN);
        assert!(result.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_connection_error() {
        let fx = fixture();
        fx.connector.add(
            NODE,
            NodeScript {
                history_error: Some(NodeError::Connection("refused".to_string())),
                ..Default::default()
            },
        );

        let result = fx
            .executor
            .run_history_test(&NODE.into(), "ecash:qq", 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.error, Some(ProbeFailure::ConnectionError));
        assert_eq!(result.fetch_time, Timing::NotAvailable);
        assert_eq!(result.connect_latency, Timing::NotAvailable);
        // resolved during the attempt, so the cache knows it
        assert_eq!(result.address, NodeAddress::Resolved("203.0.113.10".to_string()));
        assert_eq!(result.location, UNKNOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbuildable_client_is_connection_error() {
        let fx = fixture();

        let result = fx
            .executor
            .run_history_test(&"not a url".into(), "ecash:qq", 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.error, Some(ProbeFailure::ConnectionError));
        assert_eq!(result.address, NodeAddress::Unknown);
        assert_eq!(fx.resolver.calls("not a url"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offer_success_counts_taken() {
        let fx = fixture();
        fx.connector.add(
            NODE,
            NodeScript {
                offer_latency: Duration::from_millis(300),
                ..Default::default()
            },
        );

        let result = fx
            .executor
            .run_offer_test(&NODE.into(), "ac31bb", &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.error.is_none());
        assert_eq!(result.fetch_time, Timing::Millis(300));
        assert_eq!(result.item_count, 2);
        assert_eq!(result.taken_count, 1);
        assert!(result.payload.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_offer_unsupported() {
        let fx = fixture();
        fx.connector.add(
            NODE,
            NodeScript {
                offer_error: Some(NodeError::Status(404)),
                ..Default::default()
            },
        );

        let result = fx
            .executor
            .run_offer_test(&NODE.into(), "ac31bb", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.error, Some(ProbeFailure::CapabilityNotSupported));
        assert_eq!(result.fetch_time, Timing::NotAvailable);
        assert!(result.payload.is_none());
        // probe and location survive an unsupported capability
        assert_eq!(result.connect_latency, Timing::Millis(10));
        assert_eq!(result.location, "Netherlands, Amsterdam");
    }

    #[tokio::test(start_paused = true)]
    async fn test_offer_timeout() {
        let fx = fixture();
        fx.connector.add(
            NODE,
            NodeScript {
                offer_latency: Duration::from_secs(11),
                ..Default::default()
            },
        );

        let result = fx
            .executor
            .run_offer_test(&NODE.into(), "ac31bb", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.error, Some(ProbeFailure::Timeout));
        assert_eq!(result.fetch_time, Timing::NotAvailable);
        assert!(result.payload.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_offer_connect_failure() {
        let fx = fixture();

        let result = fx
            .executor
            .run_offer_test(&NODE.into(), "ac31bb", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.error, Some(ProbeFailure::ConnectionError));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_fetch() {
        let fx = fixture();
        let node = fx.connector.add(
            NODE,
            NodeScript {
                page_latency: Duration::from_secs(5),
                ..Default::default()
            },
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = fx
            .executor
            .run_history_test(&NODE.into(), "ecash:qq", 600, &cancel)
            .await;

        assert_eq!(result.unwrap_err(), Cancelled);
        assert_eq!(node.history_requests().len(), 1);
    }
}
