pub mod cache;
pub mod cancel;
pub mod client;
pub mod executor;
pub mod fetcher;
pub mod orchestrator;
pub mod payload;
pub mod prober;
pub mod run_state;
pub mod types;
#[cfg(test)]
mod tests;

pub use cache::ResolutionCache;
pub use cancel::{Cancelled, cancellable};
pub use client::{
    BlockchainInfo, DnsRecord, GeoLocator, GeoResponse, NameResolver, NodeClient, NodeConnector,
    OfferHistory, TxHistoryPage,
};
pub use executor::{ExecutorSettings, NodeTestExecutor};
pub use fetcher::{FetchOutcome, PaginatedFetcher};
pub use orchestrator::{BenchmarkRun, Orchestrator, RunConfig, RunSummary};
pub use prober::LatencyProber;
pub use run_state::{PayloadKind, RunId, RunState};
pub use types::{Capability, CombinedResult, NodeAddress, NodeEndpoint, ProbeResult, Timing};

/// Maximum number of history records a single page request may return
pub const MAX_PAGE_SIZE: usize = 200;

/// Largest record budget accepted for one run
pub const MAX_RECORD_BUDGET: usize = 600;

/// Record budget used when the operator does not pick one
pub const DEFAULT_RECORD_BUDGET: usize = 10;

/// Failure reported by a node capability client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("node returned HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("capability not supported: {0}")]
    Unsupported(String),
}

/// Failure reported by the name-resolution or geolocation collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Request(String),

    #[error("lookup service returned HTTP status {0}")]
    Status(u16),

    #[error("malformed lookup response: {0}")]
    Decode(String),
}

/// Outcome of a paginated fetch that did not complete
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Node-level failure as it is surfaced in a [`ProbeResult`]
///
/// Cancellation is deliberately absent: an aborted run is never recorded as
/// a node failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    #[error("connection error")]
    ConnectionError,

    #[error("capability not supported")]
    CapabilityNotSupported,

    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl From<&NodeError> for ProbeFailure {
    fn from(err: &NodeError) -> Self {
        match err {
            NodeError::InvalidEndpoint(_) | NodeError::Connection(_) => {
                ProbeFailure::ConnectionError
            }
            NodeError::Unsupported(_) => ProbeFailure::CapabilityNotSupported,
            other => ProbeFailure::Other(other.to_string()),
        }
    }
}

/// Rejected run configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("record budget must be between 1 and {MAX_RECORD_BUDGET}, got {0}")]
    RecordBudget(usize),

    #[error("node list is empty")]
    NoNodes,

    #[error("address must not be empty")]
    EmptyAddress,

    #[error("token id must not be empty")]
    EmptyTokenId,
}
