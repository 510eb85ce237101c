//! # chronikbench
//!
//! Benchmark orchestration engine for Chronik blockchain indexer nodes.
//!
//! ## Overview
//!
//! Given a list of node endpoints, a wallet address and a token id, the
//! engine measures each node on two capabilities:
//! - **Address history**: paginated fetch of up to a record budget (max 600)
//! - **Marketplace offers**: one page of historic offers, bounded by 10 seconds
//!
//! Every capability test probes connection latency (mean of three metadata
//! round trips), resolves the node's hostname and geolocates the resulting
//! address before fetching. Nodes are tested one after another; the two
//! tests of a node run concurrently and are merged into one
//! [`CombinedResult`] that is emitted as soon as it is ready.
//!
//! ## Quick Start
//!
//! ```
//! use chronikbench::{NodeEndpoint, RunConfig};
//!
//! let config = RunConfig {
//!     nodes: NodeEndpoint::parse_list(
//!         "https://chronik.e.cash\n\n  https://xec.paybutton.org  \n",
//!     ),
//!     address: "ecash:qr6lws9uwmjkkaau4w956lugs9nlg9hudqs26lyxkv".to_string(),
//!     token_id: "ac31bb0bccf33de1683efce4da64f1cb6d8e8d6e098bc01c51d5864deb0e783f".to_string(),
//!     record_budget: 10,
//! };
//!
//! assert_eq!(config.nodes.len(), 2);
//! assert!(config.validate().is_ok());
//! ```
//!
//! Running a benchmark needs collaborators implementing [`NodeConnector`],
//! [`NameResolver`] and [`GeoLocator`]. The `chronikbench-client` crate
//! ships HTTP implementations:
//!
//! ```ignore
//! let executor = Arc::new(NodeTestExecutor::new(connector, cache, ExecutorSettings::default()));
//! let orchestrator = Arc::new(Orchestrator::new(executor));
//!
//! let mut run = orchestrator.start(config)?;
//! while let Some(result) = run.next().await {
//!     println!("{} {} ms", result.node, result.history_time);
//! }
//! ```
//!
//! ## Cancellation
//!
//! [`BenchmarkRun::cancel`] aborts the run at the next suspension point.
//! Results emitted before the abort are kept; nothing is emitted for the
//! node whose tests were in flight.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for the resolution cache maps
//! - `mock`: Export the scripted collaborators in [`mock`] for downstream tests

pub mod core;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use core::{
    BenchmarkRun, Capability, CombinedResult, ConfigError, DEFAULT_RECORD_BUDGET, ExecutorSettings,
    GeoLocator, LookupError, MAX_PAGE_SIZE, MAX_RECORD_BUDGET, NameResolver, NodeAddress,
    NodeClient, NodeConnector, NodeEndpoint, NodeError, Orchestrator, PayloadKind, ProbeFailure,
    ProbeResult, ResolutionCache, RunConfig, RunId, RunState, RunSummary, NodeTestExecutor,
    Timing,
};

// Re-export the payload module so benchmarks and the server can render raw data
pub use crate::core::payload;
