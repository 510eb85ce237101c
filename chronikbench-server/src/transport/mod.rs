//! Transport layer for the benchmark service
//!
//! Transports accept operator requests and forward them to the benchmark
//! actor through a [`BenchmarkHandle`].
//!
//! # Available Transports
//!
//! - [`http`]: REST API with JSON

pub mod http;


use crate::actor::BenchmarkHandle;
use anyhow::Result;
use async_trait::async_trait;

/// Common interface for transport implementations
#[async_trait]
pub trait Transport {
    /// Start the transport server
    ///
    /// Binds the configured address and serves until an error occurs or the
    /// server shuts down.
    async fn start(self, handle: BenchmarkHandle) -> Result<()>;
}
