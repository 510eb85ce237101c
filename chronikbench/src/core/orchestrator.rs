//! Benchmark run orchestration
//!
//! Nodes are processed strictly one after another. For the current node the
//! history and offer tests run concurrently and are joined before the
//! combined result is emitted, so emission order always equals node-list
//! order and at most two node tests are outstanding at any time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::executor::NodeTestExecutor;
use super::types::{CombinedResult, NodeEndpoint};
use super::{ConfigError, MAX_RECORD_BUDGET};

/// Inputs of one benchmark run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub nodes: Vec<NodeEndpoint>,
    pub address: String,
    pub token_id: String,
    pub record_budget: usize,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.token_id.trim().is_empty() {
            return Err(ConfigError::EmptyTokenId);
        }
        if !(1..=MAX_RECORD_BUDGET).contains(&self.record_budget) {
            return Err(ConfigError::RecordBudget(self.record_budget));
        }
        Ok(())
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Combined results emitted
    pub completed: usize,
    pub cancelled: bool,
}

pub struct Orchestrator {
    executor: Arc<NodeTestExecutor>,
}

impl Orchestrator {
    pub fn new(executor: Arc<NodeTestExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<NodeTestExecutor> {
        &self.executor
    }

    /// Run the benchmark, sending each combined result as soon as it exists
    ///
    /// Returns when every node has been tested, when `cancel` fires, or when
    /// the receiving side of `results` goes away. No result is sent for a
    /// node whose tests were in flight when the run was cancelled.
    pub async fn run(
        &self,
        config: &RunConfig,
        cancel: &CancellationToken,
        results: &mpsc::Sender<CombinedResult>,
    ) -> RunSummary {
        let mut summary = RunSummary {
            completed: 0,
            cancelled: false,
        };

        for (index, endpoint) in config.nodes.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            info!("Testing node {}/{}: {}", index + 1, config.nodes.len(), endpoint);

            let joined = tokio::try_join!(
                self.executor.run_history_test(
                    endpoint,
                    &config.address,
                    config.record_budget,
                    cancel
                ),
                self.executor
                    .run_offer_test(endpoint, &config.token_id, cancel),
            );

            let (history, offers) = match joined {
                Ok(pair) => pair,
                Err(_) => {
                    summary.cancelled = true;
                    break;
                }
            };

            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let combined = CombinedResult::combine(history, offers);
            if let Some(error) = &combined.error {
                warn!("Node {} failed: {}", endpoint, error);
            }

            if results.send(combined).await.is_err() {
                warn!("Result receiver dropped, stopping run");
                break;
            }
            summary.completed += 1;
        }

        if summary.cancelled {
            info!("Tests aborted after {} node(s)", summary.completed);
        } else {
            info!("Run finished, {} node(s) tested", summary.completed);
        }
        summary
    }

    /// Validate `config` and run it on a background task
    pub fn start(self: &Arc<Self>, config: RunConfig) -> Result<BenchmarkRun, ConfigError> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(config.nodes.len());
        let orchestrator = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move { orchestrator.run(&config, &token, &tx).await });

        Ok(BenchmarkRun {
            cancel,
            results: rx,
            task,
        })
    }
}

/// A run in progress: a result stream plus its cancellation switch
pub struct BenchmarkRun {
    cancel: CancellationToken,
    results: mpsc::Receiver<CombinedResult>,
    task: JoinHandle<RunSummary>,
}

impl BenchmarkRun {
    /// Abort the run; calling it again, or after completion, has no effect
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next combined result in node order, `None` once the run has ended
    pub async fn next(&mut self) -> Option<CombinedResult> {
        self.results.recv().await
    }

    /// Wait for the run task and report how it ended
    pub async fn finish(self) -> RunSummary {
        let BenchmarkRun { cancel, task, .. } = self;
        match task.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Benchmark task failed: {}", e);
                RunSummary {
                    completed: 0,
                    cancelled: cancel.is_cancelled(),
                }
            }
        }
    }

    /// Drain every result and wait for completion
    pub async fn collect(mut self) -> (Vec<CombinedResult>, RunSummary) {
        let mut collected = Vec::new();
        while let Some(result) = self.next().await {
            collected.push(result);
        }
        let summary = self.finish().await;
        (collected, summary)
    }
}
