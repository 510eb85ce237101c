//! Benchmark actor owning the process-wide run state
//!
//! Transports talk to the actor through a cloneable [`BenchmarkHandle`].
//! Each started run gets a forwarding task that drains the orchestrator's
//! result stream and hands every result back to the actor tagged with its
//! run id, so a superseded run can never touch the current state. Results an
//! aborted run emitted before the abort are still appended when they arrive.

use std::sync::Arc;

use anyhow::Result;
use chronikbench::{CombinedResult, Orchestrator, PayloadKind, RunConfig, RunId, RunState, RunSummary};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::metrics::Metrics;
use crate::types::RunSnapshot;

/// Message types for the benchmark actor
pub enum BenchmarkMessage {
    Start {
        config: RunConfig,
        response_tx: oneshot::Sender<Result<RunId>>,
    },
    Abort {
        response_tx: oneshot::Sender<bool>,
    },
    Snapshot {
        response_tx: oneshot::Sender<RunSnapshot>,
    },
    Payload {
        index: usize,
        kind: PayloadKind,
        response_tx: oneshot::Sender<Option<Arc<Value>>>,
    },
}

/// Progress reported by a run's forwarding task
enum RunEvent {
    Emitted { run_id: RunId, result: CombinedResult },
    Finished { run_id: RunId, summary: RunSummary },
}

/// Handle to communicate with the benchmark actor
#[derive(Clone)]
pub struct BenchmarkHandle {
    tx: mpsc::Sender<BenchmarkMessage>,
}

impl BenchmarkHandle {
    /// Start a run, cancelling whatever run is in flight
    ///
    /// An invalid configuration is returned as a [`chronikbench::ConfigError`]
    /// inside the error.
    pub async fn start(&self, config: RunConfig) -> Result<RunId> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BenchmarkMessage::Start {
            config,
            response_tx,
        })
        .await?;
        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Benchmark actor dropped response channel"))?
    }

    /// Abort the current run; returns whether one was in flight
    pub async fn abort(&self) -> Result<bool> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BenchmarkMessage::Abort { response_tx }).await?;
        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Benchmark actor dropped response channel"))
    }

    pub async fn snapshot(&self) -> Result<RunSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BenchmarkMessage::Snapshot { response_tx }).await?;
        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Benchmark actor dropped response channel"))
    }

    /// Raw payload of the result at `index`
    pub async fn payload(&self, index: usize, kind: PayloadKind) -> Result<Option<Arc<Value>>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BenchmarkMessage::Payload {
            index,
            kind,
            response_tx,
        })
        .await?;
        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Benchmark actor dropped response channel"))
    }

    async fn send(&self, message: BenchmarkMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| anyhow::anyhow!("Benchmark actor has shut down"))
    }
}

/// The benchmark actor
pub struct BenchmarkActor {
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<Metrics>,
    state: RunState,
    events: mpsc::Sender<RunEvent>,
}

impl BenchmarkActor {
    /// Spawn a new benchmark actor
    pub fn spawn(
        buffer_size: usize,
        orchestrator: Arc<Orchestrator>,
        metrics: Arc<Metrics>,
    ) -> BenchmarkHandle {
        let (tx, rx) = mpsc::channel(buffer_size);
        let (events_tx, events_rx) = mpsc::channel(buffer_size);

        let actor = BenchmarkActor {
            orchestrator,
            metrics,
            state: RunState::new(),
            events: events_tx,
        };
        tokio::spawn(actor.run(rx, events_rx));

        BenchmarkHandle { tx }
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<BenchmarkMessage>,
        mut events_rx: mpsc::Receiver<RunEvent>,
    ) {
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    None => break,
                },
                Some(event) = events_rx.recv() => self.handle_event(event),
            }
        }

        self.state.abort();
        tracing::info!("Benchmark actor shutting down");
    }

    fn handle_message(&mut self, msg: BenchmarkMessage) {
        match msg {
            BenchmarkMessage::Start {
                config,
                response_tx,
            } => {
                let response = self.start_run(config);
                // Ignore send errors - requester may have gone away
                let _ = response_tx.send(response);
            }
            BenchmarkMessage::Abort { response_tx } => {
                let aborted = self.state.abort();
                if aborted {
                    tracing::info!("Run {} aborted", self.state.run_id());
                    self.metrics.record_run_aborted();
                }
                let _ = response_tx.send(aborted);
            }
            BenchmarkMessage::Snapshot { response_tx } => {
                let _ = response_tx.send(RunSnapshot {
                    run_id: self.state.run_id(),
                    running: self.state.is_running(),
                    results: self.state.results().to_vec(),
                });
            }
            BenchmarkMessage::Payload {
                index,
                kind,
                response_tx,
            } => {
                let _ = response_tx.send(self.state.payload(index, kind));
            }
        }
    }

    fn start_run(&mut self, config: RunConfig) -> Result<RunId> {
        let mut run = self.orchestrator.start(config)?;
        let run_id = self.state.begin(run.cancel_token());
        self.metrics.record_run_started();
        tracing::info!("Run {} started", run_id);

        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(result) = run.next().await {
                if events
                    .send(RunEvent::Emitted { run_id, result })
                    .await
                    .is_err()
                {
                    run.cancel();
                    break;
                }
            }
            let summary = run.finish().await;
            let _ = events.send(RunEvent::Finished { run_id, summary }).await;
        });

        Ok(run_id)
    }

    fn handle_event(&mut self, event: RunEvent) {
        match event {
            RunEvent::Emitted { run_id, result } => {
                if self.state.append(run_id, result) {
                    if let Some(appended) = self.state.results().last() {
                        self.metrics.record_result(appended);
                    }
                }
            }
            RunEvent::Finished { run_id, summary } => {
                if self.state.finish(run_id) {
                    tracing::info!(
                        "Run {} finished: {} node(s) tested",
                        run_id,
                        summary.completed
                    );
                    self.metrics.record_run_completed();
                }
            }
        }
    }
}
