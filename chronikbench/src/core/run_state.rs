//! Process-wide state of the current run
//!
//! Owned by a single task. Orchestrator tasks hand their results back tagged
//! with the run id they were started under; anything arriving for a run that
//! was superseded is discarded. An aborted run stays current until the next
//! one begins, so results it emitted before seeing the abort are still
//! appended when they arrive late.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::CombinedResult;

/// Identifier of a run within the process lifetime
pub type RunId = u64;

/// Which raw payload of a combined result to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    History,
    Offers,
}

#[derive(Default)]
pub struct RunState {
    run_id: RunId,
    running: bool,
    results: Vec<CombinedResult>,
    cancel: Option<CancellationToken>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new run
    ///
    /// Cancels any run still in flight and empties the result sequence.
    pub fn begin(&mut self, cancel: CancellationToken) -> RunId {
        if let Some(previous) = self.cancel.replace(cancel) {
            previous.cancel();
        }
        self.results.clear();
        self.run_id += 1;
        self.running = true;
        self.run_id
    }

    /// Append a result emitted by run `run_id`
    ///
    /// Returns false when the result belongs to a run that is no longer
    /// current. The orchestrator never emits a node after observing its
    /// cancellation, so a result of an aborted run was produced before the
    /// abort took effect and is kept.
    pub fn append(&mut self, run_id: RunId, result: CombinedResult) -> bool {
        if run_id != self.run_id {
            debug!("Dropping result of stale run {} for {}", run_id, result.node);
            return false;
        }
        self.results.push(result);
        true
    }

    /// Mark run `run_id` as finished
    pub fn finish(&mut self, run_id: RunId) -> bool {
        if run_id != self.run_id || !self.running {
            return false;
        }
        self.running = false;
        self.cancel = None;
        true
    }

    /// Abort the current run, keeping results emitted so far
    ///
    /// Returns whether a run was in flight. Aborting twice, or after the run
    /// finished, has no effect.
    pub fn abort(&mut self) -> bool {
        match self.cancel.take() {
            Some(cancel) if self.running => {
                cancel.cancel();
                self.running = false;
                true
            }
            _ => false,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn results(&self) -> &[CombinedResult] {
        &self.results
    }

    pub fn payload(&self, index: usize, kind: PayloadKind) -> Option<Arc<Value>> {
        let result = self.results.get(index)?;
        match kind {
            PayloadKind::History => result.data.clone(),
            PayloadKind::Offers => result.token_data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Capability, NodeAddress, NodeEndpoint, ProbeResult};
    use crate::core::ProbeFailure;
    use serde_json::json;

    fn result(node: &str) -> CombinedResult {
        let endpoint = NodeEndpoint::new(node);
        let mut history = ProbeResult::failed(
            &endpoint,
            Capability::History,
            NodeAddress::Unknown,
            ProbeFailure::ConnectionError,
        );
        history.payload = Some(Arc::new(json!({"txs": [1]})));
        let offers = ProbeResult::failed(
            &endpoint,
            Capability::Offers,
            NodeAddress::Unknown,
            ProbeFailure::Timeout,
        );
        CombinedResult::combine(history, offers)
    }

    #[test]
    fn test_begin_resets_results_and_cancels_previous() {
        let mut state = RunState::new();
        let first = CancellationToken::new();
        let run = state.begin(first.clone());
        assert!(state.append(run, result("https://a.example")));

        let next = state.begin(CancellationToken::new());
        assert!(first.is_cancelled());
        assert_ne!(run, next);
        assert!(state.results().is_empty());
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let mut state = RunState::new();
        let old = state.begin(CancellationToken::new());
        let current = state.begin(CancellationToken::new());

        assert!(!state.append(old, result("https://a.example")));
        assert!(state.append(current, result("https://b.example")));
        assert_eq!(state.results().len(), 1);
        assert_eq!(state.results()[0].node, "https://b.example");
    }

    #[test]
    fn test_abort_keeps_emitted_results() {
        let mut state = RunState::new();
        let token = CancellationToken::new();
        let run = state.begin(token.clone());
        state.append(run, result("https://a.example"));

        assert!(state.abort());
        assert!(token.is_cancelled());
        assert!(!state.abort());
        assert!(!state.is_running());
        assert_eq!(state.results().len(), 1);
    }

    #[test]
    fn test_result_queued_before_abort_is_kept() {
        let mut state = RunState::new();
        let run = state.begin(CancellationToken::new());
        state.append(run, result("https://a.example"));

        // emitted by the orchestrator, still in transit when the abort lands
        assert!(state.abort());
        assert!(state.append(run, result("https://b.example")));
        assert!(!state.finish(run));

        let nodes: Vec<_> = state.results().iter().map(|r| r.node.as_str()).collect();
        assert_eq!(nodes, vec!["https://a.example", "https://b.example"]);
        assert!(!state.is_running());

        // a later run still discards it
        let next = state.begin(CancellationToken::new());
        assert!(!state.append(run, result("https://c.example")));
        assert!(state.append(next, result("https://d.example")));
        assert_eq!(state.results().len(), 1);
    }

    #[test]
    fn test_abort_after_finish_is_noop() {
        let mut state = RunState::new();
        let token = CancellationToken::new();
        let run = state.begin(token.clone());
        assert!(state.finish(run));

        assert!(!state.abort());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_payload_lookup() {
        let mut state = RunState::new();
        let run = state.begin(CancellationToken::new());
        state.append(run, result("https://a.example"));

        assert_eq!(
            state.payload(0, PayloadKind::History).as_deref(),
            Some(&json!({"txs": [1]}))
        );
        assert!(state.payload(0, PayloadKind::Offers).is_none());
        assert!(state.payload(5, PayloadKind::History).is_none());
    }
}
