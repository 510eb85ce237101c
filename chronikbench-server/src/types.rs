//! Request and response types of the run-control API
//!
//! Combined results are serialized with their timings as numbers or `"N/A"`,
//! addresses as strings (including the `Resolving...` and `Unknown`
//! sentinels) and the payload size as a two-decimal kilobyte string. Raw
//! payloads are never inlined; they are fetched through the payload viewer.

use chronikbench::{CombinedResult, NodeEndpoint, RunConfig, RunId};
use serde::{Deserialize, Serialize};

use crate::config::RunDefaults;

/// Body of `POST /runs`; every field falls back to the configured default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub address: Option<String>,
    pub token_id: Option<String>,
    pub record_budget: Option<usize>,
    /// Node URLs; an entry may itself hold a newline separated list
    pub nodes: Option<Vec<String>>,
}

impl StartRunRequest {
    /// Merge the request over `defaults`; the result is not yet validated
    pub fn into_run_config(self, defaults: &RunDefaults) -> RunConfig {
        let nodes = match self.nodes {
            Some(entries) => NodeEndpoint::parse_list(&entries.join("\n")),
            None => defaults.nodes.clone(),
        };

        RunConfig {
            nodes,
            address: self
                .address
                .map(|a| a.trim().to_string())
                .unwrap_or_else(|| defaults.address.clone()),
            token_id: self
                .token_id
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| defaults.token_id.clone()),
            record_budget: self.record_budget.unwrap_or(defaults.record_budget),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunResponse {
    pub run_id: RunId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortResponse {
    /// Whether a run was in flight
    pub aborted: bool,
}

/// Point-in-time copy of the run state
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub running: bool,
    pub results: Vec<CombinedResult>,
}

/// One row of `GET /results`
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    #[serde(flatten)]
    pub result: CombinedResult,
    pub has_data: bool,
    pub has_token_data: bool,
}

impl From<CombinedResult> for ResultRow {
    fn from(result: CombinedResult) -> Self {
        ResultRow {
            has_data: result.data.is_some(),
            has_token_data: result.token_data.is_some(),
            result,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsResponse {
    pub run_id: RunId,
    pub running: bool,
    pub results: Vec<ResultRow>,
}

impl From<RunSnapshot> for ResultsResponse {
    fn from(snapshot: RunSnapshot) -> Self {
        ResultsResponse {
            run_id: snapshot.run_id,
            running: snapshot.running,
            results: snapshot.results.into_iter().map(ResultRow::from).collect(),
        }
    }
}

/// Error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    pub error: String,
}
