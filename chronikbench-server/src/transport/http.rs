//! HTTP/JSON transport for run control and reporting
//!
//! # API Endpoints
//!
//! ## POST /runs
//!
//! Start a benchmark run. Any run in flight is cancelled and the result list
//! is reset; the resolution caches are kept.
//!
//! ```json
//! {
//!   "address": "ecash:qr6lws9uwmjkkaau4w956lugs9nlg9hudqs26lyxkv",
//!   "token_id": "ac31bb0bccf33de1683efce4da64f1cb6d8e8d6e098bc01c51d5864deb0e783f",
//!   "record_budget": 200,
//!   "nodes": ["https://chronik.e.cash", "https://xec.paybutton.org"]
//! }
//! ```
//!
//! Every field is optional and falls back to the server's defaults; an empty
//! body starts the default run. Answers `202 {"run_id": 3}`, or `400` when
//! the merged configuration is invalid.
//!
//! ## POST /runs/abort
//!
//! Abort the current run. Idempotent; answers `{"aborted": true}` only when a
//! run was in flight. Results already emitted stay visible.
//!
//! ## GET /results
//!
//! ```json
//! {
//!   "run_id": 3,
//!   "running": false,
//!   "results": [{
//!     "node": "https://chronik.e.cash",
//!     "address": "203.0.113.7",
//!     "location": "Germany, Falkenstein",
//!     "connect_latency": 42,
//!     "history_time": 120,
//!     "record_count": 10,
//!     "token_time": "N/A",
//!     "offer_count": 0,
//!     "taken_count": 0,
//!     "data_size": "4.21",
//!     "offers_supported": false,
//!     "error": null,
//!     "has_data": true,
//!     "has_token_data": false
//!   }]
//! }
//! ```
//!
//! ## GET /results/{index}/data, GET /results/{index}/token-data
//!
//! Raw history or offer payload of a result, pretty-printed with oversized
//! integers as strings. The record count is sent in `X-Record-Count`.
//! `404` when the result or its payload does not exist.
//!
//! ## GET /ip-location?ip=<ip|self>
//!
//! Raw geolocation document for an address, or for the caller when `ip` is
//! `self` or absent. Failures answer `500 {"status": "fail", "message": ...}`.
//!
//! ## GET /health, GET /metrics
//!
//! Liveness (`OK`) and Prometheus metrics.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chronikbench::{ConfigError, PayloadKind, ResolutionCache, payload};
use serde::Deserialize;
use serde_json::json;

use super::Transport;
use crate::actor::BenchmarkHandle;
use crate::config::RunDefaults;
use crate::metrics::Metrics;
use crate::types::{AbortResponse, HttpErrorResponse, ResultsResponse, StartRunRequest, StartRunResponse};

/// Header carrying the record count of a raw payload
pub const RECORD_COUNT_HEADER: &str = "x-record-count";

/// Shared services the HTTP handlers need besides the actor
#[derive(Clone)]
pub struct HttpContext {
    pub defaults: RunDefaults,
    pub cache: Arc<ResolutionCache>,
    pub metrics: Arc<Metrics>,
}

/// HTTP transport implementation
pub struct HttpTransport {
    addr: SocketAddr,
    context: HttpContext,
}

impl HttpTransport {
    pub fn new(host: &str, port: u16, context: HttpContext) -> Result<Self> {
        let addr = format!("{host}:{port}").parse()?;
        Ok(Self { addr, context })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, handle: BenchmarkHandle) -> Result<()> {
        let app = router(handle, self.context);

        tracing::info!("HTTP server listening on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

struct AppState {
    handle: BenchmarkHandle,
    context: HttpContext,
}

type HttpError = (StatusCode, Json<HttpErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> HttpError {
    (
        status,
        Json(HttpErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal(e: anyhow::Error) -> HttpError {
    tracing::error!("Benchmark actor error: {}", e);
    error(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Internal server error: {e}"),
    )
}

/// Build the API router around a running actor
pub fn router(handle: BenchmarkHandle, context: HttpContext) -> Router {
    let state = Arc::new(AppState { handle, context });

    Router::new()
        .route("/runs", post(handle_start))
        .route("/runs/abort", post(handle_abort))
        .route("/results", get(handle_results))
        .route("/results/{index}/data", get(handle_data))
        .route("/results/{index}/token-data", get(handle_token_data))
        .route("/ip-location", get(handle_ip_location))
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

async fn handle_start(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<StartRunResponse>), HttpError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartRunRequest::default()
    } else {
        serde_json::from_slice::<StartRunRequest>(&body)
            .map_err(|e| error(StatusCode::BAD_REQUEST, format!("Invalid request body: {e}")))?
    };

    let config = request.into_run_config(&state.context.defaults);
    match state.handle.start(config).await {
        Ok(run_id) => Ok((StatusCode::ACCEPTED, Json(StartRunResponse { run_id }))),
        Err(e) => match e.downcast_ref::<ConfigError>() {
            Some(invalid) => Err(error(StatusCode::BAD_REQUEST, invalid.to_string())),
            None => Err(internal(e)),
        },
    }
}

async fn handle_abort(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AbortResponse>, HttpError> {
    let aborted = state.handle.abort().await.map_err(internal)?;
    Ok(Json(AbortResponse { aborted }))
}

async fn handle_results(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResultsResponse>, HttpError> {
    let snapshot = state.handle.snapshot().await.map_err(internal)?;
    Ok(Json(ResultsResponse::from(snapshot)))
}

async fn handle_data(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Response, HttpError> {
    raw_payload(&state, index, PayloadKind::History).await
}

async fn handle_token_data(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Response, HttpError> {
    raw_payload(&state, index, PayloadKind::Offers).await
}

async fn raw_payload(state: &AppState, index: usize, kind: PayloadKind) -> Result<Response, HttpError> {
    let document = state
        .handle
        .payload(index, kind)
        .await
        .map_err(internal)?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("No payload for result {index}")))?;

    let rendered = payload::render_pretty(&document).map_err(|e| {
        error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render payload: {e}"),
        )
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        RECORD_COUNT_HEADER,
        HeaderValue::from(payload::record_count(&document)),
    );
    Ok((headers, rendered).into_response())
}

#[derive(Debug, Deserialize)]
struct IpLocationQuery {
    ip: Option<String>,
}

async fn handle_ip_location(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<IpLocationQuery>,
) -> Response {
    let locator = state.context.cache.locator();
    let lookup = match query.ip.as_deref().map(str::trim) {
        Some(ip) if !ip.is_empty() && ip != "self" => locator.locate(ip).await,
        _ => match forwarded_ip(&headers) {
            Some(ip) => locator.locate(&ip).await,
            None => locator.locate_self().await,
        },
    };

    match lookup {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::warn!("Failed to get IP location information: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "fail", "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// Client address reported by a fronting proxy, if any
pub(crate) fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real = headers.get("x-real-ip").and_then(|v| v.to_str().ok());

    forwarded
        .or(real)
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.context.metrics.export_prometheus(),
    )
}
