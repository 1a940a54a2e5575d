//! API handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{compute_stats, detect_regressions, EndpointStats, RegressionFinding};
use crate::curl::parse_curl;
use crate::store::{Preset, QueryFilter, StoreError, TraceStore, UrlSummary};
use crate::tracer::{normalize_url, trace_urls, Recorder, RequestError, TraceRequest, TraceResult};

use super::AppState;

/// History window consulted for stats, trends, and regression analysis.
const ANALYSIS_WINDOW: u32 = 200;

/// Handler failure mapped onto an HTTP status and a JSON error body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(&'static str),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.to_string()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "store operation failed");
        ApiError::Internal(err.to_string())
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

pub async fn list_urls(State(state): State<AppState>) -> Result<Json<Vec<UrlSummary>>, ApiError> {
    Ok(Json(state.store.list_urls().await?))
}

#[derive(Deserialize)]
pub struct TracesParams {
    pub url: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

pub async fn list_traces(
    State(state): State<AppState>,
    Query(params): Query<TracesParams>,
) -> Result<Json<Vec<TraceResult>>, ApiError> {
    let filter = QueryFilter {
        label: params.label,
        since: params.since,
        until: params.until,
        limit: Some(params.limit.unwrap_or(50)),
    };
    Ok(Json(state.store.query(&params.url, &filter).await?))
}

pub async fn run_trace(
    State(state): State<AppState>,
    Json(mut request): Json<TraceRequest>,
) -> Result<Json<TraceResult>, ApiError> {
    request.url = normalize_url(&request.url);
    if request.timeout.is_zero() {
        request.timeout = state.trace_defaults.timeout();
    }
    let result = Recorder::new().trace(&request).await?;
    if result.is_success() {
        state.store.append(&result).await?;
    }
    Ok(Json(result))
}

pub async fn get_trace(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TraceResult>, ApiError> {
    state
        .store
        .get_trace(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("trace not found"))
}

#[derive(Deserialize)]
pub struct UrlParams {
    pub url: String,
}

pub async fn get_stats(
    State(state): State<AppState>,
    Query(params): Query<UrlParams>,
) -> Result<Json<EndpointStats>, ApiError> {
    let results = state
        .store
        .query(&params.url, &QueryFilter::latest(ANALYSIS_WINDOW))
        .await?;
    Ok(Json(compute_stats(&params.url, &results)))
}

/// One point of the latency trend, oldest first.
#[derive(Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub dns_ms: Option<f64>,
    pub tcp_connect_ms: Option<f64>,
    pub tls_handshake_ms: Option<f64>,
    pub server_processing_ms: Option<f64>,
    pub content_transfer_ms: Option<f64>,
    pub total_ms: f64,
    pub status_code: Option<u16>,
}

#[derive(Deserialize)]
pub struct TrendParams {
    pub url: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn get_trend(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let filter = QueryFilter::latest(params.limit.unwrap_or(50));
    let results = state.store.query(&params.url, &filter).await?;
    let trend = results
        .into_iter()
        .map(|r| TrendPoint {
            timestamp: r.timestamp,
            dns_ms: r.dns_ms,
            tcp_connect_ms: r.tcp_connect_ms,
            tls_handshake_ms: r.tls_handshake_ms,
            server_processing_ms: r.server_processing_ms,
            content_transfer_ms: r.content_transfer_ms,
            total_ms: r.total_ms,
            status_code: r.status_code,
        })
        .collect();
    Ok(Json(trend))
}

pub async fn get_regressions(
    State(state): State<AppState>,
    Query(params): Query<UrlParams>,
) -> Result<Json<Vec<RegressionFinding>>, ApiError> {
    let results = state
        .store
        .query(&params.url, &QueryFilter::latest(ANALYSIS_WINDOW))
        .await?;
    Ok(Json(detect_regressions(&results, &state.regression)))
}

#[derive(Deserialize)]
pub struct CompareParams {
    pub urls: Vec<String>,
    #[serde(default = "default_compare_count")]
    pub count: usize,
}

fn default_compare_count() -> usize {
    3
}

pub async fn run_compare(
    State(state): State<AppState>,
    Json(params): Json<CompareParams>,
) -> Result<Json<BTreeMap<String, TraceResult>>, ApiError> {
    if params.urls.is_empty() {
        return Err(ApiError::BadRequest("urls list required".into()));
    }
    let base = TraceRequest::new(&params.urls[0]).with_timeout(state.trace_defaults.timeout());
    let grouped = trace_urls(&base, &params.urls, params.count).await?;

    let mut averaged = BTreeMap::new();
    for (url, results) in grouped {
        if let Some(avg) = TraceResult::averaged(&results) {
            averaged.insert(url, avg);
        }
    }
    Ok(Json(averaged))
}

#[derive(Deserialize)]
pub struct CurlParams {
    pub curl: String,
}

pub async fn run_curl(
    State(state): State<AppState>,
    Json(params): Json<CurlParams>,
) -> Result<Json<TraceResult>, ApiError> {
    let mut request =
        parse_curl(&params.curl).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    request.timeout = state.trace_defaults.timeout();
    let result = Recorder::new().trace(&request).await?;
    if result.is_success() {
        state.store.append(&result).await?;
    }
    Ok(Json(result))
}

pub async fn list_presets(State(state): State<AppState>) -> Result<Json<Vec<Preset>>, ApiError> {
    Ok(Json(state.store.list_presets().await?))
}

pub async fn save_preset(
    State(state): State<AppState>,
    Json(mut preset): Json<Preset>,
) -> Result<Json<Preset>, ApiError> {
    if preset.name.is_empty() {
        return Err(ApiError::BadRequest("preset name required".into()));
    }
    preset.url = normalize_url(&preset.url);
    state.store.save_preset(&preset).await?;
    Ok(Json(preset))
}

pub async fn delete_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_preset(&name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("preset not found"))
    }
}
