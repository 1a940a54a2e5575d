//! Dashboard JSON API.
//!
//! # Responsibilities
//! - Expose stored traces, statistics, trends, and regression findings
//! - Run traces on demand with the same semantics as the CLI
//! - Keep wire field names and units stable for UI bindings

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analysis::RegressionConfig;
use crate::config::TraceConfig;
use crate::store::SqliteStore;

use self::handlers::*;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub regression: RegressionConfig,
    pub trace_defaults: TraceConfig,
}

/// Build the API router with all handlers and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/urls", get(list_urls))
        .route("/api/traces", get(list_traces))
        .route("/api/trace", post(run_trace))
        .route("/api/trace/{id}", get(get_trace))
        .route("/api/stats", get(get_stats))
        .route("/api/trend", get(get_trend))
        .route("/api/regressions", get(get_regressions))
        .route("/api/compare", post(run_compare))
        .route("/api/curl", post(run_curl))
        .route("/api/presets", get(list_presets).post(save_preset))
        .route("/api/presets/{name}", axum::routing::delete(delete_preset))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

/// Run the dashboard server on the given listener until shutdown.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "dashboard API listening");

    let app = build_router(state);
    axum::serve(listener, app).await?;

    tracing::info!("dashboard API stopped");
    Ok(())
}
