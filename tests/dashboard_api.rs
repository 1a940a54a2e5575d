//! Dashboard API tests, driven end-to-end through the recorder itself.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracepulse::analysis::RegressionConfig;
use tracepulse::config::TraceConfig;
use tracepulse::dashboard::{serve, AppState};
use tracepulse::store::SqliteStore;
use tracepulse::tracer::{Recorder, TraceRequest, TraceResult};

mod common;

async fn start_api() -> SocketAddr {
    let store = SqliteStore::in_memory().await.unwrap();
    let state = AppState {
        store: Arc::new(store),
        regression: RegressionConfig::default(),
        trace_defaults: TraceConfig::default(),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = serve(listener, state).await;
    });
    addr
}

async fn api_get(api: SocketAddr, path: &str) -> TraceResult {
    let request =
        TraceRequest::new(format!("http://{api}{path}")).with_timeout(Duration::from_secs(5));
    Recorder::new().trace(&request).await.unwrap()
}

async fn api_post(api: SocketAddr, path: &str, body: serde_json::Value) -> TraceResult {
    let request = TraceRequest::new(format!("http://{api}{path}"))
        .with_method("POST")
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string().into_bytes())
        .with_timeout(Duration::from_secs(5));
    Recorder::new().trace(&request).await.unwrap()
}

fn json_body(result: &TraceResult) -> serde_json::Value {
    serde_json::from_str(result.body_preview.as_deref().unwrap_or("null")).unwrap()
}

#[tokio::test]
async fn urls_start_empty() {
    let api = start_api().await;
    let result = api_get(api, "/api/urls").await;
    assert_eq!(result.status_code, Some(200));
    assert_eq!(json_body(&result), serde_json::json!([]));
}

#[tokio::test]
async fn trace_endpoint_runs_and_persists() {
    let api = start_api().await;
    let backend = common::start_fixed_backend("200 OK", "pong").await;
    let target = format!("http://{backend}/ping");

    let result = api_post(
        api,
        "/api/trace",
        serde_json::json!({ "url": target, "timeout_seconds": 5.0 }),
    )
    .await;
    assert_eq!(result.status_code, Some(200));

    let traced = json_body(&result);
    assert_eq!(traced["url"], target);
    assert_eq!(traced["status_code"], 200);
    assert!(traced["total_ms"].as_f64().unwrap() > 0.0);
    assert_eq!(traced["error"], serde_json::Value::Null);

    // The successful trace must now be part of the stored history.
    let stats = api_get(api, &format!("/api/stats?url={target}")).await;
    assert_eq!(stats.status_code, Some(200));
    assert_eq!(json_body(&stats)["trace_count"], 1);

    let listing = api_get(api, "/api/urls").await;
    let urls = json_body(&listing);
    assert_eq!(urls.as_array().unwrap().len(), 1);
    assert_eq!(urls[0]["url"], target);
}

#[tokio::test]
async fn failed_traces_are_reported_but_not_persisted() {
    let api = start_api().await;
    let result = api_post(
        api,
        "/api/trace",
        serde_json::json!({ "url": "http://host.invalid/", "timeout_seconds": 5.0 }),
    )
    .await;
    assert_eq!(result.status_code, Some(200));
    assert_eq!(json_body(&result)["error"]["kind"], "resolution_failure");

    let listing = api_get(api, "/api/urls").await;
    assert_eq!(json_body(&listing), serde_json::json!([]));
}

#[tokio::test]
async fn missing_trace_id_is_not_found() {
    let api = start_api().await;
    let result = api_get(api, "/api/trace/4242").await;
    assert_eq!(result.status_code, Some(404));
}

#[tokio::test]
async fn presets_are_managed_over_the_api() {
    let api = start_api().await;

    let saved = api_post(
        api,
        "/api/presets",
        serde_json::json!({
            "name": "health",
            "url": "api.example.com/health",
            "method": "GET"
        }),
    )
    .await;
    assert_eq!(saved.status_code, Some(200));
    // Bare hosts are normalized exactly like the CLI.
    assert_eq!(json_body(&saved)["url"], "https://api.example.com/health");

    let listing = api_get(api, "/api/presets").await;
    assert_eq!(json_body(&listing).as_array().unwrap().len(), 1);

    let missing = api_post(
        api,
        "/api/presets",
        serde_json::json!({ "name": "", "url": "x", "method": "GET" }),
    )
    .await;
    assert_eq!(missing.status_code, Some(400));
}

#[tokio::test]
async fn regressions_endpoint_returns_empty_without_history() {
    let api = start_api().await;
    let result = api_get(api, "/api/regressions?url=https://quiet.example/").await;
    assert_eq!(result.status_code, Some(200));
    assert_eq!(json_body(&result), serde_json::json!([]));
}
