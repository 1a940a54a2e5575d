//! SQLite store integration tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracepulse::store::{Preset, QueryFilter, SqliteStore, TraceStore};
use tracepulse::tracer::error::{ErrorKind, TraceFailure};
use tracepulse::tracer::{Phase, TraceResult};

fn success_at(url: &str, minute: u32, total_parts: [f64; 5]) -> TraceResult {
    let [dns, tcp, tls, server, transfer] = total_parts;
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    let mut result = TraceResult {
        url: url.to_string(),
        method: "GET".into(),
        label: Some("ci".into()),
        timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 12, minute, 0).unwrap(),
        dns_ms: Some(dns),
        tcp_connect_ms: Some(tcp),
        tls_handshake_ms: Some(tls),
        server_processing_ms: Some(server),
        content_transfer_ms: Some(transfer),
        total_ms: 0.0,
        status_code: Some(200),
        response_size: Some(1024),
        ip_address: Some("192.0.2.7".into()),
        tls_version: Some("TLSv1.3".into()),
        error: None,
        headers_received: Some(headers),
        body_preview: Some("{\"ok\":true}".into()),
    };
    result.total_ms = result.summed_phases();
    result
}

fn failure_at(url: &str, minute: u32) -> TraceResult {
    TraceResult {
        url: url.to_string(),
        method: "GET".into(),
        label: None,
        timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 12, minute, 0).unwrap(),
        dns_ms: Some(2.0),
        tcp_connect_ms: None,
        tls_handshake_ms: None,
        server_processing_ms: None,
        content_transfer_ms: None,
        total_ms: 2.0,
        status_code: None,
        response_size: None,
        ip_address: None,
        tls_version: None,
        error: Some(TraceFailure {
            kind: ErrorKind::ConnectionRefused,
            phase: Phase::TcpConnect,
            message: "connection refused by 192.0.2.7:443".into(),
        }),
        headers_received: None,
        body_preview: None,
    }
}

#[tokio::test]
async fn append_and_query_round_trip_every_field() {
    let store = SqliteStore::in_memory().await.unwrap();
    let url = "https://api.example.com/v1";

    let success = success_at(url, 0, [3.0, 10.0, 25.0, 150.0, 12.0]);
    let failure = failure_at(url, 1);
    store.append(&success).await.unwrap();
    store.append(&failure).await.unwrap();

    let results = store.query(url, &QueryFilter::default()).await.unwrap();
    assert_eq!(results.len(), 2);
    // Oldest first, fields preserved exactly, including absent phases.
    assert_eq!(results[0], success);
    assert_eq!(results[1], failure);
}

#[tokio::test]
async fn query_limit_keeps_the_most_recent() {
    let store = SqliteStore::in_memory().await.unwrap();
    let url = "https://api.example.com/v1";
    for minute in 0..5 {
        store.append(&success_at(url, minute, [1.0, 1.0, 0.0, 10.0 + minute as f64, 1.0])).await.unwrap();
    }

    let results = store.query(url, &QueryFilter::latest(2)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].timestamp < results[1].timestamp);
    assert_eq!(results[1].server_processing_ms, Some(14.0));
}

#[tokio::test]
async fn query_filters_by_label_and_time_range() {
    let store = SqliteStore::in_memory().await.unwrap();
    let url = "https://api.example.com/v1";
    store.append(&success_at(url, 0, [1.0, 1.0, 0.0, 10.0, 1.0])).await.unwrap();
    store.append(&failure_at(url, 5)).await.unwrap();
    store.append(&success_at(url, 10, [1.0, 1.0, 0.0, 20.0, 1.0])).await.unwrap();

    let labeled = store
        .query(url, &QueryFilter { label: Some("ci".into()), ..QueryFilter::default() })
        .await
        .unwrap();
    assert_eq!(labeled.len(), 2);
    assert!(labeled.iter().all(|r| r.label.as_deref() == Some("ci")));

    let ranged = store
        .query(
            url,
            &QueryFilter {
                since: Some(Utc.with_ymd_and_hms(2026, 8, 1, 12, 4, 0).unwrap()),
                until: Some(Utc.with_ymd_and_hms(2026, 8, 1, 12, 6, 0).unwrap()),
                ..QueryFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ranged.len(), 1);
    assert!(!ranged[0].is_success());
}

#[tokio::test]
async fn list_urls_counts_all_but_aggregates_successes_only() {
    let store = SqliteStore::in_memory().await.unwrap();
    let a = "https://a.example/";
    let b = "https://b.example/";
    store.append(&success_at(a, 0, [1.0, 1.0, 0.0, 96.0, 2.0])).await.unwrap();
    store.append(&success_at(a, 1, [1.0, 1.0, 0.0, 196.0, 2.0])).await.unwrap();
    store.append(&failure_at(a, 2)).await.unwrap();
    store.append(&success_at(b, 0, [1.0, 1.0, 0.0, 47.0, 1.0])).await.unwrap();

    let summaries = store.list_urls().await.unwrap();
    assert_eq!(summaries.len(), 2);

    let summary_a = summaries.iter().find(|s| s.url == a).unwrap();
    assert_eq!(summary_a.trace_count, 3);
    assert!((summary_a.avg_total_ms - 150.0).abs() < 1e-9);
    assert!((summary_a.min_total_ms - 100.0).abs() < 1e-9);
    assert!((summary_a.max_total_ms - 200.0).abs() < 1e-9);
}

#[tokio::test]
async fn purge_by_url_leaves_other_histories_alone() {
    let store = SqliteStore::in_memory().await.unwrap();
    let a = "https://a.example/";
    let b = "https://b.example/";
    store.append(&success_at(a, 0, [1.0, 1.0, 0.0, 10.0, 1.0])).await.unwrap();
    store.append(&success_at(b, 0, [1.0, 1.0, 0.0, 10.0, 1.0])).await.unwrap();

    let removed = store.purge(Some(a)).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.query(a, &QueryFilter::default()).await.unwrap().is_empty());
    assert_eq!(store.query(b, &QueryFilter::default()).await.unwrap().len(), 1);

    let removed = store.purge(None).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.list_urls().await.unwrap().is_empty());
}

#[tokio::test]
async fn purge_before_cutoff_removes_only_older_rows() {
    let store = SqliteStore::in_memory().await.unwrap();
    let url = "https://a.example/";
    store.append(&success_at(url, 0, [1.0, 1.0, 0.0, 10.0, 1.0])).await.unwrap();
    store.append(&success_at(url, 30, [1.0, 1.0, 0.0, 10.0, 1.0])).await.unwrap();

    let cutoff = Utc.with_ymd_and_hms(2026, 8, 1, 12, 15, 0).unwrap();
    let removed = store.purge_before(cutoff, Some(url)).await.unwrap();
    assert_eq!(removed, 1);

    let remaining = store.query(url, &QueryFilter::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].timestamp >= cutoff);
}

#[tokio::test]
async fn concurrent_appends_all_land() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let url = "https://a.example/";

    let mut handles = Vec::new();
    for minute in 0..10u32 {
        let store = Arc::clone(&store);
        let result = success_at(url, minute, [1.0, 1.0, 0.0, 10.0, 1.0]);
        handles.push(tokio::spawn(async move { store.append(&result).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let results = store.query(url, &QueryFilter::default()).await.unwrap();
    assert_eq!(results.len(), 10);
}

#[tokio::test]
async fn presets_round_trip() {
    let store = SqliteStore::in_memory().await.unwrap();
    let mut headers = BTreeMap::new();
    headers.insert("Accept".to_string(), "application/json".to_string());
    let preset = Preset {
        name: "prod-health".into(),
        url: "https://api.example.com/health".into(),
        method: "GET".into(),
        headers,
        body: None,
    };

    store.save_preset(&preset).await.unwrap();
    assert_eq!(store.get_preset("prod-health").await.unwrap().unwrap(), preset);
    assert_eq!(store.list_presets().await.unwrap().len(), 1);

    // Saving the same name replaces the preset.
    let mut updated = preset.clone();
    updated.method = "HEAD".into();
    store.save_preset(&updated).await.unwrap();
    assert_eq!(store.get_preset("prod-health").await.unwrap().unwrap().method, "HEAD");
    assert_eq!(store.list_presets().await.unwrap().len(), 1);

    assert!(store.delete_preset("prod-health").await.unwrap());
    assert!(!store.delete_preset("prod-health").await.unwrap());
    assert!(store.get_preset("prod-health").await.unwrap().is_none());
}

#[tokio::test]
async fn on_disk_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.db");
    let url = "https://a.example/";

    {
        let store = SqliteStore::open(&path).await.unwrap();
        store.append(&success_at(url, 0, [1.0, 1.0, 0.0, 10.0, 1.0])).await.unwrap();
    }

    let reopened = SqliteStore::open(&path).await.unwrap();
    let results = reopened.query(url, &QueryFilter::default()).await.unwrap();
    assert_eq!(results.len(), 1);
}
