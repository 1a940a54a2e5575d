//! Trace persistence contract.
//!
//! # Responsibilities
//! - Define the append/query/list/purge interface the analyzer depends on
//! - Keep store failures explicit: records are never fabricated or dropped
//!   silently

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracer::TraceResult;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Store-layer failure, surfaced to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stored record: {0}")]
    Corrupt(String),
}

/// Per-URL summary row for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlSummary {
    pub url: String,
    pub trace_count: i64,
    pub avg_total_ms: f64,
    pub min_total_ms: f64,
    pub max_total_ms: f64,
    pub last_traced: Option<DateTime<Utc>>,
}

/// Optional query narrowing: label, time range, most-recent limit.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub label: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Keep only the most recent N matching records.
    pub limit: Option<u32>,
}

impl QueryFilter {
    pub fn latest(limit: u32) -> Self {
        Self { limit: Some(limit), ..Self::default() }
    }
}

/// Append/query contract between the recorder and the analyzers.
///
/// Implementations must tolerate concurrent appends (each record is
/// independent) and must never serve a partially written record.
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Persist one result; returns its row id.
    async fn append(&self, result: &TraceResult) -> Result<i64, StoreError>;

    /// Results for one URL, time-ordered oldest first.
    async fn query(&self, url: &str, filter: &QueryFilter) -> Result<Vec<TraceResult>, StoreError>;

    /// Every traced URL with summary aggregates (errored traces are counted
    /// but excluded from the latency aggregates).
    async fn list_urls(&self) -> Result<Vec<UrlSummary>, StoreError>;

    /// Bulk delete: one URL's records, or everything. Returns rows removed.
    async fn purge(&self, url: Option<&str>) -> Result<u64, StoreError>;
}

/// A saved request shorthand, usable as `trace @name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}
