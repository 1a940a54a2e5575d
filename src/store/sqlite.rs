//! SQLite-backed trace store.
//!
//! One durable row per `TraceResult`, indexed by URL and time. WAL journal
//! mode keeps concurrent appends from parallel trace runs cheap; readers
//! never observe a partially written row.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite};

use crate::store::{Preset, QueryFilter, StoreError, TraceStore, UrlSummary};
use crate::tracer::error::TraceFailure;
use crate::tracer::TraceResult;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS traces (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        method TEXT NOT NULL DEFAULT 'GET',
        label TEXT,
        created_at TEXT NOT NULL,
        dns_ms REAL,
        tcp_connect_ms REAL,
        tls_handshake_ms REAL,
        server_processing_ms REAL,
        content_transfer_ms REAL,
        total_ms REAL NOT NULL,
        status_code INTEGER,
        response_size INTEGER,
        ip_address TEXT,
        tls_version TEXT,
        error TEXT,
        headers_received TEXT,
        body_preview TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_traces_url ON traces(url)",
    "CREATE INDEX IF NOT EXISTS idx_traces_created_at ON traces(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_traces_label ON traces(label)",
    "CREATE TABLE IF NOT EXISTS presets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        url TEXT NOT NULL,
        method TEXT NOT NULL DEFAULT 'GET',
        headers TEXT NOT NULL DEFAULT '{}',
        body TEXT,
        created_at TEXT NOT NULL
    )",
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database file, creating parent directories.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Self::connect(options, 10).await
    }

    /// In-memory database for tests. Every connection would get its own
    /// database, so the pool is restricted to a single connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, StoreError> {
        let pool = sqlx::pool::PoolOptions::<Sqlite>::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// One record by row id.
    pub async fn get_trace(&self, id: i64) -> Result<Option<TraceResult>, StoreError> {
        let row = sqlx::query("SELECT * FROM traces WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| result_from_row(&r)).transpose()
    }

    /// Most recent records across every URL, oldest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<TraceResult>, StoreError> {
        let rows = sqlx::query("SELECT * FROM traces ORDER BY created_at DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        let mut results = rows
            .iter()
            .map(result_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        results.reverse();
        Ok(results)
    }

    /// Delete records older than the cutoff, optionally for one URL.
    pub async fn purge_before(
        &self,
        cutoff: DateTime<Utc>,
        url: Option<&str>,
    ) -> Result<u64, StoreError> {
        let outcome = match url {
            Some(url) => {
                sqlx::query("DELETE FROM traces WHERE created_at < ? AND url = ?")
                    .bind(encode_time(cutoff))
                    .bind(url)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM traces WHERE created_at < ?")
                    .bind(encode_time(cutoff))
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(outcome.rows_affected())
    }

    pub async fn save_preset(&self, preset: &Preset) -> Result<(), StoreError> {
        let headers = serde_json::to_string(&preset.headers)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        sqlx::query(
            "INSERT OR REPLACE INTO presets (name, url, method, headers, body, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&preset.name)
        .bind(&preset.url)
        .bind(&preset.method)
        .bind(headers)
        .bind(&preset.body)
        .bind(encode_time(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_preset(&self, name: &str) -> Result<Option<Preset>, StoreError> {
        let row = sqlx::query("SELECT * FROM presets WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| preset_from_row(&r)).transpose()
    }

    pub async fn list_presets(&self) -> Result<Vec<Preset>, StoreError> {
        let rows = sqlx::query("SELECT * FROM presets ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(preset_from_row).collect()
    }

    pub async fn delete_preset(&self, name: &str) -> Result<bool, StoreError> {
        let outcome = sqlx::query("DELETE FROM presets WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(outcome.rows_affected() > 0)
    }
}

#[async_trait]
impl TraceStore for SqliteStore {
    async fn append(&self, result: &TraceResult) -> Result<i64, StoreError> {
        let error = result
            .error
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let headers = result
            .headers_received
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let outcome = sqlx::query(
            "INSERT INTO traces (
                url, method, label, created_at,
                dns_ms, tcp_connect_ms, tls_handshake_ms,
                server_processing_ms, content_transfer_ms, total_ms,
                status_code, response_size, ip_address, tls_version,
                error, headers_received, body_preview
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&result.url)
        .bind(&result.method)
        .bind(&result.label)
        .bind(encode_time(result.timestamp))
        .bind(result.dns_ms)
        .bind(result.tcp_connect_ms)
        .bind(result.tls_handshake_ms)
        .bind(result.server_processing_ms)
        .bind(result.content_transfer_ms)
        .bind(result.total_ms)
        .bind(result.status_code.map(i64::from))
        .bind(result.response_size.map(|v| v as i64))
        .bind(&result.ip_address)
        .bind(&result.tls_version)
        .bind(error)
        .bind(headers)
        .bind(&result.body_preview)
        .execute(&self.pool)
        .await?;
        Ok(outcome.last_insert_rowid())
    }

    async fn query(&self, url: &str, filter: &QueryFilter) -> Result<Vec<TraceResult>, StoreError> {
        let mut sql = String::from("SELECT * FROM traces WHERE url = ?");
        if filter.label.is_some() {
            sql.push_str(" AND label = ?");
        }
        if filter.since.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if filter.until.is_some() {
            sql.push_str(" AND created_at <= ?");
        }
        // Newest first so LIMIT keeps the most recent; reversed below.
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        if filter.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql).bind(url);
        if let Some(label) = &filter.label {
            query = query.bind(label);
        }
        if let Some(since) = filter.since {
            query = query.bind(encode_time(since));
        }
        if let Some(until) = filter.until {
            query = query.bind(encode_time(until));
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut results = rows
            .iter()
            .map(result_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        results.reverse();
        Ok(results)
    }

    async fn list_urls(&self) -> Result<Vec<UrlSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT url,
                    COUNT(*) AS trace_count,
                    COALESCE(AVG(CASE WHEN error IS NULL THEN total_ms END), 0) AS avg_total_ms,
                    COALESCE(MIN(CASE WHEN error IS NULL THEN total_ms END), 0) AS min_total_ms,
                    COALESCE(MAX(CASE WHEN error IS NULL THEN total_ms END), 0) AS max_total_ms,
                    MAX(created_at) AS last_traced
             FROM traces GROUP BY url ORDER BY url",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UrlSummary {
                    url: row.try_get("url")?,
                    trace_count: row.try_get("trace_count")?,
                    avg_total_ms: row.try_get("avg_total_ms")?,
                    min_total_ms: row.try_get("min_total_ms")?,
                    max_total_ms: row.try_get("max_total_ms")?,
                    last_traced: row
                        .try_get::<Option<String>, _>("last_traced")?
                        .map(|s| decode_time(&s))
                        .transpose()?,
                })
            })
            .collect()
    }

    async fn purge(&self, url: Option<&str>) -> Result<u64, StoreError> {
        let outcome = match url {
            Some(url) => {
                sqlx::query("DELETE FROM traces WHERE url = ?")
                    .bind(url)
                    .execute(&self.pool)
                    .await?
            }
            None => sqlx::query("DELETE FROM traces").execute(&self.pool).await?,
        };
        Ok(outcome.rows_affected())
    }
}

/// RFC 3339 with fixed microsecond width, so text ordering is time ordering.
fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{text}': {e}")))
}

fn result_from_row(row: &SqliteRow) -> Result<TraceResult, StoreError> {
    let error = row
        .try_get::<Option<String>, _>("error")?
        .map(|text| {
            serde_json::from_str::<TraceFailure>(&text)
                .map_err(|e| StoreError::Corrupt(format!("invalid error payload: {e}")))
        })
        .transpose()?;
    let headers_received = row
        .try_get::<Option<String>, _>("headers_received")?
        .map(|text| {
            serde_json::from_str::<BTreeMap<String, String>>(&text)
                .map_err(|e| StoreError::Corrupt(format!("invalid header payload: {e}")))
        })
        .transpose()?;

    Ok(TraceResult {
        url: row.try_get("url")?,
        method: row.try_get("method")?,
        label: row.try_get("label")?,
        timestamp: decode_time(&row.try_get::<String, _>("created_at")?)?,
        dns_ms: row.try_get("dns_ms")?,
        tcp_connect_ms: row.try_get("tcp_connect_ms")?,
        tls_handshake_ms: row.try_get("tls_handshake_ms")?,
        server_processing_ms: row.try_get("server_processing_ms")?,
        content_transfer_ms: row.try_get("content_transfer_ms")?,
        total_ms: row.try_get("total_ms")?,
        status_code: row.try_get::<Option<i64>, _>("status_code")?.map(|v| v as u16),
        response_size: row.try_get::<Option<i64>, _>("response_size")?.map(|v| v as u64),
        ip_address: row.try_get("ip_address")?,
        tls_version: row.try_get("tls_version")?,
        error,
        headers_received,
        body_preview: row.try_get("body_preview")?,
    })
}

fn preset_from_row(row: &SqliteRow) -> Result<Preset, StoreError> {
    let headers = serde_json::from_str(&row.try_get::<String, _>("headers")?)
        .map_err(|e| StoreError::Corrupt(format!("invalid preset headers: {e}")))?;
    Ok(Preset {
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        method: row.try_get("method")?,
        headers,
        body: row.try_get("body")?,
    })
}
