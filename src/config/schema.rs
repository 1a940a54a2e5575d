//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file; every section falls back to usable defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::RegressionConfig;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Trace defaults applied when the CLI or API omits them.
    pub trace: TraceConfig,

    /// Trace store location.
    pub store: StoreConfig,

    /// Regression detection thresholds.
    pub regression: RegressionConfig,

    /// Dashboard server settings.
    pub dashboard: DashboardConfig,
}

/// Defaults for individual traces.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Cumulative per-trace timeout, in seconds.
    pub timeout_secs: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { timeout_secs: 30.0 }
    }
}

impl TraceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.0))
    }
}

/// Store location settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file path; defaults to `~/.tracepulse/traces.db`.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tracepulse")
            .join("traces.db")
    }
}

/// Dashboard server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Bind address (e.g., "127.0.0.1:8585").
    pub bind_address: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1:8585".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_section() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.trace.timeout_secs, 30.0);
        assert_eq!(config.dashboard.bind_address, "127.0.0.1:8585");
        assert_eq!(config.regression.recent_window, 1);
        assert!(config.store.path.is_none());
    }

    #[test]
    fn partial_files_override_only_named_fields() {
        let config: AppConfig = toml::from_str(
            "[regression]\nrecent_window = 3\n\n[dashboard]\nbind_address = \"0.0.0.0:9000\"\n",
        )
        .unwrap();
        assert_eq!(config.regression.recent_window, 3);
        assert_eq!(config.regression.min_baseline, 3);
        assert_eq!(config.dashboard.bind_address, "0.0.0.0:9000");
    }
}
