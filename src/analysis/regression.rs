//! Latency regression detection against a historical baseline.
//!
//! # Responsibilities
//! - Split an endpoint's history into baseline and recent windows
//! - Compare per-series means (five phases plus total)
//! - Grade degradations by severity and render a templated message

use serde::{Deserialize, Serialize};

use crate::tracer::{Phase, TraceResult};

/// Detection thresholds as an explicit value object, not literals spread
/// through the logic. Severity bounds are inclusive: exactly 50% is severe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Number of most recent results treated as "current".
    pub recent_window: usize,
    /// Minimum baseline size; smaller histories produce no findings.
    pub min_baseline: usize,
    /// Baseline means at or below this floor are skipped instead of divided.
    pub baseline_floor_ms: f64,
    pub minor_pct: f64,
    pub moderate_pct: f64,
    pub severe_pct: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            recent_window: 1,
            min_baseline: 3,
            baseline_floor_ms: 0.001,
            minor_pct: 10.0,
            moderate_pct: 20.0,
            severe_pct: 50.0,
        }
    }
}

impl RegressionConfig {
    /// Grade a signed percent change. Improvements and sub-threshold growth
    /// both grade `None`.
    pub fn severity(&self, change_pct: f64) -> Severity {
        if change_pct >= self.severe_pct {
            Severity::Severe
        } else if change_pct >= self.moderate_pct {
            Severity::Moderate
        } else if change_pct >= self.minor_pct {
            Severity::Minor
        } else {
            Severity::None
        }
    }
}

/// Ordered severity of a detected latency increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Minor,
    Moderate,
    Severe,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Severity::None => "none",
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        };
        f.write_str(text)
    }
}

/// One detected regression; transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionFinding {
    pub phase: Phase,
    pub change_pct: f64,
    pub severity: Severity,
    pub baseline_ms: f64,
    pub recent_ms: f64,
    pub message: String,
}

/// Compare the most recent results of one endpoint against its history.
///
/// `results` must be time-ordered, oldest first. Errored results are
/// excluded before windowing. Findings are returned in descending order of
/// `change_pct`, ties broken by phase name.
pub fn detect_regressions(
    results: &[TraceResult],
    config: &RegressionConfig,
) -> Vec<RegressionFinding> {
    if config.recent_window == 0 {
        return Vec::new();
    }
    let ok: Vec<&TraceResult> = results.iter().filter(|r| r.is_success()).collect();
    if ok.len() < config.recent_window + config.min_baseline {
        return Vec::new();
    }
    let (baseline, recent) = ok.split_at(ok.len() - config.recent_window);

    let mut findings = Vec::new();
    for phase in Phase::SERIES {
        let Some(baseline_ms) = window_mean(baseline, phase) else { continue };
        let Some(recent_ms) = window_mean(recent, phase) else { continue };
        if baseline_ms <= config.baseline_floor_ms {
            continue;
        }
        let change_pct = (recent_ms - baseline_ms) / baseline_ms * 100.0;
        let severity = config.severity(change_pct);
        if severity == Severity::None {
            continue;
        }
        findings.push(RegressionFinding {
            phase,
            change_pct,
            severity,
            baseline_ms,
            recent_ms,
            message: format!(
                "{} increased by {:.1}% ({:.1}ms -> {:.1}ms)",
                phase.label(),
                change_pct,
                baseline_ms,
                recent_ms
            ),
        });
    }

    findings.sort_by(|a, b| {
        b.change_pct
            .total_cmp(&a.change_pct)
            .then_with(|| a.phase.key().cmp(b.phase.key()))
    });
    findings
}

fn window_mean(window: &[&TraceResult], phase: Phase) -> Option<f64> {
    let values: Vec<f64> = window.iter().filter_map(|r| r.phase_ms(phase)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
