//! Aggregate statistics over one endpoint's trace history.

use serde::{Deserialize, Serialize};

use crate::tracer::{Phase, TraceResult};

/// Derived statistics for one URL. Recomputed on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointStats {
    pub url: String,
    pub trace_count: usize,
    pub avg_total_ms: f64,
    pub min_total_ms: f64,
    pub max_total_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub avg_dns_ms: f64,
    pub avg_tcp_connect_ms: f64,
    pub avg_tls_handshake_ms: f64,
    pub avg_server_processing_ms: f64,
    pub avg_content_transfer_ms: f64,
}

/// Compute statistics over one URL's results.
///
/// Errored results are excluded up front; a history of nothing but failures
/// yields `trace_count == 0` with zeroed statistics, not an error. Pure
/// function: same input, same output.
pub fn compute_stats(url: &str, results: &[TraceResult]) -> EndpointStats {
    let ok: Vec<&TraceResult> = results.iter().filter(|r| r.is_success()).collect();
    if ok.is_empty() {
        return EndpointStats { url: url.to_string(), ..EndpointStats::default() };
    }

    let mut totals: Vec<f64> = ok.iter().map(|r| r.total_ms).collect();
    totals.sort_by(|a, b| a.total_cmp(b));
    let n = totals.len();

    EndpointStats {
        url: url.to_string(),
        trace_count: n,
        avg_total_ms: totals.iter().sum::<f64>() / n as f64,
        min_total_ms: totals[0],
        max_total_ms: totals[n - 1],
        p50_ms: nearest_rank(&totals, 0.50),
        p95_ms: nearest_rank(&totals, 0.95),
        p99_ms: nearest_rank(&totals, 0.99),
        avg_dns_ms: phase_mean(&ok, Phase::Dns),
        avg_tcp_connect_ms: phase_mean(&ok, Phase::TcpConnect),
        avg_tls_handshake_ms: phase_mean(&ok, Phase::TlsHandshake),
        avg_server_processing_ms: phase_mean(&ok, Phase::ServerProcessing),
        avg_content_transfer_ms: phase_mean(&ok, Phase::ContentTransfer),
    }
}

/// Nearest-rank percentile: index = ceil(p * n) - 1, clamped to [0, n-1].
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let index = (p * n as f64).ceil() as usize;
    sorted[index.saturating_sub(1).min(n - 1)]
}

fn phase_mean(results: &[&TraceResult], phase: Phase) -> f64 {
    let values: Vec<f64> = results.iter().filter_map(|r| r.phase_ms(phase)).collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{errored_result, successful_result};

    #[test]
    fn empty_input_yields_zeroed_stats() {
        let stats = compute_stats("https://a.example/", &[]);
        assert_eq!(stats.trace_count, 0);
        assert_eq!(stats.avg_total_ms, 0.0);
    }

    #[test]
    fn failed_traces_are_excluded_not_counted_as_zero() {
        let results = vec![
            successful_result("https://a.example/", 100.0),
            errored_result("https://a.example/"),
            successful_result("https://a.example/", 200.0),
        ];
        let stats = compute_stats("https://a.example/", &results);
        assert_eq!(stats.trace_count, 2);
        assert!((stats.avg_total_ms - 150.0).abs() < 1e-9);
    }

    #[test]
    fn only_failures_yield_count_zero() {
        let results = vec![errored_result("https://a.example/")];
        let stats = compute_stats("https://a.example/", &results);
        assert_eq!(stats.trace_count, 0);
    }

    #[test]
    fn single_sample_pins_every_percentile() {
        let results = vec![successful_result("https://a.example/", 42.0)];
        let stats = compute_stats("https://a.example/", &results);
        assert_eq!(stats.p50_ms, 42.0);
        assert_eq!(stats.p95_ms, 42.0);
        assert_eq!(stats.p99_ms, 42.0);
        assert_eq!(stats.min_total_ms, 42.0);
        assert_eq!(stats.max_total_ms, 42.0);
    }

    #[test]
    fn percentiles_are_monotonic() {
        let results: Vec<_> = (1..=100)
            .map(|i| successful_result("https://a.example/", i as f64))
            .collect();
        let stats = compute_stats("https://a.example/", &results);
        assert!(stats.p50_ms <= stats.p95_ms);
        assert!(stats.p95_ms <= stats.p99_ms);
        assert_eq!(stats.p50_ms, 50.0);
        assert_eq!(stats.p95_ms, 95.0);
        assert_eq!(stats.p99_ms, 99.0);
    }

    #[test]
    fn compute_is_idempotent() {
        let results: Vec<_> =
            [50.0, 52.0, 48.0, 51.0].iter().map(|t| successful_result("https://a.example/", *t)).collect();
        let first = compute_stats("https://a.example/", &results);
        let second = compute_stats("https://a.example/", &results);
        assert_eq!(first, second);
    }
}
