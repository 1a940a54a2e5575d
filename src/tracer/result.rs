//! The immutable record produced by one recorder invocation.
//!
//! # Responsibilities
//! - Hold per-phase durations with "absent" distinct from "measured zero"
//! - Keep `total_ms` equal to the sum of the populated phases
//! - Fix the wire field names the dashboard and store bind to

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracer::error::TraceFailure;
use crate::tracer::phase::Phase;

/// Maximum bytes of response body preserved for diagnostic display.
pub const BODY_PREVIEW_LIMIT: usize = 4096;

/// One trace's outcome. Never mutated after the recorder returns it.
///
/// Phase fields are `None` when the trace failed before reaching that phase;
/// `Some(0.0)` means the phase ran and measured zero (TLS over `http://`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub label: Option<String>,
    pub timestamp: DateTime<Utc>,

    pub dns_ms: Option<f64>,
    pub tcp_connect_ms: Option<f64>,
    pub tls_handshake_ms: Option<f64>,
    pub server_processing_ms: Option<f64>,
    pub content_transfer_ms: Option<f64>,
    /// Sum of the populated phase fields, by definition; never measured
    /// end-to-end on its own.
    pub total_ms: f64,

    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub response_size: Option<u64>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub tls_version: Option<String>,
    #[serde(default)]
    pub error: Option<TraceFailure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers_received: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_preview: Option<String>,
}

impl TraceResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Duration of one phase; `Total` maps onto `total_ms`.
    pub fn phase_ms(&self, phase: Phase) -> Option<f64> {
        match phase {
            Phase::Dns => self.dns_ms,
            Phase::TcpConnect => self.tcp_connect_ms,
            Phase::TlsHandshake => self.tls_handshake_ms,
            Phase::ServerProcessing => self.server_processing_ms,
            Phase::ContentTransfer => self.content_transfer_ms,
            Phase::Total => Some(self.total_ms),
        }
    }

    /// Sum of whatever phases are populated.
    pub fn summed_phases(&self) -> f64 {
        Phase::MEASURED
            .iter()
            .filter_map(|phase| self.phase_ms(*phase))
            .sum()
    }

    /// Fold several results of the same endpoint into a mean result for
    /// display. Metadata comes from the first result; each phase averages
    /// over the results where it is present.
    pub fn averaged(results: &[TraceResult]) -> Option<TraceResult> {
        let first = results.first()?;
        let mut folded = TraceResult {
            url: first.url.clone(),
            method: first.method.clone(),
            label: first.label.clone(),
            timestamp: first.timestamp,
            dns_ms: mean_of(results, Phase::Dns),
            tcp_connect_ms: mean_of(results, Phase::TcpConnect),
            tls_handshake_ms: mean_of(results, Phase::TlsHandshake),
            server_processing_ms: mean_of(results, Phase::ServerProcessing),
            content_transfer_ms: mean_of(results, Phase::ContentTransfer),
            total_ms: 0.0,
            status_code: first.status_code,
            response_size: results.last().and_then(|r| r.response_size),
            ip_address: first.ip_address.clone(),
            tls_version: first.tls_version.clone(),
            error: None,
            headers_received: None,
            body_preview: None,
        };
        folded.total_ms = folded.summed_phases();
        Some(folded)
    }
}

fn mean_of(results: &[TraceResult], phase: Phase) -> Option<f64> {
    let values: Vec<f64> = results.iter().filter_map(|r| r.phase_ms(phase)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(total_parts: [f64; 5]) -> TraceResult {
        let [dns, tcp, tls, server, transfer] = total_parts;
        let mut result = TraceResult {
            url: "https://api.example.com/".into(),
            method: "GET".into(),
            label: None,
            timestamp: Utc::now(),
            dns_ms: Some(dns),
            tcp_connect_ms: Some(tcp),
            tls_handshake_ms: Some(tls),
            server_processing_ms: Some(server),
            content_transfer_ms: Some(transfer),
            total_ms: 0.0,
            status_code: Some(200),
            response_size: Some(128),
            ip_address: Some("93.184.216.34".into()),
            tls_version: Some("TLSv1.3".into()),
            error: None,
            headers_received: None,
            body_preview: None,
        };
        result.total_ms = result.summed_phases();
        result
    }

    #[test]
    fn total_is_the_sum_of_populated_phases() {
        let result = sample([4.0, 11.0, 23.0, 180.0, 42.0]);
        assert!((result.total_ms - 260.0).abs() < 1e-6);
        assert!(result.total_ms >= result.server_processing_ms.unwrap());
    }

    #[test]
    fn absent_phases_do_not_contribute_to_total() {
        let mut result = sample([4.0, 11.0, 0.0, 0.0, 0.0]);
        result.tls_handshake_ms = None;
        result.server_processing_ms = None;
        result.content_transfer_ms = None;
        assert!((result.summed_phases() - 15.0).abs() < 1e-6);
    }

    #[test]
    fn averaged_folds_phase_means_and_recomputes_total() {
        let a = sample([2.0, 10.0, 20.0, 100.0, 8.0]);
        let b = sample([4.0, 14.0, 24.0, 300.0, 18.0]);
        let avg = TraceResult::averaged(&[a, b]).unwrap();
        assert_eq!(avg.dns_ms, Some(3.0));
        assert_eq!(avg.server_processing_ms, Some(200.0));
        assert!((avg.total_ms - avg.summed_phases()).abs() < 1e-6);
    }

    #[test]
    fn averaged_of_nothing_is_none() {
        assert!(TraceResult::averaged(&[]).is_none());
    }

    #[test]
    fn wire_field_names_are_stable() {
        let json = serde_json::to_value(sample([1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        for field in [
            "url",
            "method",
            "timestamp",
            "dns_ms",
            "tcp_connect_ms",
            "tls_handshake_ms",
            "server_processing_ms",
            "content_transfer_ms",
            "total_ms",
            "status_code",
            "response_size",
            "ip_address",
            "tls_version",
            "error",
        ] {
            assert!(json.get(field).is_some(), "missing wire field {field}");
        }
    }
}
