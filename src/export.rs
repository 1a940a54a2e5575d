//! Export stored traces as CSV or JSON.

use chrono::SecondsFormat;

use crate::tracer::TraceResult;

const CSV_COLUMNS: [&str; 15] = [
    "url",
    "method",
    "status_code",
    "response_size",
    "ip_address",
    "tls_version",
    "dns_ms",
    "tcp_connect_ms",
    "tls_handshake_ms",
    "server_processing_ms",
    "content_transfer_ms",
    "total_ms",
    "error",
    "label",
    "timestamp",
];

/// Render traces as CSV with a fixed column order.
pub fn to_csv(traces: &[TraceResult]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_COLUMNS.join(","));
    out.push('\n');

    for trace in traces {
        let fields = [
            csv_escape(&trace.url),
            csv_escape(&trace.method),
            trace.status_code.map(|v| v.to_string()).unwrap_or_default(),
            trace.response_size.map(|v| v.to_string()).unwrap_or_default(),
            trace.ip_address.clone().unwrap_or_default(),
            trace.tls_version.clone().unwrap_or_default(),
            ms_field(trace.dns_ms),
            ms_field(trace.tcp_connect_ms),
            ms_field(trace.tls_handshake_ms),
            ms_field(trace.server_processing_ms),
            ms_field(trace.content_transfer_ms),
            format!("{:.2}", trace.total_ms),
            trace.error.as_ref().map(|e| csv_escape(&e.message)).unwrap_or_default(),
            trace.label.as_deref().map(csv_escape).unwrap_or_default(),
            trace.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Render traces as pretty-printed JSON.
pub fn to_json(traces: &[TraceResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(traces)
}

fn ms_field(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
