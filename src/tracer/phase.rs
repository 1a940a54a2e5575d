//! Request lifecycle phase vocabulary.

use serde::{Deserialize, Serialize};

/// One contiguous, independently timed segment of the request lifecycle.
///
/// `Total` is not measured on its own; it names the summed series the
/// regression detector compares alongside the five measured phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Dns,
    TcpConnect,
    TlsHandshake,
    ServerProcessing,
    ContentTransfer,
    Total,
}

impl Phase {
    /// The five measured phases, in lifecycle order.
    pub const MEASURED: [Phase; 5] = [
        Phase::Dns,
        Phase::TcpConnect,
        Phase::TlsHandshake,
        Phase::ServerProcessing,
        Phase::ContentTransfer,
    ];

    /// Series compared by the regression detector: measured phases plus total.
    pub const SERIES: [Phase; 6] = [
        Phase::Dns,
        Phase::TcpConnect,
        Phase::TlsHandshake,
        Phase::ServerProcessing,
        Phase::ContentTransfer,
        Phase::Total,
    ];

    /// Stable snake_case key, matching the wire field names.
    pub fn key(&self) -> &'static str {
        match self {
            Phase::Dns => "dns",
            Phase::TcpConnect => "tcp_connect",
            Phase::TlsHandshake => "tls_handshake",
            Phase::ServerProcessing => "server_processing",
            Phase::ContentTransfer => "content_transfer",
            Phase::Total => "total",
        }
    }

    /// Human-readable label for rendering.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Dns => "DNS Lookup",
            Phase::TcpConnect => "TCP Connect",
            Phase::TlsHandshake => "TLS Handshake",
            Phase::ServerProcessing => "Server Processing",
            Phase::ContentTransfer => "Content Transfer",
            Phase::Total => "Total Latency",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_wire_names() {
        assert_eq!(Phase::ServerProcessing.key(), "server_processing");
        assert_eq!(Phase::Total.to_string(), "total");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Phase::TlsHandshake).unwrap();
        assert_eq!(json, "\"tls_handshake\"");
        let back: Phase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Phase::TlsHandshake);
    }
}
