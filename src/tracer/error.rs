//! Trace failure taxonomy.
//!
//! # Responsibilities
//! - Classify transport failures at the point they occur
//! - Carry the phase that was active when the trace failed
//! - Provide the structured wire form stored on a `TraceResult`
//!
//! Failures are never inferred from error text after the fact; each variant
//! is constructed by the transport code that observed it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracer::phase::Phase;

/// Failure raised by the recorder while driving a trace.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraceError {
    /// Hostname could not be resolved to any address.
    #[error("DNS resolution failed for {host}: {message}")]
    Resolution { host: String, message: String },

    /// Transport-layer connect was rejected.
    #[error("connection refused by {addr}")]
    ConnectionRefused { addr: String },

    /// TLS negotiation failed.
    #[error("TLS handshake with {host} failed: {message}")]
    Handshake { host: String, message: String },

    /// The cumulative trace budget ran out.
    #[error("trace timeout exceeded during {phase}")]
    Timeout { phase: Phase },

    /// Any other I/O failure during send or receive.
    #[error("transport error during {phase}: {message}")]
    Transport { phase: Phase, message: String },
}

impl TraceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraceError::Resolution { .. } => ErrorKind::ResolutionFailure,
            TraceError::ConnectionRefused { .. } => ErrorKind::ConnectionRefused,
            TraceError::Handshake { .. } => ErrorKind::HandshakeFailure,
            TraceError::Timeout { .. } => ErrorKind::Timeout,
            TraceError::Transport { .. } => ErrorKind::TransportError,
        }
    }

    /// The phase that was active when the failure fired.
    pub fn phase(&self) -> Phase {
        match self {
            TraceError::Resolution { .. } => Phase::Dns,
            TraceError::ConnectionRefused { .. } => Phase::TcpConnect,
            TraceError::Handshake { .. } => Phase::TlsHandshake,
            TraceError::Timeout { phase } => *phase,
            TraceError::Transport { phase, .. } => *phase,
        }
    }
}

/// Closed set of failure kinds, stable on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResolutionFailure,
    ConnectionRefused,
    HandshakeFailure,
    Timeout,
    TransportError,
}

/// Structured failure as persisted and served: kind, active phase, message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFailure {
    pub kind: ErrorKind,
    pub phase: Phase,
    pub message: String,
}

impl From<&TraceError> for TraceFailure {
    fn from(err: &TraceError) -> Self {
        Self {
            kind: err.kind(),
            phase: err.phase(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_carries_the_active_phase() {
        let err = TraceError::Timeout { phase: Phase::ContentTransfer };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.phase(), Phase::ContentTransfer);
    }

    #[test]
    fn wire_form_round_trips() {
        let failure = TraceFailure::from(&TraceError::Resolution {
            host: "api.example.com".into(),
            message: "no such host".into(),
        });
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"resolution_failure\""));
        let back: TraceFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, failure);
    }
}
