//! TracePulse: phase-resolved HTTP latency tracing library.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI / dashboard API
//!          │
//!          ▼
//!   ┌─────────────┐     ┌──────────────┐     ┌───────────────┐
//!   │   tracer    │────▶│    store     │────▶│   analysis    │
//!   │  (recorder) │     │   (sqlite)   │     │ stats + regr. │
//!   └─────────────┘     └──────────────┘     └───────────────┘
//! ```
//!
//! The tracer drives one HTTP request over raw tokio sockets, timing DNS
//! resolution, TCP connect, TLS handshake, server processing (TTFB), and
//! content transfer independently. Results are appended to the store; the
//! analysis layer derives endpoint statistics and regression findings from
//! the stored history on demand.

// Core subsystems
pub mod analysis;
pub mod store;
pub mod tracer;

// Surfaces
pub mod cli;
pub mod dashboard;

// Cross-cutting concerns
pub mod config;
pub mod curl;
pub mod export;

pub use analysis::{compute_stats, detect_regressions, EndpointStats, RegressionConfig};
pub use config::AppConfig;
pub use store::{SqliteStore, TraceStore};
pub use tracer::{Recorder, TraceRequest, TraceResult};
