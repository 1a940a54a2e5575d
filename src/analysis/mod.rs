//! Trend and regression analysis over stored trace results.

pub mod regression;
pub mod stats;

pub use regression::{detect_regressions, RegressionConfig, RegressionFinding, Severity};
pub use stats::{compute_stats, EndpointStats};
