//! Phase-resolved HTTP tracing over a raw tokio transport.
//!
//! # Responsibilities
//! - Execute one HTTP request with each lifecycle phase timed independently
//! - Classify transport failures into a closed taxonomy
//! - Produce the immutable `TraceResult` record

pub mod clock;
pub mod error;
pub mod phase;
pub mod recorder;
pub mod request;
pub mod response;
pub mod result;
pub mod tls;

pub use clock::{Clock, MonotonicClock};
pub use error::{ErrorKind, TraceError, TraceFailure};
pub use phase::Phase;
pub use recorder::{trace_many, trace_urls, Recorder};
pub use request::{normalize_url, RequestError, TraceRequest};
pub use result::TraceResult;
