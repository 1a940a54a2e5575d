//! The phase-resolved trace recorder.
//!
//! # Responsibilities
//! - Drive one HTTP request over a raw tokio transport as a linear state
//!   machine: RESOLVING → CONNECTING → TLS_HANDSHAKE → SENDING →
//!   AWAITING_FIRST_BYTE → RECEIVING_BODY
//! - Time each phase against the injected monotonic clock
//! - Enforce one cumulative timeout across all phases
//! - Classify failures at the point they occur and preserve partial timings
//!
//! One call is exactly one attempt: no retries, no redirect following, no
//! persistence. Repetition and storage belong to the caller.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::time::Duration;

use chrono::Utc;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio_rustls::client::TlsStream;

use crate::tracer::clock::{Clock, MonotonicClock, Stopwatch};
use crate::tracer::error::TraceError;
use crate::tracer::phase::Phase;
use crate::tracer::request::{normalize_url, RequestError, Target, TraceRequest};
use crate::tracer::response::{
    chunked_body_size, find_header_end, BodyFraming, ResponseHead,
};
use crate::tracer::result::{TraceResult, BODY_PREVIEW_LIMIT};
use crate::tracer::tls;

const READ_BUF_SIZE: usize = 16 * 1024;

/// Executes traces against an injected monotonic clock.
pub struct Recorder<C: Clock = MonotonicClock> {
    clock: C,
}

impl Recorder<MonotonicClock> {
    pub fn new() -> Self {
        Self { clock: MonotonicClock }
    }
}

impl Default for Recorder<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Recorder<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Perform one trace. Network failures land in the result's `error`
    /// field; only caller misuse (a URL that cannot be parsed) is an `Err`.
    pub async fn trace(&self, request: &TraceRequest) -> Result<TraceResult, RequestError> {
        let target = Target::parse(&request.url)?;
        let started_at = Utc::now();
        let mut phases = PhaseTimings::default();
        let mut meta = ResponseMeta::default();

        let outcome = self.run(request, &target, &mut phases, &mut meta).await;
        if let Err(err) = &outcome {
            tracing::debug!(url = %request.url, error = %err, "trace failed");
        }

        Ok(assemble(request, started_at, phases, meta, outcome.err()))
    }

    async fn run(
        &self,
        request: &TraceRequest,
        target: &Target,
        phases: &mut PhaseTimings,
        meta: &mut ResponseMeta,
    ) -> Result<(), TraceError> {
        let mut watch = Stopwatch::start(&self.clock);
        let budget = request.timeout;

        // RESOLVING: first returned address, deterministically, so repeated
        // traces of one endpoint stay comparable.
        let host = target.host.clone();
        let addrs = bounded(Phase::Dns, budget, watch.elapsed(), async {
            lookup_host((target.host.as_str(), target.port))
                .await
                .map_err(|e| TraceError::Resolution { host: host.clone(), message: e.to_string() })
        })
        .await?;
        let addr = addrs.into_iter().next().ok_or_else(|| TraceError::Resolution {
            host: target.host.clone(),
            message: "resolver returned no addresses".into(),
        })?;
        phases.dns = Some(watch.lap_ms());
        meta.ip_address = Some(addr.ip().to_string());

        // CONNECTING
        let tcp = bounded(Phase::TcpConnect, budget, watch.elapsed(), async {
            TcpStream::connect(addr).await.map_err(|e| match e.kind() {
                io::ErrorKind::ConnectionRefused => {
                    TraceError::ConnectionRefused { addr: addr.to_string() }
                }
                _ => TraceError::Transport { phase: Phase::TcpConnect, message: e.to_string() },
            })
        })
        .await?;
        phases.tcp_connect = Some(watch.lap_ms());

        // TLS_HANDSHAKE: skipped for http, which records a zero-duration
        // phase rather than an absent one.
        let mut conn = if target.secure {
            let connector = tls::connector(request.insecure);
            let server_name = ServerName::try_from(target.host.clone()).map_err(|e| {
                TraceError::Handshake { host: target.host.clone(), message: e.to_string() }
            })?;
            let host = target.host.clone();
            let stream = bounded(Phase::TlsHandshake, budget, watch.elapsed(), async {
                connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| TraceError::Handshake { host: host.clone(), message: e.to_string() })
            })
            .await?;
            phases.tls_handshake = Some(watch.lap_ms());
            meta.tls_version = stream.get_ref().1.protocol_version().map(tls::protocol_label);
            Conn::Tls(Box::new(stream))
        } else {
            phases.tls_handshake = Some(0.0);
            Conn::Plain(tcp)
        };

        // SENDING: not a timed phase; the TTFB window opens at the flush.
        let request_bytes = request.serialize(target);
        bounded(Phase::ServerProcessing, budget, watch.elapsed(), async {
            conn.write_all(&request_bytes).await.map_err(|e| TraceError::Transport {
                phase: Phase::ServerProcessing,
                message: e.to_string(),
            })?;
            conn.flush().await.map_err(|e| TraceError::Transport {
                phase: Phase::ServerProcessing,
                message: e.to_string(),
            })
        })
        .await?;
        watch.mark();

        // AWAITING_FIRST_BYTE
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut data: Vec<u8> = Vec::new();
        let n = bounded(Phase::ServerProcessing, budget, watch.elapsed(), async {
            conn.read(&mut buf).await.map_err(|e| TraceError::Transport {
                phase: Phase::ServerProcessing,
                message: e.to_string(),
            })
        })
        .await?;
        if n == 0 {
            return Err(TraceError::Transport {
                phase: Phase::ServerProcessing,
                message: "connection closed before the first response byte".into(),
            });
        }
        phases.server_processing = Some(watch.lap_ms());
        data.extend_from_slice(&buf[..n]);

        // RECEIVING_BODY: read until the framing terminator or close.
        let mut framing: Option<BodyFraming> = None;
        loop {
            if let Some(head_end) = find_header_end(&data) {
                if framing.is_none() {
                    if let Some(head) = ResponseHead::parse(&data[..head_end]) {
                        framing = Some(BodyFraming::from_head(&head));
                    }
                }
                if let Some(framing) = framing {
                    if framing.is_complete(&data[head_end + 4..]) {
                        break;
                    }
                }
            }
            let n = bounded(Phase::ContentTransfer, budget, watch.elapsed(), async {
                conn.read(&mut buf).await.map_err(|e| TraceError::Transport {
                    phase: Phase::ContentTransfer,
                    message: e.to_string(),
                })
            })
            .await?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
        }
        phases.content_transfer = Some(watch.lap_ms());

        // Response metadata for the result.
        let head_end = find_header_end(&data).ok_or_else(|| TraceError::Transport {
            phase: Phase::ContentTransfer,
            message: "response ended before the header terminator".into(),
        })?;
        let head = ResponseHead::parse(&data[..head_end]).ok_or_else(|| TraceError::Transport {
            phase: Phase::ContentTransfer,
            message: "malformed response status line".into(),
        })?;
        let body = &data[head_end + 4..];
        meta.response_size = Some(match framing {
            Some(BodyFraming::Chunked) => chunked_body_size(body),
            _ => body.len() as u64,
        });
        meta.status_code = Some(head.status_code);
        let preview_end = body.len().min(BODY_PREVIEW_LIMIT);
        if preview_end > 0 {
            meta.body_preview = Some(String::from_utf8_lossy(&body[..preview_end]).into_owned());
        }
        meta.headers = Some(head.headers);

        Ok(())
    }
}

/// Per-phase durations accumulated as the state machine advances.
#[derive(Debug, Default)]
struct PhaseTimings {
    dns: Option<f64>,
    tcp_connect: Option<f64>,
    tls_handshake: Option<f64>,
    server_processing: Option<f64>,
    content_transfer: Option<f64>,
}

#[derive(Debug, Default)]
struct ResponseMeta {
    status_code: Option<u16>,
    response_size: Option<u64>,
    ip_address: Option<String>,
    tls_version: Option<String>,
    headers: Option<BTreeMap<String, String>>,
    body_preview: Option<String>,
}

/// Run a phase step under whatever remains of the cumulative budget.
async fn bounded<T, F>(
    phase: Phase,
    budget: Duration,
    elapsed: Duration,
    fut: F,
) -> Result<T, TraceError>
where
    F: Future<Output = Result<T, TraceError>>,
{
    let remaining = budget.saturating_sub(elapsed);
    if remaining.is_zero() {
        return Err(TraceError::Timeout { phase });
    }
    match tokio::time::timeout(remaining, fut).await {
        Ok(result) => result,
        Err(_) => Err(TraceError::Timeout { phase }),
    }
}

fn assemble(
    request: &TraceRequest,
    started_at: chrono::DateTime<Utc>,
    phases: PhaseTimings,
    meta: ResponseMeta,
    error: Option<TraceError>,
) -> TraceResult {
    let failed = error.is_some();
    let mut result = TraceResult {
        url: request.url.clone(),
        method: request.method.clone(),
        label: request.label.clone(),
        timestamp: started_at,
        dns_ms: phases.dns,
        tcp_connect_ms: phases.tcp_connect,
        tls_handshake_ms: phases.tls_handshake,
        server_processing_ms: phases.server_processing,
        content_transfer_ms: phases.content_transfer,
        total_ms: 0.0,
        // Response metadata is a success-only contract.
        status_code: if failed { None } else { meta.status_code },
        response_size: if failed { None } else { meta.response_size },
        ip_address: if failed { None } else { meta.ip_address },
        tls_version: if failed { None } else { meta.tls_version },
        error: error.as_ref().map(Into::into),
        headers_received: if failed { None } else { meta.headers },
        body_preview: if failed { None } else { meta.body_preview },
    };
    result.total_ms = result.summed_phases();
    result
}

/// Transport after connection setup: plain TCP or TLS over TCP.
enum Conn {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Conn {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Conn::Plain(s) => s.write_all(buf).await,
            Conn::Tls(s) => s.write_all(buf).await,
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        match self {
            Conn::Plain(s) => s.flush().await,
            Conn::Tls(s) => s.flush().await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Conn::Plain(s) => s.read(buf).await,
            Conn::Tls(s) => s.read(buf).await,
        }
    }
}

/// Trace one endpoint `count` times, sequentially, on one recorder.
///
/// Sequential on purpose: overlapping repeats of the same endpoint would
/// contend for bandwidth and skew the very phases being measured.
pub async fn trace_many(
    request: &TraceRequest,
    count: usize,
) -> Result<Vec<TraceResult>, RequestError> {
    Target::parse(&request.url)?;
    let recorder = Recorder::new();
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        results.push(recorder.trace(request).await?);
    }
    Ok(results)
}

/// Trace several endpoints in parallel, `count` repeats each.
///
/// Each URL gets its own task, recorder, and connections; results are only
/// aggregated after every task has finished.
pub async fn trace_urls(
    base: &TraceRequest,
    urls: &[String],
    count: usize,
) -> Result<BTreeMap<String, Vec<TraceResult>>, RequestError> {
    let normalized: Vec<String> = urls.iter().map(|u| normalize_url(u)).collect();
    for url in &normalized {
        Target::parse(url)?;
    }

    let mut handles = Vec::with_capacity(normalized.len());
    for url in normalized {
        let mut request = base.clone();
        request.url = url.clone();
        handles.push((
            url,
            tokio::spawn(async move {
                let recorder = Recorder::new();
                let mut results = Vec::with_capacity(count);
                for _ in 0..count {
                    match recorder.trace(&request).await {
                        Ok(result) => results.push(result),
                        Err(_) => break,
                    }
                }
                results
            }),
        ));
    }

    let mut grouped = BTreeMap::new();
    for (url, handle) in handles {
        match handle.await {
            Ok(results) => {
                grouped.insert(url, results);
            }
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "trace task aborted");
                grouped.insert(url, Vec::new());
            }
        }
    }
    Ok(grouped)
}
