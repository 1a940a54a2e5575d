//! Trace request model and raw HTTP/1.1 serialization.
//!
//! The tracer writes requests onto the socket itself; there is no HTTP
//! client in the timing path.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Default User-Agent sent when the caller does not override it.
pub const USER_AGENT: &str = concat!("tracepulse/", env!("CARGO_PKG_VERSION"));

/// Caller misuse detected before any phase starts.
///
/// Distinct from [`TraceError`](crate::tracer::TraceError): an invalid
/// request never produces a `TraceResult`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("unsupported scheme '{scheme}' (expected http or https)")]
    UnsupportedScheme { scheme: String },

    #[error("URL '{url}' has no host")]
    MissingHost { url: String },
}

/// One trace invocation's inputs.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Travels as a UTF-8 string on the dashboard API.
    #[serde(default, deserialize_with = "body_bytes")]
    pub body: Option<Vec<u8>>,
    #[serde(
        default = "default_timeout",
        rename = "timeout_seconds",
        deserialize_with = "timeout_secs"
    )]
    pub timeout: Duration,
    #[serde(default)]
    pub label: Option<String>,
    /// Skip certificate verification for hosts with broken chains.
    #[serde(default)]
    pub insecure: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Serde shim: `timeout_seconds` travels as a float on the dashboard API.
fn timeout_secs<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    use serde::Deserialize;
    let secs = f64::deserialize(d)?;
    Ok(Duration::from_secs_f64(secs.max(0.0)))
}

fn body_bytes<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
    use serde::Deserialize;
    Ok(Option::<String>::deserialize(d)?.map(String::into_bytes))
}

impl TraceRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: normalize_url(&url.into()),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
            timeout: default_timeout(),
            label: None,
            insecure: false,
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Serialize the request line, headers, and body as HTTP/1.1 bytes.
    ///
    /// Sends `Connection: close` unless the caller overrides it, so body
    /// framing always has a deterministic terminator.
    pub fn serialize(&self, target: &Target) -> Vec<u8> {
        let mut headers: Vec<(String, String)> = vec![
            ("Host".into(), target.host_header()),
            ("User-Agent".into(), USER_AGENT.into()),
            ("Accept".into(), "*/*".into()),
            ("Connection".into(), "close".into()),
        ];
        for (name, value) in &self.headers {
            match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                Some(slot) => slot.1 = value.clone(),
                None => headers.push((name.clone(), value.clone())),
            }
        }
        if let Some(body) = &self.body {
            if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("content-length")) {
                headers.push(("Content-Length".into(), body.len().to_string()));
            }
        }

        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(
            format!("{} {} HTTP/1.1\r\n", self.method, target.path_and_query).as_bytes(),
        );
        for (name, value) in &headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

/// Prefix bare hostnames with `https://`, matching the CLI and dashboard.
pub fn normalize_url(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

/// Parsed connection target for one trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub secure: bool,
    pub host: String,
    pub port: u16,
    pub path_and_query: String,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Target, RequestError> {
        let url = Url::parse(raw).map_err(|e| RequestError::InvalidUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })?;
        let secure = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(RequestError::UnsupportedScheme { scheme: other.to_string() });
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| RequestError::MissingHost { url: raw.to_string() })?
            .to_string();
        let port = url.port().unwrap_or(if secure { 443 } else { 80 });
        let mut path_and_query = if url.path().is_empty() { "/".to_string() } else { url.path().to_string() };
        if let Some(query) = url.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }
        Ok(Target { secure, host, port, path_and_query })
    }

    /// Host header value; the port rides along only when nonstandard.
    pub fn host_header(&self) -> String {
        let standard = if self.secure { 443 } else { 80 };
        if self.port == standard {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
