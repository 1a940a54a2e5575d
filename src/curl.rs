//! cURL command import.
//!
//! Turns a pasted `curl ...` invocation into a [`TraceRequest`] so existing
//! commands can be traced without retyping. Only the flags that affect the
//! request are honored; display-only flags are skipped.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use crate::tracer::{normalize_url, TraceRequest};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurlParseError {
    #[error("no URL found in curl command")]
    MissingUrl,
}

/// Parse a curl command line into a trace request.
pub fn parse_curl(command: &str) -> Result<TraceRequest, CurlParseError> {
    let mut text = command.trim();
    if let Some(rest) = text.strip_prefix("curl") {
        text = rest;
    }
    let joined = text.replace("\\\r\n", " ").replace("\\\n", " ");
    let tokens = tokenize(&joined);

    let mut url: Option<String> = None;
    let mut method: Option<String> = None;
    let mut request = TraceRequest::new("https://placeholder.invalid/");

    let mut iter = tokens.iter().peekable();
    while let Some(token) = iter.next() {
        match token.as_str() {
            "-X" | "--request" => {
                if let Some(value) = iter.next() {
                    method = Some(value.to_ascii_uppercase());
                }
            }
            "-H" | "--header" => {
                if let Some(value) = iter.next() {
                    if let Some((name, v)) = value.split_once(':') {
                        request.headers.insert(name.trim().to_string(), v.trim().to_string());
                    }
                }
            }
            "-d" | "--data" | "--data-raw" | "--data-binary" => {
                if let Some(value) = iter.next() {
                    request.body = Some(value.clone().into_bytes());
                    if method.is_none() {
                        method = Some("POST".to_string());
                    }
                }
            }
            "-u" | "--user" => {
                if let Some(value) = iter.next() {
                    let encoded = BASE64.encode(value.as_bytes());
                    request.headers.insert("Authorization".into(), format!("Basic {encoded}"));
                }
            }
            "-A" | "--user-agent" => {
                if let Some(value) = iter.next() {
                    request.headers.insert("User-Agent".into(), value.clone());
                }
            }
            "-k" | "--insecure" => {
                request.insecure = true;
            }
            // Behavior flags without a request-side effect.
            "-s" | "--silent" | "-v" | "--verbose" | "-L" | "--location" | "-i"
            | "--include" | "--compressed" => {}
            // Flags that consume a value we do not use.
            "-o" | "--output" | "-w" | "--write-out" | "--connect-timeout" | "--max-time" => {
                iter.next();
            }
            other => {
                if url.is_none() && !other.starts_with('-') {
                    url = Some(other.to_string());
                }
            }
        }
    }

    let url = url.ok_or(CurlParseError::MissingUrl)?;
    request.url = normalize_url(&url);
    request.method = method.unwrap_or_else(|| "GET".to_string());
    Ok(request)
}

/// Split a command line on whitespace, honoring single and double quotes.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else if c == '\\' && q == '"' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
