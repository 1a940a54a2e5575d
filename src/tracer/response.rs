//! HTTP/1.1 response head parsing and body framing.
//!
//! The receive loop accumulates raw bytes; this module decides when the body
//! is complete (Content-Length, chunked terminator, or connection close) and
//! extracts the status line and headers for the trace result.

use std::collections::BTreeMap;

/// Parsed status line and headers. Header names are lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
}

impl ResponseHead {
    /// Parse the head section (everything before the `\r\n\r\n` terminator).
    pub fn parse(head: &[u8]) -> Option<ResponseHead> {
        let text = String::from_utf8_lossy(head);
        let mut lines = text.split("\r\n");
        let status_line = lines.next()?;
        let status_code: u16 = status_line.split(' ').nth(1)?.parse().ok()?;

        let mut headers = BTreeMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        Some(ResponseHead { status_code, headers })
    }
}

/// Offset of the `\r\n\r\n` head terminator, if present.
pub fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// How the response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    ContentLength(u64),
    Chunked,
    UntilClose,
}

impl BodyFraming {
    pub fn from_head(head: &ResponseHead) -> BodyFraming {
        if head
            .headers
            .get("transfer-encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
        {
            return BodyFraming::Chunked;
        }
        if let Some(length) = head.headers.get("content-length").and_then(|v| v.parse().ok()) {
            return BodyFraming::ContentLength(length);
        }
        BodyFraming::UntilClose
    }

    /// Whether the accumulated body bytes form a complete response body.
    pub fn is_complete(&self, body: &[u8]) -> bool {
        match self {
            BodyFraming::ContentLength(expected) => body.len() as u64 >= *expected,
            BodyFraming::Chunked => body.ends_with(b"0\r\n\r\n"),
            BodyFraming::UntilClose => false,
        }
    }
}

/// Decoded payload size of a chunked body (chunk data only, no framing).
pub fn chunked_body_size(body: &[u8]) -> u64 {
    let mut total: u64 = 0;
    let mut rest = body;
    loop {
        let Some(line_end) = rest.windows(2).position(|w| w == b"\r\n") else {
            break;
        };
        let size_line = String::from_utf8_lossy(&rest[..line_end]);
        // Chunk extensions after ';' are ignored per RFC 9112.
        let size_field = size_line.split(';').next().unwrap_or("").trim();
        let Ok(size) = u64::from_str_radix(size_field, 16) else {
            break;
        };
        if size == 0 {
            break;
        }
        total += size;
        let skip = line_end + 2 + size as usize + 2;
        if skip > rest.len() {
            break;
        }
        rest = &rest[skip..];
    }
    total
}
