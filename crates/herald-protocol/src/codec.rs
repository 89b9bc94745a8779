//! HTTP/1.1 framing for the serving side of a JSON-RPC call.
//!
//! Each call arrives as a header block terminated by a blank line followed by
//! a `Content-Length` body, and is answered with one `Connection: close`
//! response. Only that subset is understood: no chunked encoding, no
//! pipelining. Outbound calls go through an HTTP client instead.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::rpc::Response;

/// Maximum size of the start line plus headers.
pub const MAX_HEAD_SIZE: usize = 8 * 1024;

/// Default maximum body size (4 MiB).
pub const MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Header block exceeds [`MAX_HEAD_SIZE`].
    #[error("Header block exceeds maximum {MAX_HEAD_SIZE}")]
    HeadTooLarge,

    /// Declared body exceeds the allowed size.
    #[error("Body size {size} exceeds maximum {max}")]
    BodyTooLarge { size: usize, max: usize },

    /// Start line could not be parsed.
    #[error("Malformed start line: {0}")]
    MalformedStartLine(String),

    /// Header line without a colon.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// `Content-Length` is not a number.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// Header block is not UTF-8.
    #[error("Header block is not valid UTF-8")]
    InvalidUtf8,

    /// Peer closed the connection mid-message.
    #[error("Connection closed before the message was complete")]
    Incomplete,

    /// JSON-RPC body could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

struct Head {
    start_line: String,
    headers: Vec<(String, String)>,
    content_length: Option<usize>,
}

/// Locate the blank line ending the header block.
///
/// Returns the header length and the length of the terminator. Bare `\n`
/// line endings are tolerated.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf[i + 1..].starts_with(b"\r\n") {
                return Some((i + 1, 2));
            }
            if buf[i + 1..].starts_with(b"\n") {
                return Some((i + 1, 1));
            }
        }
        i += 1;
    }
    None
}

fn parse_head(raw: &[u8], max_body: usize) -> Result<Head, ProtocolError> {
    let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));

    let start_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ProtocolError::MalformedStartLine(String::new()))?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = None;
    for line in lines.filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("content-length") {
            let length: usize = value
                .parse()
                .map_err(|_| ProtocolError::InvalidContentLength(value.to_string()))?;
            if length > max_body {
                return Err(ProtocolError::BodyTooLarge {
                    size: length,
                    max: max_body,
                });
            }
            content_length = Some(length);
        }
        headers.push((name.to_string(), value.to_string()));
    }

    Ok(Head {
        start_line,
        headers,
        content_length,
    })
}

/// Split a complete head + body off the front of `buf`.
///
/// `eof` signals that no more bytes will arrive, so a short buffer is an
/// error rather than a request for more data.
fn split_message(
    buf: &mut BytesMut,
    eof: bool,
    max_body: usize,
) -> Result<Option<(Head, Bytes)>, ProtocolError> {
    let Some((head_len, sep_len)) = find_head_end(buf) else {
        if buf.len() > MAX_HEAD_SIZE {
            return Err(ProtocolError::HeadTooLarge);
        }
        if eof && !buf.is_empty() {
            return Err(ProtocolError::Incomplete);
        }
        return Ok(None);
    };

    if head_len > MAX_HEAD_SIZE {
        return Err(ProtocolError::HeadTooLarge);
    }

    let head = parse_head(&buf[..head_len], max_body)?;
    let body_start = head_len + sep_len;
    let available = buf.len() - body_start;

    let body_len = match head.content_length {
        Some(length) if available >= length => length,
        Some(_) if eof => return Err(ProtocolError::Incomplete),
        Some(_) => return Ok(None),
        None => 0,
    };

    let mut message = buf.split_to(body_start + body_len);
    let body = message.split_off(body_start).freeze();
    Ok(Some((head, body)))
}

/// Try to decode a request from a buffer, advancing it if successful.
///
/// Returns `Ok(Some(request))` if a complete request was decoded,
/// `Ok(None)` if more data is needed, or `Err` on a framing error. A request
/// without `Content-Length` has an empty body.
///
/// # Errors
///
/// Returns an error if the head is malformed or a size limit is exceeded.
pub fn decode_request_from(
    buf: &mut BytesMut,
    eof: bool,
    max_body: usize,
) -> Result<Option<HttpRequest>, ProtocolError> {
    let Some((head, body)) = split_message(buf, eof, max_body)? else {
        return Ok(None);
    };

    let mut parts = head.start_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ProtocolError::MalformedStartLine(head.start_line.clone()));
    };
    if !version.starts_with("HTTP/") {
        return Err(ProtocolError::MalformedStartLine(head.start_line.clone()));
    }

    Ok(Some(HttpRequest {
        method: method.to_string(),
        target: target.to_string(),
        headers: head.headers,
        body,
    }))
}

/// Encode a response with the given status line and body.
#[must_use]
pub fn encode_response(status: u16, reason: &str, content_type: &str, body: &[u8]) -> Bytes {
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let mut buf = BytesMut::with_capacity(head.len() + body.len());
    buf.put_slice(head.as_bytes());
    buf.put_slice(body);
    buf.freeze()
}

/// Encode a JSON-RPC response as `200 OK`.
///
/// # Errors
///
/// Returns an error if the response cannot be serialized.
pub fn encode_rpc_response(response: &Response) -> Result<Bytes, ProtocolError> {
    let body = response.to_vec()?;
    Ok(encode_response(200, "OK", "application/json", &body))
}
