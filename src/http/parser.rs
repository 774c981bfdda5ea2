//! HTTP/1.1 request parsing.
//!
//! Parsing is driven straight off a [`ByteReader`], one message at a time:
//! request-line, header fields up to the empty line, then a body framed by
//! `Content-Length` or chunked transfer coding. Framing must be unambiguous;
//! any header combination that leaves the body length in doubt is rejected
//! instead of guessed at, so trailing bytes of one request can never be read
//! as the start of the next.

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;

use crate::http::error::HttpError;
use crate::http::headers::Headers;
use crate::http::reader::ByteReader;
use crate::http::request::{self, Method, Request, Version};

/// Empty lines tolerated before a request-line.
const MAX_LEADING_EMPTY_LINES: usize = 4;

/// Size limits applied while parsing one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Longest request-line or header line, terminator excluded.
    pub max_line_bytes: usize,
    pub max_headers: usize,
    pub max_body_bytes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 8 * 1024,
            max_headers: 100,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Request-line and header fields of a request whose body is still unread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: Headers,
}

impl RequestHead {
    pub fn expects_continue(&self) -> bool {
        request::expects_continue(self.version, &self.headers)
    }

    pub fn into_request(self, body: Bytes) -> Request {
        Request {
            method: self.method,
            target: self.target,
            version: self.version,
            headers: self.headers,
            body,
        }
    }
}

/// How the request body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Empty,
    Length(usize),
    Chunked,
}

/// Parses one complete request: head, then body.
pub async fn parse_request<S>(
    reader: &mut ByteReader<S>,
    limits: &ParseLimits,
) -> Result<Request, HttpError>
where
    S: AsyncRead + Unpin,
{
    let head = parse_head(reader, limits).await?;
    let framing = body_framing(&head.headers, limits)?;
    let body = read_body(reader, framing, limits).await?;
    Ok(head.into_request(body))
}

/// Reads the request-line and header section.
pub async fn parse_head<S>(
    reader: &mut ByteReader<S>,
    limits: &ParseLimits,
) -> Result<RequestHead, HttpError>
where
    S: AsyncRead + Unpin,
{
    let mut line = read_request_line(reader, limits.max_line_bytes).await?;
    let mut skipped = 0;
    while line.is_empty() {
        skipped += 1;
        if skipped > MAX_LEADING_EMPTY_LINES {
            return Err(HttpError::MalformedRequestLine);
        }
        line = read_request_line(reader, limits.max_line_bytes).await?;
    }
    let (method, target, version) = parse_request_line(&line)?;
    let headers = parse_fields(reader, limits).await?;

    Ok(RequestHead {
        method,
        target,
        version,
        headers,
    })
}

async fn read_request_line<S>(reader: &mut ByteReader<S>, max: usize) -> Result<Bytes, HttpError>
where
    S: AsyncRead + Unpin,
{
    reader.read_line(max).await.map_err(|e| match e {
        HttpError::LineTooLong { limit } => HttpError::UriTooLong { limit },
        other => other,
    })
}

/// Splits `method SP target SP version` on single spaces.
pub fn parse_request_line(line: &[u8]) -> Result<(Method, String, Version), HttpError> {
    let line = std::str::from_utf8(line).map_err(|_| HttpError::MalformedRequestLine)?;
    let mut parts = line.split(' ');

    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::MalformedRequestLine);
    };

    let method = Method::parse(method).ok_or(HttpError::MalformedRequestLine)?;
    if target.is_empty() || target.bytes().any(|b| b.is_ascii_control()) {
        return Err(HttpError::MalformedRequestLine);
    }
    let version = Version::parse(version).ok_or(HttpError::MalformedRequestLine)?;

    Ok((method, target.to_string(), version))
}

/// Reads header lines (or trailer lines) until the empty line.
async fn parse_fields<S>(
    reader: &mut ByteReader<S>,
    limits: &ParseLimits,
) -> Result<Headers, HttpError>
where
    S: AsyncRead + Unpin,
{
    let mut headers = Headers::new();
    loop {
        let line = reader.read_line(limits.max_line_bytes).await?;
        if line.is_empty() {
            return Ok(headers);
        }
        if headers.len() == limits.max_headers {
            return Err(HttpError::TooManyHeaders {
                limit: limits.max_headers,
            });
        }
        let (name, value) = parse_header_line(&line)?;
        headers.append(name, value);
    }
}

/// Splits `name: value` at the first colon and trims the value.
///
/// Obsolete line folding (a line starting with whitespace) is rejected.
pub fn parse_header_line(line: &[u8]) -> Result<(String, String), HttpError> {
    if matches!(line.first(), Some(b' ' | b'\t')) {
        return Err(HttpError::MalformedHeader);
    }
    let line = std::str::from_utf8(line).map_err(|_| HttpError::MalformedHeader)?;
    let (name, value) = line.split_once(':').ok_or(HttpError::MalformedHeader)?;

    if !request::is_token(name) {
        return Err(HttpError::MalformedHeader);
    }
    let value = value.trim_matches([' ', '\t']);
    if value.bytes().any(|b| b != b'\t' && b.is_ascii_control()) {
        return Err(HttpError::MalformedHeader);
    }

    Ok((name.to_string(), value.to_string()))
}

/// Decides how the body is framed from the header fields.
pub fn body_framing(headers: &Headers, limits: &ParseLimits) -> Result<BodyFraming, HttpError> {
    let has_coding = headers.contains("Transfer-Encoding");
    let has_length = headers.contains("Content-Length");

    if has_coding && has_length {
        return Err(HttpError::MalformedRequest(
            "both Content-Length and Transfer-Encoding present",
        ));
    }

    if has_coding {
        let mut codings = headers
            .get_all("Transfer-Encoding")
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        return match (codings.next(), codings.next()) {
            (Some(only), None) if only.eq_ignore_ascii_case("chunked") => Ok(BodyFraming::Chunked),
            (Some(first), Some(_)) if first.eq_ignore_ascii_case("chunked") => Err(
                HttpError::MalformedRequest("chunked is not the final transfer coding"),
            ),
            (None, _) => Err(HttpError::MalformedRequest("empty Transfer-Encoding")),
            _ => Err(HttpError::UnsupportedTransferEncoding),
        };
    }

    match content_length(headers)? {
        None | Some(0) => Ok(BodyFraming::Empty),
        Some(n) if n > limits.max_body_bytes => Err(HttpError::PayloadTooLarge {
            limit: limits.max_body_bytes,
        }),
        Some(n) => Ok(BodyFraming::Length(n)),
    }
}

/// Every Content-Length value, across repeated fields and comma lists, must
/// be the same non-negative decimal integer.
fn content_length(headers: &Headers) -> Result<Option<usize>, HttpError> {
    let mut length = None;
    for raw in headers.get_all("Content-Length").flat_map(|v| v.split(',')) {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HttpError::ContentLengthMismatch);
        }
        let parsed: usize = raw.parse().map_err(|_| HttpError::ContentLengthMismatch)?;
        match length {
            Some(existing) if existing != parsed => return Err(HttpError::ContentLengthMismatch),
            _ => length = Some(parsed),
        }
    }
    Ok(length)
}

/// Reads the body according to `framing`.
pub async fn read_body<S>(
    reader: &mut ByteReader<S>,
    framing: BodyFraming,
    limits: &ParseLimits,
) -> Result<Bytes, HttpError>
where
    S: AsyncRead + Unpin,
{
    match framing {
        BodyFraming::Empty => Ok(Bytes::new()),
        BodyFraming::Length(n) => reader.read_exact(n).await,
        BodyFraming::Chunked => read_chunked(reader, limits).await,
    }
}

async fn read_chunked<S>(reader: &mut ByteReader<S>, limits: &ParseLimits) -> Result<Bytes, HttpError>
where
    S: AsyncRead + Unpin,
{
    let mut body = BytesMut::new();
    loop {
        let line = reader
            .read_line(limits.max_line_bytes)
            .await
            .map_err(|e| match e {
                HttpError::LineTooLong { .. } => HttpError::MalformedChunk,
                other => other,
            })?;
        let size = parse_chunk_size(&line)?;
        if size == 0 {
            break;
        }
        if size > limits.max_body_bytes - body.len() {
            return Err(HttpError::PayloadTooLarge {
                limit: limits.max_body_bytes,
            });
        }
        let data = reader.read_exact(size).await?;
        body.extend_from_slice(&data);
        if reader.read_exact(2).await? != "\r\n" {
            return Err(HttpError::MalformedChunk);
        }
    }
    // Trailer fields are validated like headers, then dropped.
    parse_fields(reader, limits).await?;
    Ok(body.freeze())
}

/// Parses a chunk-size line: hex digits, optionally followed by extensions.
pub fn parse_chunk_size(line: &[u8]) -> Result<usize, HttpError> {
    let line = std::str::from_utf8(line).map_err(|_| HttpError::MalformedChunk)?;
    let size = line
        .split_once(';')
        .map_or(line, |(size, _)| size)
        .trim_end_matches([' ', '\t']);
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(HttpError::MalformedChunk);
    }
    usize::from_str_radix(size, 16).map_err(|_| HttpError::MalformedChunk)
}
