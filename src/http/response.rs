use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;

use crate::http::error::HttpError;
use crate::http::headers::Headers;
use crate::http::request::is_token;

/// An HTTP status code in the range 100..=599.
///
/// Common codes are available as associated constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const CONTINUE: StatusCode = StatusCode(100);
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const LENGTH_REQUIRED: StatusCode = StatusCode(411);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const URI_TOO_LONG: StatusCode = StatusCode(414);
    pub const REQUEST_HEADER_FIELDS_TOO_LARGE: StatusCode = StatusCode(431);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const NOT_IMPLEMENTED: StatusCode = StatusCode(501);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    /// Returns `None` for codes outside 100..=599.
    ///
    /// # Example
    ///
    /// ```
    /// # use wicket::http::response::StatusCode;
    /// assert_eq!(StatusCode::new(200), Some(StatusCode::OK));
    /// assert_eq!(StatusCode::new(99), None);
    /// ```
    pub fn new(code: u16) -> Option<Self> {
        (100..=599).contains(&code).then_some(StatusCode(code))
    }

    /// Returns the numeric HTTP status code.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the standard reason phrase, or `None` for unregistered codes.
    ///
    /// ```
    /// # use wicket::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.canonical_reason(), Some("OK"));
    /// assert_eq!(StatusCode::NOT_FOUND.canonical_reason(), Some("Not Found"));
    /// ```
    pub fn canonical_reason(&self) -> Option<&'static str> {
        let reason = match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            409 => "Conflict",
            411 => "Length Required",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => return None,
        };
        Some(reason)
    }

    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.0)
    }

    /// Statuses whose responses never carry a body.
    pub fn forbids_body(&self) -> bool {
        self.is_informational() || self.0 == 204 || self.0 == 304
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a response body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length` set by the handler and consistent with the body.
    Length,
    /// `Transfer-Encoding: chunked` set by the handler.
    Chunked,
    /// No framing header; the writer has to add `Content-Length`.
    Missing,
    /// Bodyless status, nothing to frame.
    None,
}

/// Represents a complete HTTP response ready to be sent to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub reason: Cow<'static, str>,
    /// Header fields, serialized in this order and spelling
    pub headers: Headers,
    pub body: Bytes,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use wicket::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body("{}")
///     .build();
/// assert_eq!(response.reason, "OK");
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    reason: Option<Cow<'static, str>>,
    headers: Headers,
    body: Bytes,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Overrides the canonical reason phrase.
    pub fn reason(mut self, reason: impl Into<Cow<'static, str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Appends a header. Repeated names are kept as separate fields.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final Response.
    ///
    /// No framing header is added here: the writer derives `Content-Length`
    /// from the body when the handler leaves framing unset.
    pub fn build(self) -> Response {
        let status = self.status;
        Response {
            status,
            reason: self
                .reason
                .unwrap_or(Cow::Borrowed(status.canonical_reason().unwrap_or(""))),
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    /// A response with the given status, canonical reason and no body.
    pub fn new(status: StatusCode) -> Self {
        ResponseBuilder::new(status).build()
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::OK).body(body).build()
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::plain(StatusCode::NOT_FOUND)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::plain(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// A `text/plain` response whose body is the status line text,
    /// e.g. `400 Bad Request`.
    pub fn plain(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("");
        ResponseBuilder::new(status)
            .header("Content-Type", "text/plain")
            .body(format!("{} {}", status.as_u16(), reason))
            .build()
    }

    /// The response synthesized for a protocol error, if it has one.
    pub fn from_error(err: &HttpError) -> Option<Self> {
        err.status().map(Self::plain)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Checks the framing headers against the body.
    ///
    /// At most one framing style may be present, a `Content-Length` must
    /// match the body length exactly, and bodyless statuses must have an
    /// empty body. Field names must be tokens, and neither values nor the
    /// reason phrase may contain a line break.
    pub fn framing(&self) -> Result<Framing, HttpError> {
        self.check_fields()?;

        let has_length = self.headers.contains("Content-Length");
        let has_coding = self.headers.contains("Transfer-Encoding");

        if self.status.forbids_body() {
            if !self.body.is_empty() {
                return Err(HttpError::InvalidResponse("body on a bodyless status"));
            }
            if has_coding {
                return Err(HttpError::InvalidResponse(
                    "Transfer-Encoding on a bodyless status",
                ));
            }
            return Ok(Framing::None);
        }

        match (has_length, has_coding) {
            (true, true) => Err(HttpError::InvalidResponse(
                "both Content-Length and Transfer-Encoding",
            )),
            (false, true) => {
                let chunked_only = self
                    .headers
                    .get_all("Transfer-Encoding")
                    .flat_map(|v| v.split(','))
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .all(|t| t.eq_ignore_ascii_case("chunked"));
                if chunked_only && self.headers.has_token("Transfer-Encoding", "chunked") {
                    Ok(Framing::Chunked)
                } else {
                    Err(HttpError::InvalidResponse("unsupported Transfer-Encoding"))
                }
            }
            (true, false) => {
                let matches_body = self
                    .headers
                    .get_all("Content-Length")
                    .all(|v| v.trim().parse::<usize>().ok() == Some(self.body.len()));
                if matches_body {
                    Ok(Framing::Length)
                } else {
                    Err(HttpError::InvalidResponse(
                        "Content-Length does not match body",
                    ))
                }
            }
            (false, false) => Ok(Framing::Missing),
        }
    }

    fn check_fields(&self) -> Result<(), HttpError> {
        if self.reason.contains(['\r', '\n']) {
            return Err(HttpError::InvalidResponse("line break in reason phrase"));
        }
        for (name, value) in self.headers.iter() {
            if !is_token(name) {
                return Err(HttpError::InvalidResponse("invalid header name"));
            }
            if value.contains(['\r', '\n', '\0']) {
                return Err(HttpError::InvalidResponse("invalid header value"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_has_empty_reason() {
        let response = Response::new(StatusCode::new(299).unwrap());
        assert_eq!(response.reason, "");
    }

    #[test]
    fn framing_detects_mismatched_length() {
        let response = ResponseBuilder::new(StatusCode::OK)
            .header("Content-Length", "999")
            .body("test")
            .build();
        assert!(response.framing().is_err());
    }

    #[test]
    fn framing_rejects_body_on_no_content() {
        let response = ResponseBuilder::new(StatusCode::NO_CONTENT)
            .body("x")
            .build();
        assert!(response.framing().is_err());
        assert_eq!(
            Response::new(StatusCode::NO_CONTENT).framing().unwrap(),
            Framing::None
        );
    }
}
