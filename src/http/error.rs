//! Error taxonomy for the HTTP engine.
//!
//! Errors fall into two groups:
//!
//! - **Transport errors** (`ConnectionClosed`, `ReadTimeout`, `IdleTimeout`,
//!   `WriteFailed`, `Io`): the stream itself is unusable or abandoned.
//! - **Protocol errors** (everything else raised while parsing): the peer sent
//!   something we refuse to frame. These are answered with a 4xx/5xx response
//!   and the connection is closed afterwards, since the parse position is no
//!   longer trustworthy.
//!
//! `ReadTimeout` sits in between: the connection is closed, but a client that
//! started a request and stalled still gets a `408` if the socket accepts it.

use std::io;

use crate::http::response::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("timed out waiting for request data")]
    ReadTimeout,

    #[error("connection idle timeout elapsed")]
    IdleTimeout,

    #[error("failed to write response: {0}")]
    WriteFailed(#[source] io::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("request line exceeds {limit} bytes")]
    UriTooLong { limit: usize },

    #[error("malformed request line")]
    MalformedRequestLine,

    #[error("malformed header line")]
    MalformedHeader,

    #[error("more than {limit} header fields")]
    TooManyHeaders { limit: usize },

    #[error("invalid Content-Length")]
    ContentLengthMismatch,

    #[error("malformed chunk")]
    MalformedChunk,

    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    #[error("unsupported transfer coding")]
    UnsupportedTransferEncoding,

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("invalid response framing: {0}")]
    InvalidResponse(&'static str),
}

impl HttpError {
    /// True when the underlying stream can no longer carry a response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HttpError::ConnectionClosed
                | HttpError::IdleTimeout
                | HttpError::WriteFailed(_)
                | HttpError::Io(_)
        )
    }

    /// The status code sent back to the client for this error, if any.
    ///
    /// Transport errors and response-side errors have no client-visible
    /// status: the former because nobody is listening, the latter because
    /// they are surfaced as handler faults (`500`) by the connection.
    pub fn status(&self) -> Option<StatusCode> {
        let status = match self {
            HttpError::MalformedRequestLine
            | HttpError::MalformedHeader
            | HttpError::ContentLengthMismatch
            | HttpError::MalformedChunk
            | HttpError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::ReadTimeout => StatusCode::REQUEST_TIMEOUT,
            HttpError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::UriTooLong { .. } => StatusCode::URI_TOO_LONG,
            HttpError::LineTooLong { .. } | HttpError::TooManyHeaders { .. } => {
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
            }
            HttpError::UnsupportedTransferEncoding => StatusCode::NOT_IMPLEMENTED,
            HttpError::ConnectionClosed
            | HttpError::IdleTimeout
            | HttpError::WriteFailed(_)
            | HttpError::Io(_)
            | HttpError::InvalidResponse(_) => return None,
        };
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_have_no_status() {
        assert!(HttpError::ConnectionClosed.is_transport());
        assert!(HttpError::ConnectionClosed.status().is_none());
        assert!(HttpError::IdleTimeout.status().is_none());
    }

    #[test]
    fn protocol_errors_map_to_client_errors() {
        assert_eq!(
            HttpError::MalformedChunk.status(),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(
            HttpError::LineTooLong { limit: 10 }.status(),
            Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
        );
        assert_eq!(
            HttpError::ReadTimeout.status(),
            Some(StatusCode::REQUEST_TIMEOUT)
        );
        assert!(!HttpError::ReadTimeout.is_transport());
    }
}
