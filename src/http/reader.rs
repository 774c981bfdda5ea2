use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use crate::http::error::HttpError;

/// Initial capacity of the read buffer.
const INITIAL_CAPACITY: usize = 4096;

/// Upper bound on how much is reserved ahead of a single socket read.
const MAX_READ_CHUNK: usize = 64 * 1024;

/// Buffered reader over one connection's input stream.
///
/// Owns both the stream and the bytes read ahead of the current message, so
/// leftover bytes from a pipelined request stay attached to the connection
/// that received them. Every socket read is bounded by `read_timeout`.
pub struct ByteReader<S> {
    stream: S,
    buffer: BytesMut,
    read_timeout: Duration,
}

impl<S: AsyncRead + Unpin> ByteReader<S> {
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            read_timeout,
        }
    }

    /// Mutable access to the underlying stream, used to write responses.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Number of bytes read from the stream but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Waits up to `idle` for the first byte of the next message.
    ///
    /// Returns `Ok(false)` when the peer closed the connection cleanly
    /// between messages, and `HttpError::IdleTimeout` when nothing arrived.
    pub async fn wait_for_data(&mut self, idle: Duration) -> Result<bool, HttpError> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        self.buffer.reserve(INITIAL_CAPACITY);
        match timeout(idle, self.stream.read_buf(&mut self.buffer)).await {
            Err(_) => Err(HttpError::IdleTimeout),
            Ok(Err(e)) => Err(HttpError::Io(e)),
            Ok(Ok(0)) => Ok(false),
            Ok(Ok(_)) => Ok(true),
        }
    }

    /// Reads one line terminated by CRLF and returns it without the
    /// terminator.
    ///
    /// Fails with `LineTooLong` as soon as more than `max_len` bytes are
    /// buffered without a terminator, so a hostile peer cannot make the
    /// buffer grow without bound.
    pub async fn read_line(&mut self, max_len: usize) -> Result<Bytes, HttpError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find_crlf(&self.buffer[scanned..]) {
                let end = scanned + pos;
                if end > max_len {
                    return Err(HttpError::LineTooLong { limit: max_len });
                }
                let line = self.buffer.split_to(end).freeze();
                self.buffer.advance(2);
                return Ok(line);
            }
            if self.buffer.len() > max_len + 1 {
                return Err(HttpError::LineTooLong { limit: max_len });
            }
            // A CR at the end may be half of a terminator split across reads.
            scanned = self.buffer.len().saturating_sub(1);
            if self.fill(INITIAL_CAPACITY).await? == 0 {
                return Err(HttpError::ConnectionClosed);
            }
        }
    }

    /// Reads exactly `n` bytes.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes, HttpError> {
        while self.buffer.len() < n {
            let wanted = (n - self.buffer.len()).min(MAX_READ_CHUNK);
            if self.fill(wanted).await? == 0 {
                return Err(HttpError::ConnectionClosed);
            }
        }
        Ok(self.buffer.split_to(n).freeze())
    }

    /// Reads and throws away input until EOF, `max_bytes` or `within` elapses.
    ///
    /// Used before closing a connection whose request was rejected: closing
    /// with unread input pending makes the kernel send a reset, which can
    /// destroy the error response before the client reads it.
    pub async fn discard(&mut self, within: Duration, max_bytes: usize) {
        self.buffer.clear();
        let drain = async {
            let mut total = 0;
            let mut scratch = [0u8; 4096];
            while total < max_bytes {
                match self.stream.read(&mut scratch).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => total += n,
                }
            }
        };
        let _ = timeout(within, drain).await;
    }

    async fn fill(&mut self, reserve: usize) -> Result<usize, HttpError> {
        self.buffer.reserve(reserve);
        match timeout(self.read_timeout, self.stream.read_buf(&mut self.buffer)).await {
            Err(_) => Err(HttpError::ReadTimeout),
            Ok(Err(e)) => Err(HttpError::Io(e)),
            Ok(Ok(n)) => Ok(n),
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
