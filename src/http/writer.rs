use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::error::HttpError;
use crate::http::response::{Framing, Response};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Largest chunk emitted when chunk-encoding a response body.
const CHUNK_SIZE: usize = 8 * 1024;

/// Interim response sent before reading a body announced with
/// `Expect: 100-continue`.
pub const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Serializes a response into its wire form.
///
/// Headers are written in stored order and spelling. When the response has
/// no framing header, `Content-Length` is appended from the body length.
/// With `omit_body` (answers to HEAD) the framing headers are still written
/// but the body is not.
pub fn serialize_response(resp: &Response, omit_body: bool) -> Result<BytesMut, HttpError> {
    let framing = resp.framing()?;
    let mut buf = BytesMut::with_capacity(128 + resp.body.len());

    // Status line
    buf.put_slice(HTTP_VERSION.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(resp.status.as_u16().to_string().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(resp.reason.as_bytes());
    buf.put_slice(b"\r\n");

    // Headers
    for (name, value) in resp.headers.iter() {
        put_header(&mut buf, name, value);
    }
    if framing == Framing::Missing {
        put_header(&mut buf, "Content-Length", &resp.body.len().to_string());
    }

    // Header/body separator
    buf.put_slice(b"\r\n");

    if !omit_body {
        match framing {
            Framing::Chunked => encode_chunked(&resp.body, CHUNK_SIZE, &mut buf),
            Framing::Length | Framing::Missing => buf.put_slice(&resp.body),
            Framing::None => {}
        }
    }

    Ok(buf)
}

fn put_header(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}

/// Appends `payload` in chunked transfer coding, including the terminating
/// zero-size chunk and the empty trailer section.
pub fn encode_chunked(payload: &[u8], max_chunk: usize, out: &mut BytesMut) {
    for chunk in payload.chunks(max_chunk.max(1)) {
        out.put_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.put_slice(chunk);
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"0\r\n\r\n");
}

/// A serialized response on its way to the socket.
pub struct ResponseWriter {
    buffer: BytesMut,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response, omit_body: bool) -> Result<Self, HttpError> {
        Ok(Self {
            buffer: serialize_response(response, omit_body)?,
            written: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Writes the whole response in a single pass.
    ///
    /// Any failure means the peer is gone; it is reported as `WriteFailed`
    /// and never retried.
    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> Result<(), HttpError>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream
                .write(&self.buffer[self.written..])
                .await
                .map_err(HttpError::WriteFailed)?;

            if n == 0 {
                return Err(HttpError::WriteFailed(std::io::ErrorKind::WriteZero.into()));
            }

            self.written += n;
        }

        stream.flush().await.map_err(HttpError::WriteFailed)
    }
}
