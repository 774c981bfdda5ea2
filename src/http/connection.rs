use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::http::error::HttpError;
use crate::http::handler::Handler;
use crate::http::parser::{self, BodyFraming, ParseLimits};
use crate::http::reader::ByteReader;
use crate::http::request::{Method, Request, Version};
use crate::http::response::{Framing, Response};
use crate::http::writer::{self, ResponseWriter};
use crate::server::shutdown::ShutdownSignal;

/// Per-connection settings, read once when the connection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// How long a persistent connection may sit between requests.
    pub idle_timeout: Duration,
    /// How long a single read may block once a request has started.
    pub read_timeout: Duration,
    pub limits: ParseLimits,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
            limits: ParseLimits::default(),
        }
    }
}

/// How long a rejected connection keeps reading before it is closed.
const LINGER: Duration = Duration::from_secs(1);
const LINGER_MAX_BYTES: usize = 256 * 1024;

/// One client connection, exclusively owned by its connection task.
///
/// The stream, its read-ahead buffer and the keep-alive decision never leave
/// this struct, so nothing on the request path needs a lock.
pub struct Connection<S, H> {
    reader: ByteReader<S>,
    handler: Arc<H>,
    config: ConnectionConfig,
    shutdown: ShutdownSignal,
    state: ConnectionState,
    keep_alive: bool,
    linger: bool,
    last_activity: Instant,
    served: u64,
}

pub enum ConnectionState {
    Idle,
    Parsing,
    Dispatching(Request),
    Writing(ResponseWriter),
    Closed,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: Handler,
{
    pub fn new(
        stream: S,
        handler: Arc<H>,
        config: ConnectionConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            reader: ByteReader::new(stream, config.read_timeout),
            handler,
            config,
            shutdown,
            state: ConnectionState::Idle,
            keep_alive: true,
            linger: false,
            last_activity: Instant::now(),
            served: 0,
        }
    }

    /// Number of responses fully written on this connection.
    pub fn requests_served(&self) -> u64 {
        self.served
    }

    /// Drives the connection until it closes.
    ///
    /// Requests are handled strictly one after another; the next request is
    /// not parsed before the previous response is on the wire. Only a failed
    /// write is reported as an error: every other way of closing is a normal
    /// end of the connection.
    pub async fn run(&mut self) -> Result<(), HttpError> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
            self.state = match state {
                ConnectionState::Idle => self.await_request().await,
                ConnectionState::Parsing => self.read_request().await,
                ConnectionState::Dispatching(request) => self.dispatch(request).await,
                ConnectionState::Writing(mut writer) => {
                    writer.write_to_stream(self.reader.get_mut()).await?;
                    self.served += 1;
                    self.last_activity = Instant::now();
                    ConnectionState::Idle
                }
                ConnectionState::Closed => break,
            };
        }

        if let Err(e) = self.reader.get_mut().shutdown().await {
            debug!(error = %e, "Socket shutdown failed");
        }
        if self.linger {
            self.reader.discard(LINGER, LINGER_MAX_BYTES).await;
        }
        debug!(served = self.served, "Connection closed");
        Ok(())
    }

    async fn await_request(&mut self) -> ConnectionState {
        if !self.keep_alive {
            return ConnectionState::Closed;
        }
        if self.shutdown.is_triggered() && self.reader.buffered() == 0 {
            return ConnectionState::Closed;
        }

        let idle = self
            .config
            .idle_timeout
            .saturating_sub(self.last_activity.elapsed());

        tokio::select! {
            ready = self.reader.wait_for_data(idle) => match ready {
                Ok(true) => ConnectionState::Parsing,
                Ok(false) => {
                    debug!("Peer closed connection");
                    ConnectionState::Closed
                }
                Err(HttpError::IdleTimeout) => {
                    debug!(idle_timeout = ?self.config.idle_timeout, "Idle timeout, closing connection");
                    ConnectionState::Closed
                }
                Err(e) => {
                    debug!(error = %e, "Read failed while idle");
                    ConnectionState::Closed
                }
            },
            _ = self.shutdown.recv() => {
                debug!("Closing idle connection for shutdown");
                ConnectionState::Closed
            }
        }
    }

    async fn read_request(&mut self) -> ConnectionState {
        match self.parse_request().await {
            Ok(request) => {
                self.keep_alive = request.keep_alive();
                ConnectionState::Dispatching(request)
            }
            Err(e) => self.reject(e),
        }
    }

    async fn parse_request(&mut self) -> Result<Request, HttpError> {
        let limits = self.config.limits;
        let head = parser::parse_head(&mut self.reader, &limits).await?;
        let framing = parser::body_framing(&head.headers, &limits)?;

        if framing != BodyFraming::Empty && head.expects_continue() && self.reader.buffered() == 0 {
            let stream = self.reader.get_mut();
            stream
                .write_all(writer::CONTINUE)
                .await
                .map_err(HttpError::WriteFailed)?;
            stream.flush().await.map_err(HttpError::WriteFailed)?;
        }

        let body = parser::read_body(&mut self.reader, framing, &limits).await?;
        Ok(head.into_request(body))
    }

    /// Answers a failed parse and marks the connection for closing.
    fn reject(&mut self, err: HttpError) -> ConnectionState {
        self.keep_alive = false;

        let Some(mut response) = Response::from_error(&err) else {
            debug!(error = %err, "Connection dropped mid-request");
            return ConnectionState::Closed;
        };

        warn!(
            error = %err,
            status = response.status.as_u16(),
            "Rejecting request"
        );
        response.headers.set("Connection", "close");
        self.linger = true;
        self.writing(&response, false)
    }

    async fn dispatch(&mut self, request: Request) -> ConnectionState {
        let omit_body = request.method == Method::HEAD;
        let version = request.version;
        let method = request.method.clone();
        let target = request.target.clone();

        // The handler runs in its own task so a panic stays contained. The
        // set is dropped with this future, so an aborted connection takes
        // its handler down with it.
        let handler = Arc::clone(&self.handler);
        let mut running = JoinSet::new();
        running.spawn(async move { handler.call(request).await });

        let mut response = match running.join_next().await {
            Some(Ok(Ok(response))) => response,
            Some(Ok(Err(e))) => {
                error!(%method, %target, error = %e, "Handler failed");
                self.handler_fault()
            }
            Some(Err(e)) => {
                error!(%method, %target, error = %e, "Handler panicked");
                self.handler_fault()
            }
            None => self.handler_fault(),
        };

        match response.framing() {
            Ok(Framing::Chunked) if version == Version::Http10 => {
                // HTTP/1.0 has no chunked coding; send the body length instead.
                response.headers.remove("Transfer-Encoding");
            }
            Ok(_) => {}
            Err(e) => {
                error!(%method, %target, error = %e, "Handler returned an unframeable response");
                response = self.handler_fault();
            }
        }

        if response.headers.has_token("Connection", "close") || self.shutdown.is_triggered() {
            self.keep_alive = false;
        }
        if !self.keep_alive {
            if !response.headers.has_token("Connection", "close") {
                response.headers.set("Connection", "close");
            }
        } else if version == Version::Http10 && !response.headers.contains("Connection") {
            response.headers.append("Connection", "keep-alive");
        }

        debug!(
            %method,
            %target,
            status = response.status.as_u16(),
            keep_alive = self.keep_alive,
            "Request handled"
        );
        self.writing(&response, omit_body)
    }

    fn handler_fault(&mut self) -> Response {
        self.keep_alive = false;
        Response::internal_error()
    }

    fn writing(&mut self, response: &Response, omit_body: bool) -> ConnectionState {
        match ResponseWriter::new(response, omit_body) {
            Ok(writer) => ConnectionState::Writing(writer),
            Err(e) => {
                error!(error = %e, "Failed to serialize response");
                ConnectionState::Closed
            }
        }
    }
}
