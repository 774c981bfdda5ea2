//! TCP listener with bounded concurrency and graceful shutdown.
//!
//! # Responsibilities
//! - Bind the configured address
//! - Accept connections, spawning one connection task each
//! - Enforce `max_concurrent_connections` via a semaphore
//! - Retry transient accept failures after a backoff
//! - On shutdown, stop accepting and drain in-flight connections

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::http::connection::{Connection, ConnectionConfig};
use crate::http::handler::Handler;
use crate::server::shutdown::ShutdownSignal;

const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("connection limiter closed")]
    Closed,
}

/// A bound TCP listener that limits concurrent connections.
///
/// When `max_concurrent_connections` connections are open, accepting pauses
/// until one of them closes; pending clients wait in the kernel backlog
/// instead of being refused.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
    connection_config: ConnectionConfig,
    shutdown_grace: Duration,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ListenerError> {
        config.validate()?;
        let addr = config.listen_addr();
        let inner = TcpListener::bind((config.listen_address.as_str(), config.listen_port))
            .await
            .map_err(|source| ListenerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;

        info!(
            address = %local_addr,
            max_connections = config.max_concurrent_connections,
            "Listening"
        );

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(config.max_concurrent_connections)),
            max_connections: config.max_concurrent_connections,
            connection_config: config.connection_config(),
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.connection_limit.available_permits()
    }

    /// Accepts connections until `shutdown` fires, then drains.
    ///
    /// In-flight connections get `shutdown_grace` to finish the exchange they
    /// are in; whatever is still running afterwards is aborted. Returns an
    /// error only when the listening socket itself fails.
    pub async fn serve<H: Handler>(
        self,
        handler: H,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ListenerError> {
        let handler = Arc::new(handler);
        let mut tasks = JoinSet::new();
        let mut backoff = ACCEPT_BACKOFF_START;

        let result = loop {
            // Acquire a slot first (backpressure), then accept.
            let permit = tokio::select! {
                _ = shutdown.recv() => break Ok(()),
                permit = self.connection_limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Err(ListenerError::Closed),
                },
            };

            let accepted = tokio::select! {
                _ = shutdown.recv() => break Ok(()),
                accepted = self.inner.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    backoff = ACCEPT_BACKOFF_START;
                    debug!(
                        peer = %peer,
                        active = self.active_connections(),
                        "Accepted connection"
                    );
                    let connection = self.connection(stream, &handler, &shutdown);
                    tasks.spawn(
                        serve_connection(connection, permit)
                            .instrument(info_span!("connection", peer = %peer)),
                    );
                }
                Err(e) if is_transient(&e) => {
                    warn!(error = %e, backoff = ?backoff, "Transient accept failure");
                    drop(permit);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                }
                Err(e) => {
                    error!(error = %e, "Listener failed");
                    break Err(ListenerError::Accept(e));
                }
            }

            // Reap finished tasks so the set does not grow with total traffic.
            while tasks.try_join_next().is_some() {}
        };

        self.drain(tasks).await;
        result
    }

    fn connection<H: Handler>(
        &self,
        stream: TcpStream,
        handler: &Arc<H>,
        shutdown: &ShutdownSignal,
    ) -> Connection<TcpStream, H> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        Connection::new(
            stream,
            Arc::clone(handler),
            self.connection_config,
            shutdown.clone(),
        )
    }

    async fn drain(&self, mut tasks: JoinSet<()>) {
        if tasks.is_empty() {
            info!("Listener stopped");
            return;
        }
        info!(
            in_flight = tasks.len(),
            grace = ?self.shutdown_grace,
            "Draining connections"
        );
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(remaining = tasks.len(), "Grace period elapsed, aborting connections");
            tasks.shutdown().await;
        }
        info!("Listener stopped");
    }
}

/// Runs one connection task. The permit is released when the task ends,
/// including when it panics or is aborted.
async fn serve_connection<H: Handler>(
    mut connection: Connection<TcpStream, H>,
    _permit: OwnedSemaphorePermit,
) {
    if let Err(e) = connection.run().await {
        debug!(error = %e, "Connection ended with error");
    }
}

/// Accept errors that concern a single connection or a temporary resource
/// shortage rather than the listening socket.
fn is_transient(e: &io::Error) -> bool {
    use io::ErrorKind::*;

    if matches!(
        e.kind(),
        ConnectionAborted | ConnectionReset | ConnectionRefused | Interrupted | WouldBlock
            | TimedOut | OutOfMemory
    ) {
        return true;
    }
    // ENOMEM, ENFILE, EMFILE, ENOBUFS
    matches!(e.raw_os_error(), Some(12 | 23 | 24 | 105))
}
