//! HTTP/1.1 protocol engine.
//!
//! # Architecture
//!
//! - **`reader`**: buffered CRLF-line and exact-length reads off the socket
//! - **`parser`**: request-line, header fields and body framing
//! - **`headers`**: ordered header fields with case-insensitive lookup
//! - **`request`** / **`response`**: message types and builders
//! - **`writer`**: serializes responses, adding `Content-Length` when missing
//! - **`handler`**: the callback requests are dispatched to
//! - **`connection`**: the per-connection request/response state machine
//! - **`error`**: transport and protocol error taxonomy
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐  idle timeout, EOF, shutdown,
//!        │    Idle     │──────── or no keep-alive ─────────┐
//!        └──────┬──────┘                                    │
//!               │ first byte of a request                   │
//!               ▼                                           │
//!        ┌─────────────┐  protocol error                    │
//!        │   Parsing   │──── (4xx, keep-alive off) ───┐     │
//!        └──────┬──────┘                              │     │
//!               │ Request                             │     │
//!               ▼                                     │     │
//!        ┌─────────────┐                              │     │
//!        │ Dispatching │ ← handler; fault → 500       │     │
//!        └──────┬──────┘                              │     │
//!               │ Response                            │     │
//!               ▼                                     │     │
//!        ┌─────────────┐◄─────────────────────────────┘     │
//!        │   Writing   │──── write failure ──────────┐      │
//!        └──────┬──────┘                             ▼      ▼
//!               │ response sent               ┌─────────────┐
//!               └─► Idle                      │   Closed    │
//!                                             └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use wicket::http::connection::{Connection, ConnectionConfig};
//! use wicket::http::{request::Request, response::Response};
//! use wicket::server::ShutdownSignal;
//!
//! async fn echo(req: Request) -> anyhow::Result<Response> {
//!     Ok(Response::ok(req.body))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let handler = Arc::new(echo);
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let handler = Arc::clone(&handler);
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(
//!                 socket,
//!                 handler,
//!                 ConnectionConfig::default(),
//!                 ShutdownSignal::never(),
//!             );
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod error;
pub mod handler;
pub mod headers;
pub mod parser;
pub mod reader;
pub mod request;
pub mod response;
pub mod writer;

pub use error::HttpError;
pub use headers::Headers;
