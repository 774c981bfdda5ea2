//! Wicket - HTTP/1.1 server engine
//!
//! Parses HTTP/1.1 requests off TCP connections, hands each one to a
//! [`Handler`](http::handler::Handler) and writes the response back,
//! keeping connections open between requests where the protocol allows.
//!
//! ```no_run
//! use wicket::config::ServerConfig;
//! use wicket::http::{request::Request, response::Response};
//! use wicket::server::{Listener, Shutdown};
//!
//! async fn hello(_req: Request) -> anyhow::Result<Response> {
//!     Ok(Response::ok("hello"))
//! }
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let shutdown = Shutdown::new();
//! let listener = Listener::bind(&ServerConfig::default()).await?;
//! listener.serve(hello, shutdown.subscribe()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod routes;
pub mod server;
