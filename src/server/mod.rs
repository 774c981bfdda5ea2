//! Accept loop and lifecycle.
//!
//! - **`listener`**: binds the configured address and runs one connection
//!   task per accepted socket, bounded by `max_concurrent_connections`
//! - **`shutdown`**: the signal that stops accepting and drains connections

pub mod listener;
pub mod shutdown;

pub use listener::{Listener, ListenerError};
pub use shutdown::{Shutdown, ShutdownSignal};
