use std::future::Future;

use crate::http::request::Request;
use crate::http::response::Response;

/// The business-logic callback the engine dispatches every parsed request to.
///
/// A returned `Err` (or a panic) is a handler fault: the client gets a
/// `500 Internal Server Error` and the connection is closed, since the
/// handler's state is unknown afterwards.
///
/// Any `Fn(Request) -> impl Future<Output = anyhow::Result<Response>>` that is
/// `Send + Sync + 'static` is a handler:
///
/// ```
/// # use wicket::http::{handler::Handler, request::Request, response::Response};
/// async fn hello(_req: Request) -> anyhow::Result<Response> {
///     Ok(Response::ok("hello"))
/// }
/// fn assert_handler<H: Handler>(_: H) {}
/// assert_handler(hello);
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request) -> impl Future<Output = anyhow::Result<Response>> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send,
{
    fn call(&self, request: Request) -> impl Future<Output = anyhow::Result<Response>> + Send {
        self(request)
    }
}
