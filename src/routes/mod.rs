//! Demo application served by the `wicket` binary.
//!
//! | route | method | response |
//! |---|---|---|
//! | `/` | GET | empty 200 |
//! | `/echo/{text}` | GET | `{text}` |
//! | `/user-agent` | GET | the `User-Agent` header |
//! | `/files/{name}` | GET, POST | file download / upload |
//!
//! Bodies are gzip-compressed when the client accepts it.

pub mod encoding;
pub mod files;

use std::path::PathBuf;

use crate::http::handler::Handler;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};

/// Routes requests to the demo endpoints.
#[derive(Debug, Clone, Default)]
pub struct Router {
    files_dir: Option<PathBuf>,
}

impl Router {
    pub fn new(files_dir: Option<PathBuf>) -> Self {
        Self { files_dir }
    }

    pub async fn route(&self, request: &Request) -> Response {
        let path = request.path();
        let method = &request.method;

        if path == "/" {
            return only_get(method).unwrap_or_else(|| Response::ok(""));
        }
        if let Some(text) = path.strip_prefix("/echo/").filter(|t| !t.is_empty()) {
            return only_get(method).unwrap_or_else(|| plain(text.to_string()));
        }
        if path == "/user-agent" {
            return only_get(method).unwrap_or_else(|| {
                plain(request.header("User-Agent").unwrap_or("Unknown").to_string())
            });
        }
        if let Some(name) = path.strip_prefix("/files/") {
            let Some(dir) = &self.files_dir else {
                return Response::not_found();
            };
            return match method {
                Method::GET | Method::HEAD => files::download(dir, name).await,
                Method::POST => files::upload(dir, name, request).await,
                _ => method_not_allowed("GET, HEAD, POST"),
            };
        }

        ResponseBuilder::new(StatusCode::NOT_FOUND)
            .header("Content-Type", "text/plain")
            .body("Not Found")
            .build()
    }
}

impl Handler for Router {
    async fn call(&self, request: Request) -> anyhow::Result<Response> {
        let mut response = self.route(&request).await;
        if encoding::accepts_gzip(&request) {
            encoding::compress_response(&mut response)?;
        }
        Ok(response)
    }
}

fn only_get(method: &Method) -> Option<Response> {
    match method {
        Method::GET | Method::HEAD => None,
        _ => Some(method_not_allowed("GET, HEAD")),
    }
}

fn method_not_allowed(allow: &str) -> Response {
    ResponseBuilder::new(StatusCode::METHOD_NOT_ALLOWED)
        .header("Allow", allow)
        .header("Content-Type", "text/plain")
        .body("Method Not Allowed")
        .build()
}

fn plain(body: String) -> Response {
    ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .body(body)
        .build()
}
