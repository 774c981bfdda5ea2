//! `/files/{name}` download and upload against a base directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

/// Resolves `name` inside `base`, refusing anything that is not a single
/// plain path segment.
pub fn resolve(base: &Path, name: &str) -> Option<PathBuf> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    plain.then(|| base.join(name))
}

pub async fn download(base: &Path, name: &str) -> Response {
    if name.is_empty() {
        return text(StatusCode::BAD_REQUEST, "Invalid file request");
    }
    let Some(path) = resolve(base, name) else {
        return text(StatusCode::FORBIDDEN, "Access Denied");
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return text(StatusCode::NOT_FOUND, "File Not Found"),
        Err(e) => return io_failure(&e, name, "File Not Found"),
    }

    match tokio::fs::read(&path).await {
        Ok(contents) => ResponseBuilder::new(StatusCode::OK)
            .header("Content-Type", "application/octet-stream")
            .body(contents)
            .build(),
        Err(e) => io_failure(&e, name, "File Not Found"),
    }
}

pub async fn upload(base: &Path, name: &str, request: &Request) -> Response {
    if name.is_empty() {
        return text(StatusCode::BAD_REQUEST, "Invalid file request");
    }
    if !request.headers.contains("Content-Length")
        && !request.headers.contains("Transfer-Encoding")
    {
        return text(StatusCode::LENGTH_REQUIRED, "Content-Length header missing");
    }
    let Some(path) = resolve(base, name) else {
        return text(StatusCode::FORBIDDEN, "Access Denied");
    };

    match tokio::fs::write(&path, &request.body).await {
        Ok(()) => {
            info!(file = %path.display(), bytes = request.body.len(), "File stored");
            Response::new(StatusCode::CREATED)
        }
        Err(e) => io_failure(&e, name, "File write error"),
    }
}

fn io_failure(e: &std::io::Error, name: &str, not_found: &'static str) -> Response {
    match e.kind() {
        ErrorKind::NotFound => text(StatusCode::NOT_FOUND, not_found),
        ErrorKind::PermissionDenied => text(StatusCode::FORBIDDEN, "Permission Denied"),
        _ => {
            error!(file = name, error = %e, "File access failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, "File access error")
        }
    }
}

fn text(status: StatusCode, body: &'static str) -> Response {
    ResponseBuilder::new(status)
        .header("Content-Type", "text/plain")
        .body(body)
        .build()
}
