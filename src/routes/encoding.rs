//! Response compression negotiated through `Accept-Encoding`.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::http::request::Request;
use crate::http::response::Response;

/// Whether the client lists `gzip` with a non-zero quality.
pub fn accepts_gzip(request: &Request) -> bool {
    request
        .headers
        .get_all("Accept-Encoding")
        .flat_map(|v| v.split(','))
        .any(|entry| {
            let mut params = entry.split(';');
            let coding = params.next().unwrap_or("").trim();
            if !coding.eq_ignore_ascii_case("gzip") {
                return false;
            }
            params
                .filter_map(|p| p.trim().strip_prefix("q="))
                .all(|q| q.trim().parse::<f32>().map_or(false, |q| q > 0.0))
        })
}

pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Compresses a non-empty body in place and marks the encoding.
///
/// Responses that already carry a `Content-Encoding` or explicit framing are
/// left alone.
pub fn compress_response(response: &mut Response) -> std::io::Result<()> {
    if response.body.is_empty()
        || response.headers.contains("Content-Encoding")
        || response.headers.contains("Content-Length")
        || response.headers.contains("Transfer-Encoding")
    {
        return Ok(());
    }
    response.body = gzip(&response.body)?.into();
    response.headers.append("Content-Encoding", "gzip");
    response.headers.append("Vary", "Accept-Encoding");
    Ok(())
}
