use tokio::io::AsyncReadExt;
use wicket::http::HttpError;
use wicket::http::response::{Response, ResponseBuilder, StatusCode};
use wicket::http::writer::{ResponseWriter, serialize_response};

fn wire(response: &Response) -> String {
    String::from_utf8(serialize_response(response, false).unwrap().to_vec()).unwrap()
}

#[test]
fn test_writer_injects_missing_content_length() {
    let response = Response {
        status: StatusCode::OK,
        reason: "OK".into(),
        headers: Default::default(),
        body: "ok".into(),
    };

    assert_eq!(wire(&response), "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
}

#[test]
fn test_writer_keeps_header_order_and_spelling() {
    let response = ResponseBuilder::new(StatusCode::OK)
        .header("x-lower", "1")
        .header("X-Upper", "2")
        .header("x-lower", "3")
        .body("abc")
        .build();

    assert_eq!(
        wire(&response),
        "HTTP/1.1 200 OK\r\nx-lower: 1\r\nX-Upper: 2\r\nx-lower: 3\r\nContent-Length: 3\r\n\r\nabc"
    );
}

#[test]
fn test_writer_keeps_handler_content_length() {
    let response = ResponseBuilder::new(StatusCode::CREATED)
        .header("Content-Length", "4")
        .body("done")
        .build();

    assert_eq!(wire(&response), "HTTP/1.1 201 Created\r\nContent-Length: 4\r\n\r\ndone");
}

#[test]
fn test_writer_chunk_encodes_when_requested() {
    let response = ResponseBuilder::new(StatusCode::OK)
        .header("Transfer-Encoding", "chunked")
        .body("hello")
        .build();

    assert_eq!(
        wire(&response),
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n"
    );
}

#[test]
fn test_writer_empty_body_gets_zero_length() {
    let response = Response::new(StatusCode::OK);

    assert_eq!(wire(&response), "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
}

#[test]
fn test_writer_custom_reason_and_unknown_status() {
    let response = ResponseBuilder::new(StatusCode::new(299).unwrap())
        .reason("Whatever")
        .build();

    assert!(wire(&response).starts_with("HTTP/1.1 299 Whatever\r\n"));
}

#[test]
fn test_writer_rejects_mismatched_length() {
    let response = ResponseBuilder::new(StatusCode::OK)
        .header("Content-Length", "10")
        .body("short")
        .build();

    assert!(matches!(
        serialize_response(&response, false),
        Err(HttpError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_write_to_stream() {
    let (mut client, mut server) = tokio::io::duplex(16);
    let mut writer = ResponseWriter::new(&Response::ok("streamed body"), false).unwrap();

    let reader = tokio::spawn(async move {
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        received
    });

    writer.write_to_stream(&mut server).await.unwrap();
    drop(server);

    let received = reader.await.unwrap();
    assert_eq!(
        received,
        b"HTTP/1.1 200 OK\r\nContent-Length: 13\r\n\r\nstreamed body"
    );
}

#[tokio::test]
async fn test_write_to_closed_peer_fails() {
    let (client, mut server) = tokio::io::duplex(16);
    drop(client);
    let mut writer = ResponseWriter::new(&Response::ok("nobody listening"), false).unwrap();

    let result = writer.write_to_stream(&mut server).await;

    assert!(matches!(result, Err(HttpError::WriteFailed(_))));
}
