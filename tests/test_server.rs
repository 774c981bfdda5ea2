//! End-to-end tests over loopback TCP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use wicket::config::ServerConfig;
use wicket::http::request::Request;
use wicket::http::response::{Response, ResponseBuilder, StatusCode};
use wicket::server::{Listener, ListenerError, Shutdown};

fn test_config() -> ServerConfig {
    ServerConfig {
        listen_address: "127.0.0.1".to_string(),
        listen_port: 0,
        idle_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
        shutdown_grace: Duration::from_secs(2),
        ..ServerConfig::default()
    }
}

async fn echo(req: Request) -> anyhow::Result<Response> {
    Ok(ResponseBuilder::new(StatusCode::OK)
        .header("X-Target", req.target.clone())
        .body(req.body)
        .build())
}

async fn start(
    config: ServerConfig,
) -> (SocketAddr, Shutdown, JoinHandle<Result<(), ListenerError>>) {
    let listener = Listener::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(listener.serve(echo, shutdown.subscribe()));
    (addr, shutdown, server)
}

/// Reads one Content-Length framed response: (status line, body).
async fn read_response<R: AsyncBufRead + Unpin>(reader: &mut R) -> (String, String) {
    let mut status = String::new();
    reader.read_line(&mut status).await.unwrap();
    let mut length = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        if line == "\r\n" {
            break;
        }
        if let Some(v) = line.strip_prefix("Content-Length: ") {
            length = v.trim().parse().unwrap();
        }
    }
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.unwrap();
    (status.trim_end().to_string(), String::from_utf8(body).unwrap())
}

#[tokio::test]
async fn test_concurrent_clients_get_their_own_ordered_responses() {
    const CLIENTS: usize = 16;
    const REQUESTS: usize = 10;

    let (addr, shutdown, server) = start(test_config()).await;

    let mut clients = Vec::new();
    for c in 0..CLIENTS {
        clients.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut read = BufReader::new(read);
            for r in 0..REQUESTS {
                let body = format!("client-{c}-request-{r}");
                let request = format!(
                    "POST /{c}/{r} HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                );
                write.write_all(request.as_bytes()).await.unwrap();

                let (status, received) = read_response(&mut read).await;
                assert_eq!(status, "HTTP/1.1 200 OK");
                assert_eq!(received, body);
            }
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    shutdown.trigger();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_oversized_header_over_tcp_gets_431() {
    let config = ServerConfig {
        max_header_bytes: 256,
        ..test_config()
    };
    let (addr, shutdown, server) = start(config).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET / HTTP/1.1\r\nX-Huge: {}\r\n\r\n", "h".repeat(16 * 1024));
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 431 "), "{response}");

    shutdown.trigger();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connection_bound_pauses_accepting() {
    let config = ServerConfig {
        max_concurrent_connections: 1,
        ..test_config()
    };
    let (addr, shutdown, server) = start(config).await;

    let first = TcpStream::connect(addr).await.unwrap();
    let (first_read, mut first_write) = first.into_split();
    let mut first_read = BufReader::new(first_read);
    first_write.write_all(b"GET /one HTTP/1.1\r\n\r\n").await.unwrap();
    let (status, _) = read_response(&mut first_read).await;
    assert_eq!(status, "HTTP/1.1 200 OK");

    // The second connection completes the TCP handshake through the backlog,
    // but is not served while the first one holds the only slot.
    let mut second = TcpStream::connect(addr).await.unwrap();
    second
        .write_all(b"GET /two HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut buf = [0u8; 1];
    let waited = tokio::time::timeout(Duration::from_millis(200), second.read(&mut buf)).await;
    assert!(waited.is_err(), "second connection was served past the bound");

    drop(first_read);
    drop(first_write);

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), second.read_to_string(&mut response))
        .await
        .expect("second connection never served")
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    shutdown.trigger();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_accepting_and_closes_idle_connections() {
    let (addr, shutdown, server) = start(test_config()).await;

    let mut idle = TcpStream::connect(addr).await.unwrap();
    idle.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    let mut reader = BufReader::new(&mut idle);
    let (status, _) = read_response(&mut reader).await;
    assert_eq!(status, "HTTP/1.1 200 OK");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("listener did not stop")
        .unwrap()
        .unwrap();

    let mut rest = Vec::new();
    idle.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_grace_aborts_stuck_connections() {
    async fn stuck(_req: Request) -> anyhow::Result<Response> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Response::ok("too late"))
    }

    let config = ServerConfig {
        shutdown_grace: Duration::from_millis(100),
        ..test_config()
    };
    let listener = Listener::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(listener.serve(stuck, shutdown.subscribe()));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("grace period not enforced")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let taken = Listener::bind(&test_config()).await.unwrap();
    let config = ServerConfig {
        listen_port: taken.local_addr().unwrap().port(),
        ..test_config()
    };

    assert!(matches!(
        Listener::bind(&config).await,
        Err(ListenerError::Bind { .. })
    ));
}

#[tokio::test]
async fn test_aborted_connection_cancels_its_handler() {
    static COMPLETED: AtomicBool = AtomicBool::new(false);

    async fn slow_side_effect(_req: Request) -> anyhow::Result<Response> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        COMPLETED.store(true, Ordering::SeqCst);
        Ok(Response::ok("stored"))
    }

    let config = ServerConfig {
        shutdown_grace: Duration::from_millis(50),
        ..test_config()
    };
    let listener = Listener::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(listener.serve(slow_side_effect, shutdown.subscribe()));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"POST / HTTP/1.1\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.trigger();
    server.await.unwrap().unwrap();
    assert!(!COMPLETED.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!COMPLETED.load(Ordering::SeqCst), "handler outlived its connection");
}

#[tokio::test]
async fn test_bind_rejects_zero_connection_bound() {
    let config = ServerConfig {
        max_concurrent_connections: 0,
        ..test_config()
    };

    assert!(matches!(
        Listener::bind(&config).await,
        Err(ListenerError::Config(_))
    ));
}
