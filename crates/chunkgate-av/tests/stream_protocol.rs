//! Wire-level tests for the streaming scanner client, against a local
//! one-shot TCP server standing in for the antivirus service.

use chunkgate_av::{parse_verdict, AvError, AvStreamClient, ScanOutcome};
use chunkgate_core::ScannerEndpoint;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, capture the raw request until the terminating
/// zero-length chunk, reply with the given status and body, close.
async fn spawn_scanner(status: &'static str, body: String) -> (u16, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut seen = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            seen.extend_from_slice(&buf[..n]);
            if seen.ends_with(b"0\r\n\r\n") {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        seen
    });

    (port, handle)
}

fn endpoint(port: u16) -> ScannerEndpoint {
    ScannerEndpoint {
        username: "scan".to_string(),
        password: "secret".to_string(),
        domain: "127.0.0.1".to_string(),
        port,
        path: "/v2/scan-chunked".to_string(),
        use_http: true,
        timeout_secs: 5,
    }
}

fn body_of(seen: &[u8]) -> &[u8] {
    let header_end = seen
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("request head terminator");
    &seen[header_end + 4..]
}

#[tokio::test]
async fn frames_chunks_and_authenticates() {
    let (port, server) = spawn_scanner("200 OK", r#"{"malware": false}"#.to_string()).await;

    let mut client = AvStreamClient::connect(&endpoint(port), "text/plain")
        .await
        .unwrap();
    client.send_chunk(b"hello").await.unwrap();
    client.send_chunk(&vec![0xAB; 0x3000]).await.unwrap();
    let response = client.finish().await.unwrap();

    assert_eq!(parse_verdict(&response).unwrap(), ScanOutcome::Clean);

    let seen = server.await.unwrap();
    let head = String::from_utf8_lossy(&seen);
    assert!(head.starts_with("POST /v2/scan-chunked HTTP/1.1\r\n"));
    assert!(head.contains("Authorization: Basic c2NhbjpzZWNyZXQ=\r\n"));
    assert!(head.contains("Transfer-Encoding: chunked\r\n"));
    assert!(head.contains("Content-Type: text/plain\r\n"));

    let body = body_of(&seen);
    assert!(body.starts_with(b"5\r\nhello\r\n3000\r\n"));
    assert!(body.ends_with(b"\r\n0\r\n\r\n"));
}

#[tokio::test]
async fn empty_chunks_are_not_framed() {
    let (port, server) = spawn_scanner("200 OK", r#"{"malware": false}"#.to_string()).await;

    let mut client = AvStreamClient::connect(&endpoint(port), "text/plain")
        .await
        .unwrap();
    client.send_chunk(b"").await.unwrap();
    client.send_chunk(b"data").await.unwrap();
    client.finish().await.unwrap();

    let seen = server.await.unwrap();
    assert_eq!(body_of(&seen), b"4\r\ndata\r\n0\r\n\r\n");
}

#[tokio::test]
async fn infected_verdict_is_parsed() {
    let (port, _server) = spawn_scanner(
        "200 OK",
        r#"{"malware": true, "reason": "Eicar-Test-Signature"}"#.to_string(),
    )
    .await;

    let mut client = AvStreamClient::connect(&endpoint(port), "application/octet-stream")
        .await
        .unwrap();
    client.send_chunk(b"X5O!P%@AP[4\\PZX54(P^)7CC)7}").await.unwrap();
    let response = client.finish().await.unwrap();

    assert_eq!(
        parse_verdict(&response).unwrap(),
        ScanOutcome::Infected {
            reason: "Eicar-Test-Signature".to_string()
        }
    );
}

#[tokio::test]
async fn non_200_status_is_a_service_error() {
    let (port, _server) =
        spawn_scanner("502 Bad Gateway", "scanner unavailable".to_string()).await;

    let mut client = AvStreamClient::connect(&endpoint(port), "text/plain")
        .await
        .unwrap();
    client.send_chunk(b"payload").await.unwrap();
    let response = client.finish().await.unwrap();
    assert_eq!(response.status, 502);

    let err = parse_verdict(&response).unwrap_err();
    assert!(matches!(err, AvError::Service(_)));
    assert!(err.to_string().contains("scanner unavailable"));
}

#[tokio::test]
async fn connect_failure_fails_fast() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = AvStreamClient::connect(&endpoint(port), "text/plain")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AvError::Service(_)));
}

#[tokio::test]
async fn unresponsive_scanner_times_out() {
    // Swallow the request and never answer; the response read must hit its
    // deadline instead of hanging.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        while socket.read(&mut buf).await.unwrap_or(0) > 0 {}
    });

    let mut endpoint = endpoint(port);
    endpoint.timeout_secs = 1;

    let mut client = AvStreamClient::connect(&endpoint, "text/plain")
        .await
        .unwrap();
    client.send_chunk(b"hello").await.unwrap();

    let err = client.finish().await.err().unwrap();
    assert!(matches!(err, AvError::Service(_)));
    assert!(err.to_string().contains("timed out"));
}
