//! End-to-end pipeline tests against an in-memory object store and a
//! stub scanner speaking chunked-transfer HTTP over loopback.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chunkgate_core::{Config, MemoryScanLog, ScanLog, ScannerConfig, StoreConfig, VerdictRegistry};
use chunkgate_storage::MemoryObjectStore;
use chunkgate_upload::{UploadError, UploadOutcome, Uploader};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const CLEAN: &str = "HTTP/1.1 200 OK\r\nContent-Length: 18\r\n\r\n{\"malware\": false}";
const INFECTED: &str = "HTTP/1.1 200 OK\r\nContent-Length: 51\r\n\r\n{\"malware\": true, \"reason\": \"Win.Test.EICAR_HDB-1\"}";
const SERVER_ERROR: &str = "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 5\r\n\r\noops!";
const GARBAGE: &str = "HTTP/1.1 200 OK\r\nContent-Length: 8\r\n\r\nnot json";

/// Accept one connection, read the request until the terminating chunk,
/// reply with `response`, close.
async fn spawn_scanner(response: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request.ends_with(b"0\r\n\r\n") {
                break;
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    port
}

fn config(port: u16, raise_on_virus: bool) -> Config {
    Config {
        scanner: ScannerConfig {
            username: Some("scan".to_string()),
            password: Some("secret".to_string()),
            domain: Some("127.0.0.1".to_string()),
            port: Some(port),
            path: "/v2/scan-chunked".to_string(),
            use_http: true,
            ignore_extensions: HashSet::new(),
            timeout_secs: 5,
        },
        store: StoreConfig {
            root_prefix: "attachments/".to_string(),
            raise_on_virus,
            part_workers: 4,
            ..StoreConfig::default()
        },
    }
}

struct Harness {
    store: MemoryObjectStore,
    scan_log: Arc<MemoryScanLog>,
    uploader: Uploader,
    registry: VerdictRegistry,
}

fn harness(config: Config) -> Harness {
    let store = MemoryObjectStore::new();
    let scan_log = Arc::new(MemoryScanLog::new());
    let scan_log_dyn: Arc<dyn ScanLog> = scan_log.clone();
    let uploader = Uploader::new(Arc::new(store.clone()), scan_log_dyn, config);
    Harness {
        store,
        scan_log,
        uploader,
        registry: VerdictRegistry::new(),
    }
}

async fn upload(
    h: &Harness,
    file_name: &str,
    chunks: &[Bytes],
) -> Result<UploadOutcome, UploadError> {
    let mut session = h
        .uploader
        .begin_file("attachment", file_name, "application/octet-stream", None)
        .await?;
    let mut total = 0u64;
    for chunk in chunks {
        total += chunk.len() as u64;
        let echoed = session.on_chunk(chunk.clone()).await?;
        assert_eq!(echoed, *chunk);
    }
    session.end(total, &h.registry).await
}

#[tokio::test]
async fn clean_upload_is_stored_and_tagged() {
    let port = spawn_scanner(CLEAN).await;
    let h = harness(config(port, true));

    let chunks = vec![
        Bytes::from(vec![b'a'; 4 * 1024 * 1024]),
        Bytes::from(vec![b'b'; 4 * 1024 * 1024]),
        Bytes::from(vec![b'c'; 1024 * 1024]),
    ];
    let outcome = upload(&h, "report.txt", &chunks).await.unwrap();

    let stored = outcome.validate().unwrap();
    assert!(stored.key.starts_with("attachments/report_"));
    assert!(stored.key.ends_with(".txt"));
    assert_eq!(stored.size, 9 * 1024 * 1024);
    assert_eq!(stored.original_name, "report.txt");

    // 4 MiB + 4 MiB crosses the 5 MiB threshold into part 1; the last
    // MiB becomes part 2 at end-of-stream.
    assert_eq!(h.store.part_uploads(), 2);
    assert_eq!(h.store.object(&stored.key).unwrap().len(), 9 * 1024 * 1024);

    let metadata = h.store.metadata(&stored.key).unwrap();
    assert_eq!(metadata.get("av-passed").map(String::as_str), Some("True"));
    assert!(metadata.contains_key("av-scanned-at"));

    // Only the promoted object remains.
    assert_eq!(h.store.keys(), vec![stored.key.clone()]);
    assert_eq!(h.store.open_multiparts(), 0);

    let records = h.scan_log.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].av_passed);
    assert_eq!(records[0].file_name, "report.txt");
}

#[tokio::test]
async fn exempt_extension_skips_scanner() {
    // No scanner running; an exempt extension must never try to connect.
    let mut config = config(1, true);
    config.scanner.ignore_extensions.insert(".pdf".to_string());
    let h = harness(config);

    let outcome = upload(&h, "brochure.pdf", &[Bytes::from_static(b"%PDF-1.4")])
        .await
        .unwrap();

    let stored = outcome.validate().unwrap();
    assert!(h.store.contains(&stored.key));
    // No verdict, no tagging pass.
    assert!(h.store.metadata(&stored.key).unwrap().is_empty());
    assert!(h.scan_log.records().is_empty());
}

#[tokio::test]
async fn infected_upload_raises_when_strict() {
    let port = spawn_scanner(INFECTED).await;
    let h = harness(config(port, true));

    let err = upload(&h, "invoice.exe", &[Bytes::from_static(b"MZ payload")])
        .await
        .unwrap_err();
    assert!(err.is_virus_found());

    // Nothing survives: the finalized object is deleted along with the
    // working copy.
    assert!(h.store.keys().is_empty());
    assert_eq!(h.store.open_multiparts(), 0);

    let verdict = h.registry.latest("invoice.exe").unwrap();
    assert!(!verdict.passed);
    assert_eq!(verdict.reason.as_deref(), Some("Win.Test.EICAR_HDB-1"));

    let records = h.scan_log.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].av_passed);
    assert_eq!(records[0].av_reason.as_deref(), Some("Win.Test.EICAR_HDB-1"));
}

#[tokio::test]
async fn infected_upload_is_rejected_when_lenient() {
    let port = spawn_scanner(INFECTED).await;
    let h = harness(config(port, false));

    let outcome = upload(&h, "invoice.exe", &[Bytes::from_static(b"MZ payload")])
        .await
        .unwrap();

    assert!(outcome.is_rejected());
    let poisoned = match outcome {
        UploadOutcome::Rejected(poisoned) => poisoned,
        UploadOutcome::Stored(_) => panic!("expected rejection"),
    };
    assert_eq!(poisoned.file_name(), "invoice.exe");
    assert_eq!(poisoned.field_name(), "attachment");
    assert!(poisoned.open().unwrap_err().is_virus_found());
    assert!(poisoned.read().unwrap_err().is_virus_found());

    assert!(h.store.keys().is_empty());
    assert_eq!(h.store.open_multiparts(), 0);
}

#[tokio::test]
async fn scanner_error_response_fails_the_upload() {
    let port = spawn_scanner(SERVER_ERROR).await;
    let h = harness(config(port, true));

    let err = upload(&h, "report.txt", &[Bytes::from_static(b"hello")])
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Av(_)));

    // Aborted, nothing stored.
    assert!(h.store.keys().is_empty());
    assert_eq!(h.store.open_multiparts(), 0);

    let records = h.scan_log.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].av_passed);
    assert_eq!(
        records[0].av_reason.as_deref(),
        Some("Non 200 response from AV server")
    );
}

#[tokio::test]
async fn malformed_scanner_response_fails_the_upload() {
    let port = spawn_scanner(GARBAGE).await;
    let h = harness(config(port, true));

    let err = upload(&h, "report.txt", &[Bytes::from_static(b"hello")])
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Av(_)));

    assert!(h.store.keys().is_empty());
    assert_eq!(h.store.open_multiparts(), 0);
    assert_eq!(
        h.scan_log.records()[0].av_reason.as_deref(),
        Some("Malformed response from AV server")
    );
}

#[tokio::test]
async fn failed_part_aborts_the_multipart_upload() {
    let port = spawn_scanner(CLEAN).await;
    let h = harness(config(port, true));
    h.store.fail_part(1);

    let err = upload(&h, "report.txt", &[Bytes::from_static(b"hello")])
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Store(_)));

    assert!(h.store.keys().is_empty());
    assert_eq!(h.store.open_multiparts(), 0);
}

#[tokio::test]
async fn scanner_connection_loss_mid_stream_aborts_the_upload() {
    // Accept the connection, then drop it before any chunk arrives. A
    // chunk write onto the dead stream must error and abort the multipart.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let h = harness(config(port, true));
    let mut session = h
        .uploader
        .begin_file("attachment", "report.txt", "text/plain", None)
        .await
        .unwrap();

    // The first write lands in the socket buffer before the peer's reset
    // is observed; keep writing until the broken stream surfaces.
    let mut failure = None;
    for _ in 0..50 {
        match session.on_chunk(Bytes::from(vec![b'x'; 64 * 1024])).await {
            Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let err = failure.expect("writes to a dead scanner connection kept succeeding");
    assert!(matches!(err, UploadError::Av(_)));
    assert_eq!(h.store.open_multiparts(), 0);
    assert!(h.store.keys().is_empty());
}

#[tokio::test]
async fn missing_scanner_settings_fail_before_any_store_call() {
    let mut config = config(1, true);
    config.scanner.username = None;
    let h = harness(config);

    let err = h
        .uploader
        .begin_file("attachment", "report.txt", "text/plain", None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, UploadError::Config(_)));
    assert_eq!(h.store.open_multiparts(), 0);
}

#[tokio::test]
async fn empty_stream_still_stores_an_object() {
    let port = spawn_scanner(CLEAN).await;
    let h = harness(config(port, true));

    let outcome = upload(&h, "empty.txt", &[]).await.unwrap();
    let stored = outcome.validate().unwrap();
    assert_eq!(stored.size, 0);
    assert_eq!(h.store.object(&stored.key).unwrap().len(), 0);
    assert_eq!(h.store.part_uploads(), 1);
}
