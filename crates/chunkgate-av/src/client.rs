//! Streaming scanner client.
//!
//! One client per upload session. The connection is opened and the request
//! head (declaring `Transfer-Encoding: chunked`) is written before any chunk
//! arrives; each host chunk then becomes one chunked-transfer segment. The
//! exchange is deliberately synchronous with respect to the session's
//! control flow: writes block the chunk path, and `finish` blocks until the
//! verdict response is read.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chunkgate_core::ScannerEndpoint;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::TlsStream;

use crate::response::{self, ScanResponse};
use crate::AvError;

enum ScannerStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ScannerStream {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            ScannerStream::Plain(stream) => stream.write_all(buf).await,
            ScannerStream::Tls(stream) => stream.write_all(buf).await,
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            ScannerStream::Plain(stream) => stream.flush().await,
            ScannerStream::Tls(stream) => stream.flush().await,
        }
    }

    async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        match self {
            ScannerStream::Plain(stream) => stream.read_to_end(buf).await,
            ScannerStream::Tls(stream) => stream.read_to_end(buf).await,
        }
    }
}

/// Streaming antivirus protocol adapter: turns an unbounded chunk sequence
/// into a single chunked-transfer HTTP exchange.
pub struct AvStreamClient {
    stream: ScannerStream,
    timeout: Duration,
}

impl AvStreamClient {
    /// Open the scanner connection and send the request head. Fails fast:
    /// an upload that requires scanning cannot proceed without a scanner
    /// connection.
    pub async fn connect(
        endpoint: &ScannerEndpoint,
        content_type: &str,
    ) -> Result<Self, AvError> {
        let io_timeout = Duration::from_secs(endpoint.timeout_secs);

        let tcp = timeout(
            io_timeout,
            TcpStream::connect((endpoint.domain.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| AvError::Service("timed out connecting to antivirus service".into()))?
        .map_err(|e| {
            tracing::error!(
                error = %e,
                domain = %endpoint.domain,
                port = endpoint.port,
                "Error connecting to antivirus service"
            );
            AvError::Service(format!("error connecting to antivirus service: {}", e))
        })?;

        let stream = if endpoint.use_http {
            tracing::warn!(
                domain = %endpoint.domain,
                "Scanner connection is plaintext HTTP; do not use in production"
            );
            ScannerStream::Plain(tcp)
        } else {
            let connector = native_tls::TlsConnector::new()
                .map_err(|e| AvError::Service(format!("TLS setup failed: {}", e)))?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tls = timeout(io_timeout, connector.connect(&endpoint.domain, tcp))
                .await
                .map_err(|_| {
                    AvError::Service("timed out during TLS handshake with antivirus service".into())
                })?
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        domain = %endpoint.domain,
                        "TLS handshake with antivirus service failed"
                    );
                    AvError::Service(format!("TLS handshake failed: {}", e))
                })?;
            ScannerStream::Tls(Box::new(tls))
        };

        let credentials =
            BASE64.encode(format!("{}:{}", endpoint.username, endpoint.password));
        let head = format!(
            "POST {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: {}\r\n\
             Authorization: Basic {}\r\n\
             Transfer-Encoding: chunked\r\n\
             Connection: close\r\n\
             \r\n",
            endpoint.path, endpoint.domain, content_type, credentials
        );

        let mut client = Self {
            stream,
            timeout: io_timeout,
        };
        client.write(head.as_bytes()).await?;

        Ok(client)
    }

    /// Relay one host chunk as a single chunked-transfer segment:
    /// `<hex length>\r\n<bytes>\r\n`.
    pub async fn send_chunk(&mut self, data: &[u8]) -> Result<(), AvError> {
        // A zero-length segment would terminate the body early.
        if data.is_empty() {
            return Ok(());
        }

        let mut frame = Vec::with_capacity(data.len() + 16);
        frame.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
        frame.extend_from_slice(data);
        frame.extend_from_slice(b"\r\n");

        self.write(&frame).await
    }

    /// Terminate the stream and read the scanner's response. This is the
    /// one designed suspension point of the exchange.
    pub async fn finish(mut self) -> Result<ScanResponse, AvError> {
        self.write(b"0\r\n\r\n").await?;
        self.stream
            .flush()
            .await
            .map_err(|e| AvError::Service(format!("error writing to antivirus service: {}", e)))?;

        let mut raw = Vec::new();
        timeout(self.timeout, self.stream.read_to_end(&mut raw))
            .await
            .map_err(|_| {
                AvError::Service("timed out waiting for antivirus service response".into())
            })?
            .map_err(|e| {
                AvError::Service(format!("error reading antivirus service response: {}", e))
            })?;

        response::parse(&raw)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), AvError> {
        timeout(self.timeout, self.stream.write_all(buf))
            .await
            .map_err(|_| AvError::Service("timed out writing to antivirus service".into()))?
            .map_err(|e| AvError::Service(format!("error writing to antivirus service: {}", e)))
    }
}
