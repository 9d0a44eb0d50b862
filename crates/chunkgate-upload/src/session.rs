//! Per-upload session lifecycle: the chunk relay.
//!
//! The host framework owns the byte stream and drives three entry points:
//! [`Uploader::begin_file`] when a new file starts, [`UploadSession::on_chunk`]
//! per chunk, and [`UploadSession::end`] at end-of-stream. Chunk delivery is
//! strictly sequential per session; the only parallelism is between the
//! scanner exchange and the background part uploads.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use chunkgate_av::{parse_verdict, AvError, AvStreamClient, ScanOutcome};
use chunkgate_core::constants::MIN_PART_SIZE;
use chunkgate_core::{Config, ScanLog, ScanRecord, ScanVerdict, VerdictRegistry};
use chunkgate_storage::{keys, ObjectStore};

use crate::error::UploadError;
use crate::finalizer::UploadFinalizer;
use crate::outcome::UploadOutcome;
use crate::parts::PartBufferUploader;

/// Registration point for upload sessions. One per process; holds the
/// store, the scan log, and configuration shared by every session.
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    scan_log: Arc<dyn ScanLog>,
    config: Config,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, scan_log: Arc<dyn ScanLog>, config: Config) -> Self {
        Self {
            store,
            scan_log,
            config,
        }
    }

    /// Start a session for one host-level file upload.
    ///
    /// Opens the scanner connection (unless the extension is exempt) and
    /// creates the multipart upload under a transient working key. A
    /// scanner connection failure fails the upload fast: it cannot proceed
    /// unscanned unless explicitly exempted.
    pub async fn begin_file(
        &self,
        field_name: &str,
        file_name: &str,
        content_type: &str,
        declared_size: Option<u64>,
    ) -> Result<UploadSession, UploadError> {
        let extension = keys::extension_of(file_name);
        let skip_av_check = self.config.scanner.is_ignored(&extension);

        let scanner = if skip_av_check {
            tracing::debug!(file_name, %extension, "Extension exempt from virus scanning");
            None
        } else {
            let endpoint = self.config.scanner.require()?;
            Some(AvStreamClient::connect(&endpoint, content_type).await?)
        };

        let working_key = keys::working_key();
        let final_key = keys::final_key(&self.config.store.root_prefix, file_name, Utc::now());
        let upload_id = self
            .store
            .create_multipart_upload(&working_key, content_type)
            .await?;

        let part_uploader = PartBufferUploader::new(
            Arc::clone(&self.store),
            working_key.clone(),
            upload_id.clone(),
            MIN_PART_SIZE,
            self.config.store.part_workers,
        );

        tracing::debug!(
            file_name,
            working_key = %working_key,
            final_key = %final_key,
            declared_size,
            skip_av_check,
            "Upload session started"
        );

        Ok(UploadSession {
            store: Arc::clone(&self.store),
            scan_log: Arc::clone(&self.scan_log),
            field_name: field_name.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            declared_size,
            working_key,
            final_key,
            upload_id,
            skip_av_check,
            scanner,
            part_uploader,
            raise_on_virus: self.config.store.raise_on_virus,
        })
    }
}

/// One in-flight upload: `Receiving` while chunks arrive, `Finalizing`
/// inside [`end`](Self::end), terminal in its result.
pub struct UploadSession {
    store: Arc<dyn ObjectStore>,
    scan_log: Arc<dyn ScanLog>,
    field_name: String,
    file_name: String,
    content_type: String,
    declared_size: Option<u64>,
    working_key: String,
    final_key: String,
    upload_id: String,
    skip_av_check: bool,
    scanner: Option<AvStreamClient>,
    part_uploader: PartBufferUploader,
    raise_on_virus: bool,
}

impl UploadSession {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The user-facing key the object will be promoted to on success.
    pub fn final_key(&self) -> &str {
        &self.final_key
    }

    pub fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    pub fn skip_av_check(&self) -> bool {
        self.skip_av_check
    }

    /// Relay one chunk: write it to the scanner connection (unless
    /// exempt), hand it to the part-buffer uploader, and return the same
    /// bytes unchanged — the host expects this hook not to alter data.
    pub async fn on_chunk(&mut self, chunk: Bytes) -> Result<Bytes, UploadError> {
        if let Some(scanner) = self.scanner.as_mut() {
            if let Err(e) = scanner.send_chunk(&chunk).await {
                tracing::error!(error = %e, file_name = %self.file_name, "Aborting upload");
                self.abort_multipart().await;
                return Err(e.into());
            }
        }

        self.part_uploader.add(chunk.clone());
        Ok(chunk)
    }

    /// Apply end-of-stream: resolve the scan verdict, then finalize the
    /// stored object against it.
    ///
    /// Reading the scanner's response blocks here by design; the part
    /// uploads keep running in the background meanwhile. Malware verdicts
    /// are recorded and deferred to finalization; transport and protocol
    /// errors abort the upload immediately.
    pub async fn end(
        mut self,
        total_size: u64,
        registry: &VerdictRegistry,
    ) -> Result<UploadOutcome, UploadError> {
        if let Some(scanner) = self.scanner.take() {
            if let Err(e) = self.finalize_scan(scanner, registry).await {
                self.abort_multipart().await;
                return Err(e);
            }
        }

        let finalizer = UploadFinalizer {
            store: Arc::clone(&self.store),
            working_key: self.working_key.clone(),
            final_key: self.final_key.clone(),
            upload_id: self.upload_id.clone(),
            content_type: self.content_type.clone(),
            file_name: self.file_name.clone(),
            field_name: self.field_name.clone(),
            size: total_size,
            raise_on_virus: self.raise_on_virus,
        };
        finalizer.run(&mut self.part_uploader, registry).await
    }

    async fn finalize_scan(
        &self,
        scanner: AvStreamClient,
        registry: &VerdictRegistry,
    ) -> Result<(), UploadError> {
        let scanned_at = Utc::now();

        let response = match scanner.finish().await {
            Ok(response) => response,
            Err(e) => {
                self.persist_scan(scanned_at, false, Some(e.to_string())).await?;
                return Err(e.into());
            }
        };

        match parse_verdict(&response) {
            Ok(ScanOutcome::Clean) => {
                self.persist_scan(scanned_at, true, None).await?;
                registry.publish(ScanVerdict {
                    file_name: self.file_name.clone(),
                    passed: true,
                    reason: None,
                    scanned_at,
                });
                Ok(())
            }
            Ok(ScanOutcome::Infected { reason }) => {
                tracing::error!(
                    file_name = %self.file_name,
                    reason = %reason,
                    "Malware found in user uploaded file, exiting upload process"
                );
                self.persist_scan(scanned_at, false, Some(reason.clone())).await?;
                registry.publish(ScanVerdict {
                    file_name: self.file_name.clone(),
                    passed: false,
                    reason: Some(reason),
                    scanned_at,
                });
                // Recorded and deferred; policy is applied once, at the
                // point the object would otherwise become visible.
                Ok(())
            }
            Err(e @ AvError::Service(_)) => {
                self.persist_scan(
                    scanned_at,
                    false,
                    Some("Non 200 response from AV server".to_string()),
                )
                .await?;
                Err(e.into())
            }
            Err(e @ AvError::MalformedResponse(_)) => {
                self.persist_scan(
                    scanned_at,
                    false,
                    Some("Malformed response from AV server".to_string()),
                )
                .await?;
                Err(e.into())
            }
        }
    }

    async fn persist_scan(
        &self,
        scanned_at: DateTime<Utc>,
        av_passed: bool,
        av_reason: Option<String>,
    ) -> Result<(), UploadError> {
        self.scan_log
            .append(ScanRecord {
                scanned_at,
                file_name: self.file_name.clone(),
                av_passed,
                av_reason,
            })
            .await?;
        Ok(())
    }

    /// Best-effort cleanup; the primary error is already propagating.
    async fn abort_multipart(&self) {
        if let Err(e) = self
            .store
            .abort_multipart_upload(&self.working_key, &self.upload_id)
            .await
        {
            tracing::error!(
                error = %e,
                key = %self.working_key,
                "Failed to abort multipart upload"
            );
        }
    }
}
