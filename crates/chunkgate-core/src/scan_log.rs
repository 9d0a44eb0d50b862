//! Append-only log of scan outcomes.
//!
//! Every scan attempt produces exactly one record, including failed and
//! malformed exchanges, so scanner failures stay observable even when no
//! usable verdict exists.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// One persisted scan outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scanned_at: DateTime<Utc>,
    pub file_name: String,
    pub av_passed: bool,
    pub av_reason: Option<String>,
}

/// Append-only sink for scan records.
#[async_trait]
pub trait ScanLog: Send + Sync {
    async fn append(&self, record: ScanRecord) -> anyhow::Result<()>;
}

/// File-backed scan log, one JSON record per line.
pub struct JsonlScanLog {
    path: PathBuf,
}

impl JsonlScanLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ScanLog for JsonlScanLog {
    async fn append(&self, record: ScanRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        Ok(())
    }
}

/// In-memory scan log for tests.
#[derive(Default)]
pub struct MemoryScanLog {
    records: Mutex<Vec<ScanRecord>>,
}

impl MemoryScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ScanRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanLog for MemoryScanLog {
    async fn append(&self, record: ScanRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}
