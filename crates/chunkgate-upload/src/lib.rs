//! Chunkgate Upload Library
//!
//! The chunk-relay / dual-consumer pipeline. An [`Uploader`] registers a new
//! [`UploadSession`] per host-level file upload; the session fans each
//! incoming chunk out to the streaming antivirus client and the concurrent
//! part-buffer uploader, and on end-of-stream finalizes the stored object
//! against the scan verdict: tagged clean, deleted and rejected, or aborted.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use bytes::Bytes;
//! # use chunkgate_core::{Config, JsonlScanLog, VerdictRegistry};
//! # use chunkgate_storage::S3ObjectStore;
//! # use chunkgate_upload::{UploadOutcome, Uploader};
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env();
//! let store = Arc::new(S3ObjectStore::from_config(&config.store).await?);
//! let scan_log = Arc::new(JsonlScanLog::new("scans.jsonl"));
//! let uploader = Uploader::new(store, scan_log, config);
//!
//! let registry = VerdictRegistry::new();
//! let mut session = uploader
//!     .begin_file("attachment", "report.txt", "text/plain", None)
//!     .await?;
//! session.on_chunk(Bytes::from_static(b"hello")).await?;
//! match session.end(5, &registry).await? {
//!     UploadOutcome::Stored(object) => println!("stored at {}", object.key),
//!     UploadOutcome::Rejected(file) => println!("virus found in {}", file.file_name()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
mod finalizer;
pub mod outcome;
pub mod parts;
pub mod session;

// Re-export commonly used types
pub use error::UploadError;
pub use outcome::{PoisonedFile, StoredObject, UploadOutcome};
pub use parts::PartBufferUploader;
pub use session::{UploadSession, Uploader};
