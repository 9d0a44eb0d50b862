//! Unified error type for the upload pipeline.

use chunkgate_av::AvError;
use chunkgate_core::MissingSetting;
use chunkgate_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    /// A required setting was absent when first needed. Logged at load
    /// time; enforced here so the failure is explicit rather than a later
    /// broken call.
    #[error(transparent)]
    Config(#[from] MissingSetting),

    /// Scanner transport/protocol failure. The in-progress upload has been
    /// aborted.
    #[error(transparent)]
    Av(#[from] AvError),

    /// Object-store failure. The in-progress upload has been aborted.
    #[error(transparent)]
    Store(#[from] StorageError),

    /// The scanner flagged the file and policy is to fail the request.
    /// Also raised lazily by every data access on a poisoned file.
    #[error("Virus found in uploaded file '{file_name}'")]
    VirusFound { file_name: String },

    /// The scan-result log rejected an append.
    #[error("Failed to persist scan record: {0}")]
    ScanLog(#[from] anyhow::Error),
}

impl UploadError {
    pub fn is_virus_found(&self) -> bool {
        matches!(self, UploadError::VirusFound { .. })
    }
}
