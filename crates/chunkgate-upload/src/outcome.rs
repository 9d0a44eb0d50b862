//! Finalization outcomes: the stored-object handle and the poisoned-file
//! sentinel.

use bytes::Bytes;

use crate::error::UploadError;

/// Handle to a finalized, user-visible object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Final, user-facing key.
    pub key: String,
    pub content_type: String,
    pub size: u64,
    /// File name as the host delivered it.
    pub original_name: String,
}

/// Result handle for a rejected upload under lenient policy. Carries no
/// data; every access fails with [`UploadError::VirusFound`] so a tolerant
/// host pipeline discovers the rejection lazily instead of crashing the
/// chunk-processing loop.
#[derive(Debug, Clone)]
pub struct PoisonedFile {
    field_name: String,
    file_name: String,
}

impl PoisonedFile {
    pub(crate) fn new(field_name: &str, file_name: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            file_name: file_name.to_string(),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn rejection(&self) -> UploadError {
        UploadError::VirusFound {
            file_name: self.file_name.clone(),
        }
    }

    pub fn open(&self) -> Result<StoredObject, UploadError> {
        Err(self.rejection())
    }

    pub fn read(&self) -> Result<Bytes, UploadError> {
        Err(self.rejection())
    }

    pub fn chunks(&self) -> Result<Vec<Bytes>, UploadError> {
        Err(self.rejection())
    }
}

/// What finalization handed back to the host.
#[derive(Debug)]
pub enum UploadOutcome {
    Stored(StoredObject),
    Rejected(PoisonedFile),
}

impl UploadOutcome {
    /// Treat a rejection as a validation failure. Mirrors probing the
    /// result before handing it to downstream form handling.
    pub fn validate(&self) -> Result<&StoredObject, UploadError> {
        match self {
            UploadOutcome::Stored(object) => Ok(object),
            UploadOutcome::Rejected(file) => Err(file.rejection()),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, UploadOutcome::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_file_fails_every_access_identically() {
        let file = PoisonedFile::new("attachment", "invoice.exe");

        assert!(file.open().unwrap_err().is_virus_found());
        assert!(file.read().unwrap_err().is_virus_found());
        assert!(file.chunks().unwrap_err().is_virus_found());
        assert_eq!(file.field_name(), "attachment");
    }

    #[test]
    fn validate_maps_rejection_to_virus_found() {
        let outcome = UploadOutcome::Rejected(PoisonedFile::new("attachment", "invoice.exe"));
        assert!(outcome.is_rejected());
        assert!(outcome.validate().unwrap_err().is_virus_found());
    }
}
