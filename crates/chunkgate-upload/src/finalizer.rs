//! Upload finalization.
//!
//! Runs at end-of-stream, after the scanner exchange has resolved: joins
//! the part uploads, completes the multipart upload, promotes the object
//! from its working key to the final key, and applies the verdict — tag
//! clean, or delete and reject per policy.

use std::collections::HashMap;
use std::sync::Arc;

use chunkgate_core::VerdictRegistry;
use chunkgate_storage::ObjectStore;

use crate::error::UploadError;
use crate::outcome::{PoisonedFile, StoredObject, UploadOutcome};
use crate::parts::PartBufferUploader;

pub(crate) struct UploadFinalizer {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) working_key: String,
    pub(crate) final_key: String,
    pub(crate) upload_id: String,
    pub(crate) content_type: String,
    pub(crate) file_name: String,
    pub(crate) field_name: String,
    pub(crate) size: u64,
    pub(crate) raise_on_virus: bool,
}

impl UploadFinalizer {
    pub(crate) async fn run(
        self,
        part_uploader: &mut PartBufferUploader,
        registry: &VerdictRegistry,
    ) -> Result<UploadOutcome, UploadError> {
        part_uploader.finish();

        let parts = match part_uploader.parts().await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(error = %e, key = %self.working_key, "Aborting multipart upload");
                self.abort().await;
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .store
            .complete_multipart_upload(&self.working_key, &self.upload_id, &parts)
            .await
        {
            self.abort().await;
            return Err(e.into());
        }

        // Promote to the user-facing key; the working key is never exposed.
        self.store
            .copy_object(&self.working_key, &self.final_key, &self.content_type, None)
            .await?;
        self.store.delete_object(&self.working_key).await?;

        match registry.latest(&self.file_name) {
            // AV skipped or never invoked: nothing to enforce.
            None => Ok(UploadOutcome::Stored(self.stored_object())),
            Some(verdict) if verdict.passed => {
                // Metadata-only replace; the copy source is the object itself.
                let metadata: HashMap<String, String> = [
                    (
                        "av-scanned-at".to_string(),
                        verdict.scanned_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ),
                    ("av-passed".to_string(), "True".to_string()),
                ]
                .into();
                self.store
                    .copy_object(
                        &self.final_key,
                        &self.final_key,
                        &self.content_type,
                        Some(&metadata),
                    )
                    .await?;
                Ok(UploadOutcome::Stored(self.stored_object()))
            }
            Some(_) => {
                // Never leave a flagged object reachable.
                self.store.delete_object(&self.final_key).await?;
                if self.raise_on_virus {
                    Err(UploadError::VirusFound {
                        file_name: self.file_name,
                    })
                } else {
                    Ok(UploadOutcome::Rejected(PoisonedFile::new(
                        &self.field_name,
                        &self.file_name,
                    )))
                }
            }
        }
    }

    fn stored_object(&self) -> StoredObject {
        StoredObject {
            key: self.final_key.clone(),
            content_type: self.content_type.clone(),
            size: self.size,
            original_name: self.file_name.clone(),
        }
    }

    async fn abort(&self) {
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
