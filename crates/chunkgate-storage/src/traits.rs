//! Object-store abstraction trait
//!
//! This module defines the ObjectStore trait that all storage backends must
//! implement. The pipeline talks to the store exclusively through this
//! surface, so tests can run against the in-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Multipart create failed: {0}")]
    CreateFailed(String),

    #[error("Part upload failed: {0}")]
    PartUploadFailed(String),

    #[error("Multipart completion failed: {0}")]
    CompleteFailed(String),

    #[error("Multipart abort failed: {0}")]
    AbortFailed(String),

    #[error("Copy failed: {0}")]
    CopyFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One completed part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    /// 1-based part number, assigned before dispatch.
    pub part_number: i32,
    pub e_tag: String,
}

/// Object-store control plane.
///
/// Backends must honor the store-imposed minimum part size for every part
/// except the last, and must support a server-side copy so promotion to the
/// final key never re-uploads data.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Start a multipart upload at `key` and return the store-issued upload id.
    async fn create_multipart_upload(&self, key: &str, content_type: &str)
        -> StorageResult<String>;

    /// Upload one part and return its ETag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String>;

    /// Complete the multipart upload with the ordered part list.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()>;

    /// Abort the multipart upload so no partial object lingers.
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    /// Server-side copy. When `metadata` is given the destination's metadata
    /// is replaced wholesale (copying a key onto itself with metadata is the
    /// metadata-only tag step of finalization).
    async fn copy_object(
        &self,
        from_key: &str,
        to_key: &str,
        content_type: &str,
        metadata: Option<&HashMap<String, String>>,
    ) -> StorageResult<()>;

    /// Delete an object by key.
    async fn delete_object(&self, key: &str) -> StorageResult<()>;
}
