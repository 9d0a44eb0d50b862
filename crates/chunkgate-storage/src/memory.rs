//! In-memory object store.
//!
//! Backs the test suites and local development. Multipart state is tracked
//! per upload id; completion assembles parts in the order of the supplied
//! part list, which is how the real control plane behaves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::traits::{ObjectStore, StorageError, StorageResult, UploadedPart};

#[derive(Debug, Clone)]
struct StoredEntry {
    data: Vec<u8>,
    content_type: String,
    metadata: HashMap<String, String>,
}

#[derive(Debug)]
struct MultipartState {
    key: String,
    content_type: String,
    parts: HashMap<i32, Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, StoredEntry>,
    multiparts: HashMap<String, MultipartState>,
    fail_parts: Vec<i32>,
    next_upload_id: u64,
    part_uploads: usize,
}

/// In-memory [`ObjectStore`] implementation. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the upload of `part_number` fail, for failure-path tests.
    pub fn fail_part(&self, part_number: i32) {
        self.inner.lock().unwrap().fail_parts.push(part_number);
    }

    /// Object bytes, for test assertions.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|entry| entry.data.clone())
    }

    /// Object metadata, for test assertions.
    pub fn metadata(&self, key: &str) -> Option<HashMap<String, String>> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|entry| entry.metadata.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().objects.contains_key(key)
    }

    /// Number of multipart uploads still in progress (neither completed nor
    /// aborted).
    pub fn open_multiparts(&self) -> usize {
        self.inner.lock().unwrap().multiparts.len()
    }

    /// Total number of part uploads attempted, successful or not.
    pub fn part_uploads(&self) -> usize {
        self.inner.lock().unwrap().part_uploads
    }

    /// Keys of every stored object, for test assertions.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().objects.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_upload_id += 1;
        let upload_id = format!("upload-{}", inner.next_upload_id);
        inner.multiparts.insert(
            upload_id.clone(),
            MultipartState {
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.part_uploads += 1;
        if inner.fail_parts.contains(&part_number) {
            return Err(StorageError::PartUploadFailed(format!(
                "injected failure for part {}",
                part_number
            )));
        }
        let multipart = inner
            .multiparts
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;
        let e_tag = format!("\"{}-{}\"", part_number, body.len());
        multipart.parts.insert(part_number, body.to_vec());
        Ok(e_tag)
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let multipart = inner
            .multiparts
            .remove(upload_id)
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;

        let mut data = Vec::new();
        for part in parts {
            let body = multipart.parts.get(&part.part_number).ok_or_else(|| {
                StorageError::CompleteFailed(format!("unknown part {}", part.part_number))
            })?;
            data.extend_from_slice(body);
        }

        inner.objects.insert(
            key.to_string(),
            StoredEntry {
                data,
                content_type: multipart.content_type,
                metadata: HashMap::new(),
            },
        );
        debug_assert_eq!(key, multipart.key);
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .multiparts
            .remove(upload_id)
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        from_key: &str,
        to_key: &str,
        content_type: &str,
        metadata: Option<&HashMap<String, String>>,
    ) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let mut entry = inner
            .objects
            .get(from_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(from_key.to_string()))?;
        entry.content_type = content_type.to_string();
        if let Some(metadata) = metadata {
            entry.metadata = metadata.clone();
        }
        inner.objects.insert(to_key.to_string(), entry);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .objects
            .remove(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(())
    }
}
