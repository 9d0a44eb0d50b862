//! Concurrent part-buffer uploader.
//!
//! Chunks accumulate in an in-memory queue until the store's minimum part
//! size is exceeded, at which point the queue is drained into one part and
//! its upload dispatched to a bounded worker pool. Part numbers are
//! assigned at cut time by the single sequential chunk-delivery caller, so
//! numbering is race-free no matter how uploads are scheduled.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chunkgate_storage::{ObjectStore, StorageError, StorageResult, UploadedPart};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

struct PendingPart {
    part_number: i32,
    handle: JoinHandle<StorageResult<UploadedPart>>,
}

pub struct PartBufferUploader {
    store: Arc<dyn ObjectStore>,
    key: String,
    upload_id: String,
    min_part_size: usize,
    queue: Vec<Bytes>,
    queued_bytes: usize,
    next_part_number: i32,
    limiter: Arc<Semaphore>,
    pending: Vec<PendingPart>,
    finished: bool,
    resolved: Option<StorageResult<Vec<UploadedPart>>>,
}

impl PartBufferUploader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        key: String,
        upload_id: String,
        min_part_size: usize,
        workers: usize,
    ) -> Self {
        Self {
            store,
            key,
            upload_id,
            min_part_size,
            queue: Vec::new(),
            queued_bytes: 0,
            next_part_number: 1,
            limiter: Arc::new(Semaphore::new(workers.max(1))),
            pending: Vec::new(),
            finished: false,
            resolved: None,
        }
    }

    /// Buffer one chunk, cutting a part once the queue exceeds the minimum
    /// part size. Dispatch is fire-and-forget; failures surface at
    /// [`parts`](Self::parts).
    pub fn add(&mut self, chunk: Bytes) {
        debug_assert!(!self.finished, "add after end-of-stream");
        self.queued_bytes += chunk.len();
        self.queue.push(chunk);
        if self.queued_bytes > self.min_part_size {
            self.cut_part();
        }
    }

    /// Apply end-of-stream: cut the final part even below the minimum size.
    /// The store requires at least one part, so an upload with no bytes and
    /// no parts still cuts one empty part; a drained queue with parts
    /// already dispatched cuts nothing.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if !self.queue.is_empty() || self.next_part_number == 1 {
            self.cut_part();
        }
    }

    /// Join-all barrier: wait for every dispatched part, then return
    /// `{partNumber, eTag}` pairs in creation order (numeric part order).
    /// Idempotent after the first resolution, success or failure.
    pub async fn parts(&mut self) -> StorageResult<Vec<UploadedPart>> {
        debug_assert!(self.finished, "parts before end-of-stream");
        if let Some(resolved) = &self.resolved {
            return resolved.clone();
        }

        let mut parts = Vec::with_capacity(self.pending.len());
        let mut failure: Option<StorageError> = None;

        // Every task is awaited even after a failure; siblings may be
        // abandoned by the caller but must not be left running into an
        // aborted upload.
        for pending in self.pending.drain(..) {
            match pending.handle.await {
                Ok(Ok(part)) => parts.push(part),
                Ok(Err(e)) => {
                    tracing::error!(
                        part_number = pending.part_number,
                        error = %e,
                        "Part upload failed"
                    );
                    failure.get_or_insert(e);
                }
                Err(join_error) => {
                    failure.get_or_insert(StorageError::PartUploadFailed(format!(
                        "part {} upload task failed: {}",
                        pending.part_number, join_error
                    )));
                }
            }
        }

        if let Some(e) = failure {
            self.resolved = Some(Err(e.clone()));
            return Err(e);
        }

        self.resolved = Some(Ok(parts.clone()));
        Ok(parts)
    }

    fn cut_part(&mut self) {
        let part_number = self.next_part_number;
        self.next_part_number += 1;

        let payload = self.drain_queue();
        let size = payload.len();

        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let upload_id = self.upload_id.clone();
        let limiter = Arc::clone(&self.limiter);

        let handle = tokio::spawn(async move {
            let _permit = limiter
                .acquire_owned()
                .await
                .map_err(|_| StorageError::PartUploadFailed("upload worker pool closed".into()))?;
            let e_tag = store.upload_part(&key, &upload_id, part_number, payload).await?;
            Ok(UploadedPart { part_number, e_tag })
        });

        tracing::debug!(part_number, size_bytes = size, "Prepared part");
        self.pending.push(PendingPart {
            part_number,
            handle,
        });
    }

    fn drain_queue(&mut self) -> Bytes {
        self.queued_bytes = 0;
        if self.queue.len() == 1 {
            return self.queue.pop().unwrap();
        }
        let mut payload = BytesMut::new();
        for chunk in self.queue.drain(..) {
            payload.extend_from_slice(&chunk);
        }
        payload.freeze()
    }
}
