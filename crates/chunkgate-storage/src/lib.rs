//! Chunkgate Storage Library
//!
//! Object-store abstraction for the upload pipeline. The trait covers only
//! the control-plane surface the pipeline needs: multipart create / part /
//! complete / abort, plus copy and delete for promotion and cleanup.
//!
//! # Key scheme
//!
//! Uploads land under a transient working key (`chunk_upload_{uuid}`) that
//! is never exposed to end users. Finalization copies the object to its
//! final key (root prefix + sanitized stem + timestamp + extension) and
//! deletes the working key. Key generation is centralized in the `keys`
//! module.

pub mod keys;
pub mod memory;
#[cfg(feature = "store-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use memory::MemoryObjectStore;
#[cfg(feature = "store-s3")]
pub use s3::S3ObjectStore;
pub use traits::{ObjectStore, StorageError, StorageResult, UploadedPart};
