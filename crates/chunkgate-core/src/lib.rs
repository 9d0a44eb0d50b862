//! Chunkgate Core Library
//!
//! Shared types for the chunked-upload pipeline: configuration, the
//! scan-verdict model, the request-scoped verdict registry, and the
//! append-only scan-result log.

pub mod config;
pub mod constants;
pub mod scan_log;
pub mod verdict;

// Re-export commonly used types
pub use config::{Config, MissingSetting, ScannerConfig, ScannerEndpoint, StoreConfig};
pub use scan_log::{JsonlScanLog, MemoryScanLog, ScanLog, ScanRecord};
pub use verdict::{ScanVerdict, VerdictRegistry};
