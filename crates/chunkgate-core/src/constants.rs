//! Shared constants for the upload pipeline.

/// Store-imposed minimum size for every part except the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default number of concurrent part-upload workers.
pub const DEFAULT_PART_WORKERS: usize = 10;

/// Default scanner endpoint path.
pub const DEFAULT_SCAN_PATH: &str = "/v2/scan-chunked";

/// Default scanner exchange timeout in seconds.
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;
