//! Chunkgate Antivirus Library
//!
//! Streaming wire client for the antivirus service. The client opens an
//! authenticated connection at upload start, relays each chunk as one
//! chunked-transfer segment while the upload is in flight, and reads a
//! single JSON verdict once the stream is terminated.

pub mod client;
pub mod response;
pub mod verdict;

use thiserror::Error;

/// Scanner exchange errors.
#[derive(Debug, Error)]
pub enum AvError {
    /// Transport failure or non-success status from the scanner. There is
    /// no usable verdict; the upload cannot proceed.
    #[error("Antivirus service error: {0}")]
    Service(String),

    /// The scanner replied 200 but without the expected verdict shape.
    /// Propagates like a service error, recorded distinctly for diagnostics.
    #[error("Malformed antivirus response: {0}")]
    MalformedResponse(String),
}

// Re-export commonly used types
pub use client::AvStreamClient;
pub use response::ScanResponse;
pub use verdict::{parse_verdict, ScanOutcome};
