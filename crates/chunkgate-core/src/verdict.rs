//! Scan verdicts and the request-scoped verdict registry.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The scanner's determination for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub file_name: String,
    pub passed: bool,
    /// Service-supplied reason, present when the file was rejected.
    pub reason: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

/// Request-scoped side channel carrying verdicts from the scanner path to
/// the finalizer path (and to any downstream host-chain stage).
///
/// Keyed by file name; a request may process the same file name more than
/// once, so each entry is a list that is appended to, never replaced. The
/// registry is only valid for the lifetime of the enclosing request and is
/// threaded through finalization explicitly rather than held as ambient
/// shared state.
#[derive(Debug, Default)]
pub struct VerdictRegistry {
    entries: Mutex<HashMap<String, Vec<ScanVerdict>>>,
}

impl VerdictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a verdict for a file. Written at most once per upload attempt.
    pub fn publish(&self, verdict: ScanVerdict) {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(verdict.file_name.clone())
            .or_default()
            .push(verdict);
    }

    /// The most recent verdict for a file, if any was published.
    pub fn latest(&self, file_name: &str) -> Option<ScanVerdict> {
        let entries = self.entries.lock().unwrap();
        entries.get(file_name).and_then(|list| list.last().cloned())
    }

    /// Every verdict published for a file, in publication order.
    pub fn all(&self, file_name: &str) -> Vec<ScanVerdict> {
        let entries = self.entries.lock().unwrap();
        entries.get(file_name).cloned().unwrap_or_default()
    }
}
