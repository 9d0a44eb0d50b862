//! Verdict parsing.
//!
//! The scanner's success response is a JSON object with a required
//! `malware: bool` field and an optional `reason` present on detection.
//! Non-200 statuses and missing `malware` are protocol violations; an
//! actual detection is a valid outcome, not an error, so the caller can
//! record it and defer policy to finalization.

use serde::Deserialize;

use crate::response::ScanResponse;
use crate::AvError;

#[derive(Debug, Deserialize)]
struct VerdictBody {
    malware: Option<bool>,
    reason: Option<String>,
}

/// Parsed scanner determination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Clean,
    Infected { reason: String },
}

pub fn parse_verdict(response: &ScanResponse) -> Result<ScanOutcome, AvError> {
    if response.status != 200 {
        return Err(AvError::Service(format!(
            "non 200 response from anti virus service, content: {}",
            String::from_utf8_lossy(&response.body)
        )));
    }

    let body: VerdictBody = serde_json::from_slice(&response.body)
        .map_err(|e| AvError::MalformedResponse(format!("invalid verdict body: {}", e)))?;

    match body.malware {
        None => Err(AvError::MalformedResponse(
            "response is missing the 'malware' field".into(),
        )),
        Some(true) => Ok(ScanOutcome::Infected {
            reason: body.reason.unwrap_or_else(|| "unknown".into()),
        }),
        Some(false) => Ok(ScanOutcome::Clean),
    }
}
