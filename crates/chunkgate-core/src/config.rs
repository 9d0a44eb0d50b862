//! Configuration module
//!
//! Env-var driven configuration for the scanner connection and the object
//! store. Required scanner settings that are absent at load time are logged
//! rather than raised, because the hosting framework may construct the
//! pipeline before settings are fully available. Their absence is enforced
//! with an explicit [`MissingSetting`] error the first time a scanner
//! connection is actually needed.

use std::collections::HashSet;
use std::env;

use crate::constants::{DEFAULT_PART_WORKERS, DEFAULT_SCAN_PATH, DEFAULT_SCAN_TIMEOUT_SECS};

/// A required setting was absent when it was first needed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot process file uploads, a required setting, '{0}', for a file upload handler is missing")]
pub struct MissingSetting(pub &'static str);

/// Scanner-side configuration.
#[derive(Clone, Debug, Default)]
pub struct ScannerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
    /// Explicit port override; defaults to 443 (TLS) or 80 (plaintext).
    pub port: Option<u16>,
    pub path: String,
    /// Plaintext HTTP toggle. Do not enable in production.
    pub use_http: bool,
    /// File extensions (with leading dot) exempt from scanning.
    pub ignore_extensions: HashSet<String>,
    pub timeout_secs: u64,
}

/// Fully resolved scanner connection parameters, produced by
/// [`ScannerConfig::require`] once an upload actually needs the scanner.
#[derive(Clone, Debug)]
pub struct ScannerEndpoint {
    pub username: String,
    pub password: String,
    pub domain: String,
    pub port: u16,
    pub path: String,
    pub use_http: bool,
    pub timeout_secs: u64,
}

impl ScannerConfig {
    /// Whether uploads with this extension skip the scanner entirely.
    /// Extensions carry their leading dot, matching `Path::extension`
    /// semantics of the ignore set as configured (e.g. `.pdf`).
    pub fn is_ignored(&self, extension: &str) -> bool {
        self.ignore_extensions.contains(extension)
    }

    /// Resolve the connection parameters, failing fast on any missing
    /// required setting.
    pub fn require(&self) -> Result<ScannerEndpoint, MissingSetting> {
        let username = self
            .username
            .clone()
            .ok_or(MissingSetting("CLAMAV_USERNAME"))?;
        let password = self
            .password
            .clone()
            .ok_or(MissingSetting("CLAMAV_PASSWORD"))?;
        let domain = self.domain.clone().ok_or(MissingSetting("CLAMAV_DOMAIN"))?;
        let port = self
            .port
            .unwrap_or(if self.use_http { 80 } else { 443 });

        Ok(ScannerEndpoint {
            username,
            password,
            domain,
            port,
            path: self.path.clone(),
            use_http: self.use_http,
            timeout_secs: self.timeout_secs,
        })
    }
}

/// Object-store configuration.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Root key prefix for finalized objects. Normalized to end with `/`
    /// when non-empty.
    pub root_prefix: String,
    /// Whether a detected virus fails the request instead of returning a
    /// poisoned-file sentinel.
    pub raise_on_virus: bool,
    pub part_workers: usize,
}

/// Application configuration for the upload pipeline.
#[derive(Clone, Debug)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub store: StoreConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let scanner = ScannerConfig {
            username: required_setting("CLAMAV_USERNAME", "CHUNKGATE_CLAMAV_USERNAME"),
            password: required_setting("CLAMAV_PASSWORD", "CHUNKGATE_CLAMAV_PASSWORD"),
            domain: required_setting("CLAMAV_DOMAIN", "CHUNKGATE_CLAMAV_DOMAIN"),
            port: env::var("CLAMAV_PORT").ok().and_then(|v| v.parse().ok()),
            path: env::var("CLAMAV_PATH").unwrap_or_else(|_| DEFAULT_SCAN_PATH.to_string()),
            use_http: env::var("CLAMAV_USE_HTTP")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            ignore_extensions: env::var("CLAMAV_IGNORE_EXTENSIONS")
                .map(|v| {
                    v.split(',')
                        .map(|e| e.trim().to_string())
                        .filter(|e| !e.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            timeout_secs: env::var("CLAMAV_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SCAN_TIMEOUT_SECS),
        };

        let store = StoreConfig {
            bucket: required_setting("S3_BUCKET", "CHUNKGATE_S3_BUCKET"),
            region: required_setting("S3_REGION", "AWS_REGION"),
            endpoint: env::var("S3_ENDPOINT").ok(),
            access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            root_prefix: normalize_prefix(
                env::var("S3_ROOT_PREFIX").unwrap_or_default().as_str(),
            ),
            raise_on_virus: env::var("RAISE_ON_VIRUS_FOUND")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            part_workers: env::var("PART_UPLOAD_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PART_WORKERS),
        };

        Config { scanner, store }
    }
}

/// Read a required setting, falling back to a secondary key. Absence is
/// logged at error level, never raised; the hosting framework may load
/// settings after this module is constructed.
fn required_setting(key: &'static str, secondary_key: &'static str) -> Option<String> {
    env::var(key).or_else(|_| env::var(secondary_key)).ok().or_else(|| {
        tracing::error!(
            setting = key,
            "cannot process file uploads, a required setting for a file upload handler is missing"
        );
        None
    })
}

fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_fails_on_missing_scanner_credentials() {
        let config = ScannerConfig {
            domain: Some("av.internal".to_string()),
            path: DEFAULT_SCAN_PATH.to_string(),
            ..Default::default()
        };
        let err = config.require().unwrap_err();
        assert!(err.to_string().contains("CLAMAV_USERNAME"));
    }

    #[test]
    fn require_resolves_default_ports() {
        let base = ScannerConfig {
            username: Some("scan".to_string()),
            password: Some("secret".to_string()),
            domain: Some("av.internal".to_string()),
            path: DEFAULT_SCAN_PATH.to_string(),
            timeout_secs: 30,
            ..Default::default()
        };

        assert_eq!(base.require().unwrap().port, 443);

        let plaintext = ScannerConfig {
            use_http: true,
            ..base
        };
        assert_eq!(plaintext.require().unwrap().port, 80);
    }

    #[test]
    fn ignored_extensions_match_with_leading_dot() {
        let config = ScannerConfig {
            ignore_extensions: [".pdf".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(config.is_ignored(".pdf"));
        assert!(!config.is_ignored(".exe"));
    }

    #[test]
    fn root_prefix_is_normalized() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("uploads"), "uploads/");
        assert_eq!(normalize_prefix("uploads/"), "uploads/");
    }
}
