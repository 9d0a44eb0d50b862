//! Key generation for working and final object keys.
//!
//! Working keys are transient and carry a UUID so concurrent uploads never
//! collide. Final keys are user-facing: root prefix + sanitized file stem +
//! timestamp + original extension.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Transient key an upload is assembled under. Never exposed to end users.
pub fn working_key() -> String {
    format!("chunk_upload_{}", Uuid::new_v4())
}

/// User-facing key a finalized object is promoted to.
///
/// `root_prefix` is expected to be empty or `/`-terminated (config
/// normalizes it). The file name is stripped of any path components before
/// use so a hostile `../` name cannot escape the prefix.
pub fn final_key(root_prefix: &str, file_name: &str, now: DateTime<Utc>) -> String {
    let name = sanitize_file_name(file_name);
    let (stem, extension) = split_extension(&name);
    let time_stamp = now.format("%Y%m%d%H%M%S");
    format!("{}{}_{}{}", root_prefix, stem, time_stamp, extension)
}

/// The extension of a file name, with leading dot (e.g. `.txt`), or the
/// empty string when there is none.
pub fn extension_of(file_name: &str) -> String {
    let name = sanitize_file_name(file_name);
    split_extension(&name).1.to_string()
}

fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .to_string()
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        // A leading dot is a hidden file, not an extension.
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap()
    }

    #[test]
    fn working_keys_are_unique() {
        assert_ne!(working_key(), working_key());
        assert!(working_key().starts_with("chunk_upload_"));
    }

    #[test]
    fn final_key_embeds_timestamp_between_stem_and_extension() {
        assert_eq!(
            final_key("uploads/", "report.pdf", at()),
            "uploads/report_20240305102030.pdf"
        );
        assert_eq!(final_key("", "notes", at()), "notes_20240305102030");
    }

    #[test]
    fn final_key_strips_path_components() {
        assert_eq!(
            final_key("uploads/", "../../etc/passwd.txt", at()),
            "uploads/passwd_20240305102030.txt"
        );
        assert_eq!(
            final_key("", "C:\\temp\\dump.bin", at()),
            "dump_20240305102030.bin"
        );
    }

    #[test]
    fn extension_handling() {
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".hidden"), "");
    }
}
