//! Artifact naming
//!
//! Artifacts are named `<subject>_<YYYYmmdd_HHMMSS>_complete_data.zip`. When a
//! file of that name already exists, `_1`, `_2`, ... is appended to the stem.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Suffix appended after subject and timestamp
pub const ARTIFACT_SUFFIX: &str = "complete_data";

/// Artifact file extension
pub const ARTIFACT_EXTENSION: &str = "zip";

/// Subject used when the configured one sanitises to nothing
const FALLBACK_SUBJECT: &str = "report";

/// Replace characters that are awkward in file names with `_`
pub fn sanitize_subject(subject: &str) -> String {
    let cleaned: String = subject
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        FALLBACK_SUBJECT.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Base artifact file name
pub fn artifact_file_name(subject: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.{}",
        sanitize_subject(subject),
        generated_at.format("%Y%m%d_%H%M%S"),
        ARTIFACT_SUFFIX,
        ARTIFACT_EXTENSION
    )
}

/// Candidate path for the `attempt`-th try; attempt 0 is the base name
pub fn candidate_path(dir: &Path, file_name: &str, attempt: usize) -> PathBuf {
    if attempt == 0 {
        return dir.join(file_name);
    }
    let stem = file_name
        .strip_suffix(&format!(".{ARTIFACT_EXTENSION}"))
        .unwrap_or(file_name);
    dir.join(format!("{stem}_{attempt}.{ARTIFACT_EXTENSION}"))
}
