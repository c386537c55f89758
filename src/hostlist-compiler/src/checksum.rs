//! Content checksum: SHA-256, Base64, truncated to 27 characters.
//!
//! The digest covers every line except existing `! Checksum:` lines, so
//! recomputing over an emitted list reproduces the embedded value.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Prefix of a checksum line.
pub const CHECKSUM_PREFIX: &str = "! Checksum: ";

/// Length of the truncated Base64 digest.
const CHECKSUM_LENGTH: usize = 27;

/// Compute the checksum of a rule list.
///
/// Existing checksum lines are excluded, making the value stable across
/// recomputation.
#[must_use]
pub fn calculate(lines: &[String]) -> String {
    let joined = lines
        .iter()
        .filter(|line| !line.starts_with(CHECKSUM_PREFIX))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    let digest = Sha256::digest(joined.as_bytes());
    let mut encoded = STANDARD.encode(digest);
    encoded.truncate(CHECKSUM_LENGTH);
    encoded
}

/// Insert a checksum line into a compiled list.
///
/// The line lands immediately before the `! Compiled by` line, or before
/// the first non-comment line when no such line exists.
#[must_use]
pub fn insert(mut lines: Vec<String>) -> Vec<String> {
    let value = calculate(&lines);
    let checksum_line = format!("{CHECKSUM_PREFIX}{value}");

    let position = lines
        .iter()
        .position(|line| line.trim().starts_with("! Compiled by "))
        .or_else(|| {
            lines.iter().position(|line| {
                let trimmed = line.trim();
                !trimmed.is_empty() && !trimmed.starts_with('!')
            })
        });

    match position {
        Some(index) => lines.insert(index, checksum_line),
        None => lines.push(checksum_line),
    }
    lines
}

/// Verify the embedded checksum of a compiled list.
///
/// Returns `None` when no checksum line is present.
#[must_use]
pub fn verify(lines: &[String]) -> Option<bool> {
    let embedded = lines
        .iter()
        .find_map(|line| line.strip_prefix(CHECKSUM_PREFIX))?;
    Some(embedded == calculate(lines))
}
