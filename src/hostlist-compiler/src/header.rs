//! Canonical header emission and upstream metadata stripping.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::FilterConfig;

/// Metadata prefixes owned by the compiler. Upstream lines carrying them
/// are stripped before the canonical header is emitted.
static STRIPPED_PREFIXES: &[&str] = &[
    "! Title:",
    "! Description:",
    "! Homepage:",
    "! License:",
    "! Version:",
    "! Last modified:",
    "! Expires:",
    "! TimeUpdated:",
    "! Checksum:",
    "! Compiled by ",
    "! Diff-Path:",
    "! Diff-Expires:",
];

/// Injectable time source so header timestamps are testable.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Generate the canonical header block for a compiled list.
#[must_use]
pub fn generate_header(config: &FilterConfig, clock: &dyn Clock) -> Vec<String> {
    let mut header = Vec::with_capacity(10);
    header.push("!".to_string());
    header.push(format!("! Title: {}", config.name));
    if let Some(description) = &config.description {
        header.push(format!("! Description: {description}"));
    }
    if let Some(homepage) = &config.homepage {
        header.push(format!("! Homepage: {homepage}"));
    }
    if let Some(license) = &config.license {
        header.push(format!("! License: {license}"));
    }
    if let Some(version) = &config.version {
        header.push(format!("! Version: {version}"));
    }
    header.push(format!(
        "! Last modified: {}",
        clock.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    header.push("!".to_string());
    header.push(format!(
        "! Compiled by {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ));
    header.push("!".to_string());
    header
}

/// Strip upstream metadata lines and collapse runs of bare `!` markers.
#[must_use]
pub fn strip_upstream_metadata(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let trimmed = line.trim();
        if STRIPPED_PREFIXES
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
        {
            continue;
        }
        if trimmed == "!" && out.last().map(String::as_str) == Some("!") {
            continue;
        }
        if trimmed == "!" {
            out.push("!".to_string());
        } else {
            out.push(line);
        }
    }
    out
}
