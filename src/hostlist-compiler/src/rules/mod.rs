//! Rule model: classification, parsing, and serialization.
//!
//! Classification is total: every input line maps to exactly one
//! [`RuleKind`]. Parsers are separate and fallible; an unparseable line
//! still classifies (the Validate transformation decides its fate).

pub mod adblock;
pub mod hosts;
pub mod idn;

pub use adblock::{extract_hostname, AdblockRule, RuleOption};
pub use hosts::HostsRule;
pub use idn::convert_non_ascii_to_punycode;

use crate::tld;

/// The classification of a single input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Comment line (`!`, `# `, bare `#`, or `####`).
    Comment,
    /// Whitespace-only line.
    Empty,
    /// `/etc/hosts`-style rule.
    Hosts,
    /// Adblock network rule (the fallback kind).
    Adblock,
    /// Cosmetic rule (`##`, `#?#`, `#@#`, `#$#`), passed through.
    Cosmetic,
    /// A bare hostname.
    PlainDomain,
}

/// Classify a line into exactly one [`RuleKind`].
#[must_use]
pub fn classify(line: &str) -> RuleKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return RuleKind::Empty;
    }
    if is_comment(trimmed) {
        return RuleKind::Comment;
    }
    if hosts::parse(trimmed).is_ok() {
        return RuleKind::Hosts;
    }
    if is_cosmetic(trimmed) {
        return RuleKind::Cosmetic;
    }
    if tld::is_valid_hostname(trimmed) {
        return RuleKind::PlainDomain;
    }
    RuleKind::Adblock
}

/// Check whether a trimmed line is a comment.
///
/// `####` must be tested before the generic `#` forms; `#` followed by a
/// non-space character is not a comment.
#[must_use]
pub fn is_comment(line: &str) -> bool {
    line.starts_with('!') || line.starts_with("####") || line == "#" || line.starts_with("# ")
}

fn is_cosmetic(line: &str) -> bool {
    line.contains("##") || line.contains("#?#") || line.contains("#@#") || line.contains("#$#")
}
