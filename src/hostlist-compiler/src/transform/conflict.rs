//! Blocking/exception conflict detection and optional auto-resolution.

use std::collections::HashMap;

use crate::rules::{adblock, classify, RuleKind};

/// Which side of a conflict should win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictRecommendation {
    /// The blocking rule carries more option text.
    KeepBlock,
    /// The exception rule carries more option text.
    KeepAllow,
    /// Neither side dominates.
    ManualReview,
}

impl std::fmt::Display for ConflictRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepBlock => write!(f, "keep-block"),
            Self::KeepAllow => write!(f, "keep-allow"),
            Self::ManualReview => write!(f, "manual-review"),
        }
    }
}

/// Auto-resolution strategy for detected conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Drop the exception rule of every conflict.
    KeepBlock,
    /// Drop the blocking rule of every conflict.
    KeepAllow,
    /// Keep whichever rule appears first in the list.
    KeepFirst,
}

/// A detected blocking/exception conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The hostname both sides target.
    pub domain: String,
    /// The blocking rule text.
    pub blocking_rule: String,
    /// The exception rule text.
    pub exception_rule: String,
    /// Which side to keep.
    pub recommendation: ConflictRecommendation,
}

#[derive(Debug)]
struct HostnameRule {
    index: usize,
    line: String,
    option_text_len: usize,
}

/// Detect conflicts and optionally resolve them.
///
/// Rules are grouped by extracted hostname; a hostname with both a
/// blocking and an exception rule conflicts. A subdomain exception whose
/// parent hostname has a blocking rule conflicts too. With a resolution
/// strategy, the losing rule of each conflict is removed.
#[must_use]
pub fn detect_and_resolve(
    lines: Vec<String>,
    resolution: Option<ConflictResolution>,
) -> (Vec<String>, Vec<Conflict>) {
    let mut blocking: HashMap<String, HostnameRule> = HashMap::new();
    let mut exceptions: HashMap<String, HostnameRule> = HashMap::new();

    for (index, line) in lines.iter().enumerate() {
        if classify(line) != RuleKind::Adblock {
            continue;
        }
        let Ok(rule) = adblock::parse(line) else {
            continue;
        };
        let Some(hostname) = rule.hostname.clone() else {
            continue;
        };
        let entry = HostnameRule {
            index,
            line: line.clone(),
            option_text_len: option_text_len(&rule),
        };
        let side = if rule.whitelist {
            &mut exceptions
        } else {
            &mut blocking
        };
        // First rule per hostname and side wins the comparison slot
        side.entry(hostname).or_insert(entry);
    }

    let mut conflicts = Vec::new();
    let mut dropped: Vec<usize> = Vec::new();

    for (hostname, exception) in &exceptions {
        // Direct conflict, then the nearest blocked ancestor
        let blocking_match = blocking.get(hostname).or_else(|| {
            let mut rest = hostname.as_str();
            while let Some((_, parent)) = rest.split_once('.') {
                if let Some(parent_rule) = blocking.get(parent) {
                    return Some(parent_rule);
                }
                rest = parent;
            }
            None
        });

        let Some(block) = blocking_match else {
            continue;
        };

        let recommendation = match block.option_text_len.cmp(&exception.option_text_len) {
            std::cmp::Ordering::Greater => ConflictRecommendation::KeepBlock,
            std::cmp::Ordering::Less => ConflictRecommendation::KeepAllow,
            std::cmp::Ordering::Equal => ConflictRecommendation::ManualReview,
        };

        tracing::warn!(
            "Conflict for '{}': '{}' vs '{}' ({})",
            hostname,
            block.line,
            exception.line,
            recommendation
        );

        if let Some(strategy) = resolution {
            let loser = match strategy {
                ConflictResolution::KeepBlock => exception.index,
                ConflictResolution::KeepAllow => block.index,
                ConflictResolution::KeepFirst => block.index.max(exception.index),
            };
            dropped.push(loser);
        }

        conflicts.push(Conflict {
            domain: hostname.clone(),
            blocking_rule: block.line.clone(),
            exception_rule: exception.line.clone(),
            recommendation,
        });
    }

    conflicts.sort_by(|a, b| a.domain.cmp(&b.domain));

    let lines = if dropped.is_empty() {
        lines
    } else {
        lines
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !dropped.contains(index))
            .map(|(_, line)| line)
            .collect()
    };

    (lines, conflicts)
}

/// Total serialized length of a rule's options.
fn option_text_len(rule: &adblock::AdblockRule) -> usize {
    rule.options
        .iter()
        .map(|o| o.name.len() + o.value.as_ref().map_or(0, |v| v.len() + 1))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_no_conflicts() {
        let input = lines(&["||a.com^", "@@||b.com^"]);
        let (out, conflicts) = detect_and_resolve(input.clone(), None);
        assert_eq!(out, input);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_direct_conflict_keep_allow_recommended() {
        let input = lines(&["||example.com^", "@@||example.com^$script"]);
        let (_, conflicts) = detect_and_resolve(input, None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].domain, "example.com");
        assert_eq!(
            conflicts[0].recommendation,
            ConflictRecommendation::KeepAllow
        );
    }

    #[test]
    fn test_equal_option_text_needs_manual_review() {
        let input = lines(&["||example.com^", "@@||example.com^"]);
        let (_, conflicts) = detect_and_resolve(input, None);
        assert_eq!(
            conflicts[0].recommendation,
            ConflictRecommendation::ManualReview
        );
    }

    #[test]
    fn test_subdomain_exception_conflicts_with_parent_block() {
        let input = lines(&["||example.com^", "@@||cdn.example.com^"]);
        let (_, conflicts) = detect_and_resolve(input, None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].domain, "cdn.example.com");
        assert_eq!(conflicts[0].blocking_rule, "||example.com^");
    }

    #[test]
    fn test_resolution_keep_block() {
        let input = lines(&["||example.com^", "@@||example.com^$script"]);
        let (out, _) = detect_and_resolve(input, Some(ConflictResolution::KeepBlock));
        assert_eq!(out, lines(&["||example.com^"]));
    }

    #[test]
    fn test_resolution_keep_allow() {
        let input = lines(&["||example.com^", "@@||example.com^$script"]);
        let (out, _) = detect_and_resolve(input, Some(ConflictResolution::KeepAllow));
        assert_eq!(out, lines(&["@@||example.com^$script"]));
    }

    #[test]
    fn test_resolution_keep_first() {
        let input = lines(&["@@||example.com^$script", "||example.com^"]);
        let (out, _) = detect_and_resolve(input, Some(ConflictResolution::KeepFirst));
        assert_eq!(out, lines(&["@@||example.com^$script"]));
    }
}
