//! Diff generation between two compiled rule lists.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::Result;
use crate::rules::{self, adblock, hosts, RuleKind};

/// Options controlling diff normalization and output size.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Drop comment lines before comparing.
    pub ignore_comments: bool,
    /// Drop empty lines before comparing.
    pub ignore_empty_lines: bool,
    /// Aggregate added/removed counts per domain.
    pub analyze_domains: bool,
    /// Cap on sample rules included in the report.
    pub max_rules_to_include: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            ignore_comments: true,
            ignore_empty_lines: true,
            analyze_domains: true,
            max_rules_to_include: 1000,
        }
    }
}

/// Summary counters of a diff.
#[derive(Debug, Clone, Serialize)]
pub struct DiffSummary {
    /// Rules present only in the updated list.
    pub added: usize,
    /// Rules present only in the original list.
    pub removed: usize,
    /// Rules present in both lists.
    pub unchanged: usize,
    /// `added - removed`.
    pub net_change: i64,
    /// Churn relative to the original list, in percent.
    pub percentage: f64,
}

/// Per-domain change counts.
#[derive(Debug, Clone, Serialize)]
pub struct DomainChange {
    /// The domain.
    pub domain: String,
    /// Rules added for the domain.
    pub added: usize,
    /// Rules removed for the domain.
    pub removed: usize,
}

/// A computed diff between two rule lists.
#[derive(Debug, Clone, Serialize)]
pub struct DiffResult {
    /// Summary counters.
    pub summary: DiffSummary,
    /// Added rules, in updated-list order (truncated to the cap).
    pub added: Vec<String>,
    /// Removed rules, in original-list order (truncated to the cap).
    pub removed: Vec<String>,
    /// Per-domain aggregation, top 100 by total churn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_analysis: Option<Vec<DomainChange>>,
}

/// Compute the diff between an original and an updated rule list.
#[must_use]
pub fn diff(original: &[String], updated: &[String], options: &DiffOptions) -> DiffResult {
    let original_rules = normalize(original, options);
    let updated_rules = normalize(updated, options);

    let original_set: HashSet<&str> = original_rules.iter().map(String::as_str).collect();
    let updated_set: HashSet<&str> = updated_rules.iter().map(String::as_str).collect();

    let added: Vec<String> = updated_rules
        .iter()
        .filter(|rule| !original_set.contains(rule.as_str()))
        .cloned()
        .collect();
    let removed: Vec<String> = original_rules
        .iter()
        .filter(|rule| !updated_set.contains(rule.as_str()))
        .cloned()
        .collect();

    let unchanged = original_rules.len().saturating_sub(removed.len());
    let percentage = if original_rules.is_empty() {
        if added.is_empty() { 0.0 } else { 100.0 }
    } else {
        (added.len() + removed.len()) as f64 / original_rules.len() as f64 * 100.0
    };

    let summary = DiffSummary {
        added: added.len(),
        removed: removed.len(),
        unchanged,
        net_change: added.len() as i64 - removed.len() as i64,
        percentage: (percentage * 100.0).round() / 100.0,
    };

    let domain_analysis = if options.analyze_domains {
        Some(analyze_domains(&added, &removed))
    } else {
        None
    };

    let mut added = added;
    let mut removed = removed;
    added.truncate(options.max_rules_to_include);
    removed.truncate(options.max_rules_to_include);

    DiffResult {
        summary,
        added,
        removed,
        domain_analysis,
    }
}

impl DiffResult {
    /// Render the diff as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the diff as a Markdown report.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Filter list diff\n\n");
        out.push_str("## Summary\n\n");
        out.push_str("| Metric | Value |\n|---|---|\n");
        out.push_str(&format!("| Added | {} |\n", self.summary.added));
        out.push_str(&format!("| Removed | {} |\n", self.summary.removed));
        out.push_str(&format!("| Unchanged | {} |\n", self.summary.unchanged));
        out.push_str(&format!("| Net change | {} |\n", self.summary.net_change));
        out.push_str(&format!("| Churn | {:.2}% |\n", self.summary.percentage));

        if let Some(domains) = &self.domain_analysis {
            if !domains.is_empty() {
                out.push_str("\n## Top changed domains\n\n");
                out.push_str("| Domain | Added | Removed |\n|---|---|---|\n");
                for change in domains.iter().take(20) {
                    out.push_str(&format!(
                        "| {} | {} | {} |\n",
                        change.domain, change.added, change.removed
                    ));
                }
            }
        }

        if !self.added.is_empty() {
            out.push_str("\n## Added rules (sample)\n\n```\n");
            for rule in self.added.iter().take(50) {
                out.push_str(rule);
                out.push('\n');
            }
            out.push_str("```\n");
        }

        if !self.removed.is_empty() {
            out.push_str("\n## Removed rules (sample)\n\n```\n");
            for rule in self.removed.iter().take(50) {
                out.push_str(rule);
                out.push('\n');
            }
            out.push_str("```\n");
        }

        out
    }
}

fn normalize(lines: &[String], options: &DiffOptions) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.trim().to_string())
        .filter(|line| {
            if options.ignore_empty_lines && line.is_empty() {
                return false;
            }
            if options.ignore_comments && rules::classify(line) == RuleKind::Comment {
                return false;
            }
            true
        })
        .collect()
}

fn analyze_domains(added: &[String], removed: &[String]) -> Vec<DomainChange> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for rule in added {
        for domain in rule_domains(rule) {
            counts.entry(domain).or_default().0 += 1;
        }
    }
    for rule in removed {
        for domain in rule_domains(rule) {
            counts.entry(domain).or_default().1 += 1;
        }
    }

    let mut changes: Vec<DomainChange> = counts
        .into_iter()
        .map(|(domain, (added, removed))| DomainChange {
            domain,
            added,
            removed,
        })
        .collect();
    changes.sort_by(|a, b| {
        (b.added + b.removed)
            .cmp(&(a.added + a.removed))
            .then_with(|| a.domain.cmp(&b.domain))
    });
    changes.truncate(100);
    changes
}

/// Hostnames a rule targets, for domain aggregation.
fn rule_domains(rule: &str) -> Vec<String> {
    match rules::classify(rule) {
        RuleKind::Hosts => hosts::parse(rule)
            .map(|r| r.hostnames)
            .unwrap_or_default(),
        RuleKind::PlainDomain => vec![rule.trim().to_string()],
        RuleKind::Adblock => adblock::parse(rule)
            .ok()
            .and_then(|r| r.hostname)
            .map(|h| vec![h])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_diff_added_and_removed() {
        let original = lines(&["||a.com^", "||b.com^", "||c.com^"]);
        let updated = lines(&["||a.com^", "||c.com^", "||d.com^"]);
        let result = diff(&original, &updated, &DiffOptions::default());

        assert_eq!(result.added, lines(&["||d.com^"]));
        assert_eq!(result.removed, lines(&["||b.com^"]));
        assert_eq!(result.summary.unchanged, 2);
        assert_eq!(result.summary.net_change, 0);
    }

    #[test]
    fn test_diff_ignores_comments_by_default() {
        let original = lines(&["! old header", "||a.com^"]);
        let updated = lines(&["! new header", "||a.com^"]);
        let result = diff(&original, &updated, &DiffOptions::default());
        assert_eq!(result.summary.added, 0);
        assert_eq!(result.summary.removed, 0);
    }

    #[test]
    fn test_diff_reconstructs_updated_list() {
        let original = lines(&["||a.com^", "||b.com^"]);
        let updated = lines(&["||b.com^", "||c.com^"]);
        let options = DiffOptions::default();
        let result = diff(&original, &updated, &options);

        // (original \ removed) ∪ added == updated, as sets
        let removed: HashSet<&str> = result.removed.iter().map(String::as_str).collect();
        let mut reconstructed: HashSet<&str> = original
            .iter()
            .map(String::as_str)
            .filter(|r| !removed.contains(r))
            .collect();
        reconstructed.extend(result.added.iter().map(String::as_str));
        let expected: HashSet<&str> = updated.iter().map(String::as_str).collect();
        assert_eq!(reconstructed, expected);
    }

    #[test]
    fn test_domain_analysis_sorted_by_churn() {
        let original = lines(&["||a.example.com^", "||b.example.com^", "||one.org^"]);
        let updated = lines(&["||two.org^"]);
        let result = diff(&original, &updated, &DiffOptions::default());

        let domains = result.domain_analysis.unwrap();
        assert_eq!(domains.len(), 4);
        // Every domain carries churn 1; ordering falls back to name
        assert!(domains.iter().any(|d| d.domain == "a.example.com" && d.removed == 1));
        assert!(domains.iter().any(|d| d.domain == "two.org" && d.added == 1));
    }

    #[test]
    fn test_max_rules_truncation() {
        let original: Vec<String> = (0..20).map(|i| format!("||r{i}.com^")).collect();
        let updated = Vec::new();
        let options = DiffOptions {
            max_rules_to_include: 5,
            ..Default::default()
        };
        let result = diff(&original, &updated, &options);
        assert_eq!(result.removed.len(), 5);
        // Summary counts the full set, not the truncated sample
        assert_eq!(result.summary.removed, 20);
    }

    #[test]
    fn test_markdown_rendering() {
        let original = lines(&["||a.com^"]);
        let updated = lines(&["||b.com^"]);
        let result = diff(&original, &updated, &DiffOptions::default());
        let markdown = result.to_markdown();
        assert!(markdown.contains("| Added | 1 |"));
        assert!(markdown.contains("| Removed | 1 |"));
        assert!(markdown.contains("||b.com^"));
    }

    #[test]
    fn test_json_rendering() {
        let result = diff(
            &lines(&["||a.com^"]),
            &lines(&["||a.com^"]),
            &DiffOptions::default(),
        );
        let json = result.to_json().unwrap();
        assert!(json.contains("\"unchanged\": 1"));
    }
}
