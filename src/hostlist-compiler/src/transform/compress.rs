//! Hostname subsumption: canonicalizes hosts rules and plain domains to
//! `||host^` and removes rules shadowed by a parent domain rule.

use std::collections::HashSet;

use crate::rules::{adblock, classify, hosts, RuleKind};

/// Compress a rule list.
///
/// Hosts rules and plain domains convert to `||host^`; exact duplicates
/// of that shape collapse to the first occurrence; a `||host^` rule is
/// dropped whenever any ancestor hostname has its own `||ancestor^` rule.
/// Rules with options, exception rules, and non-domain patterns pass
/// through untouched.
#[must_use]
pub fn compress(lines: Vec<String>) -> Vec<String> {
    let canonical: Vec<String> = lines.into_iter().flat_map(canonicalize_line).collect();

    // Hostnames that have their own plain ||host^ rule
    let blocked: HashSet<String> = canonical
        .iter()
        .filter_map(|line| plain_blocking_hostname(line))
        .collect();

    let mut seen = HashSet::new();
    canonical
        .into_iter()
        .filter(|line| match plain_blocking_hostname(line) {
            Some(hostname) => {
                if !seen.insert(hostname.clone()) {
                    return false;
                }
                !has_blocked_ancestor(&hostname, &blocked)
            }
            None => true,
        })
        .collect()
}

/// Convert hosts rules and plain domains to `||host^`; pass everything
/// else through unchanged.
fn canonicalize_line(line: String) -> Vec<String> {
    match classify(&line) {
        RuleKind::Hosts => match hosts::parse(&line) {
            Ok(rule) => rule
                .hostnames
                .iter()
                .map(|h| format!("||{}^", h.to_ascii_lowercase()))
                .collect(),
            Err(_) => vec![line],
        },
        RuleKind::PlainDomain => {
            let hostname = line.trim().trim_end_matches('.').to_ascii_lowercase();
            vec![format!("||{hostname}^")]
        }
        _ => vec![line],
    }
}

/// The hostname of a plain `||host^` blocking rule without options.
fn plain_blocking_hostname(line: &str) -> Option<String> {
    if classify(line) != RuleKind::Adblock {
        return None;
    }
    let rule = adblock::parse(line).ok()?;
    if rule.whitelist || !rule.is_plain_hostname_rule() {
        return None;
    }
    rule.hostname
}

/// Whether any strict ancestor of `hostname` carries its own rule.
fn has_blocked_ancestor(hostname: &str, blocked: &HashSet<String>) -> bool {
    let mut rest = hostname;
    while let Some((_, parent)) = rest.split_once('.') {
        if blocked.contains(parent) {
            return true;
        }
        rest = parent;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_hosts_rules_canonicalized() {
        let input = lines(&["0.0.0.0 ads.example.com", "127.0.0.1 a.org b.org"]);
        assert_eq!(
            compress(input),
            lines(&["||ads.example.com^", "||a.org^", "||b.org^"])
        );
    }

    #[test]
    fn test_plain_domains_canonicalized() {
        assert_eq!(
            compress(lines(&["tracker.example.net"])),
            lines(&["||tracker.example.net^"])
        );
    }

    #[test]
    fn test_subdomains_subsumed_by_parent() {
        let input = lines(&[
            "0.0.0.0 ads.example.com",
            "0.0.0.0 evil.ads.example.com",
            "0.0.0.0 example.com",
        ]);
        assert_eq!(compress(input), lines(&["||example.com^"]));
    }

    #[test]
    fn test_duplicates_collapse() {
        let input = lines(&["||example.com^", "0.0.0.0 example.com", "example.com"]);
        assert_eq!(compress(input), lines(&["||example.com^"]));
    }

    #[test]
    fn test_rules_with_options_pass_through() {
        let input = lines(&[
            "||example.com^$important",
            "@@||example.com^",
            "||sub.example.com^$badfilter",
        ]);
        assert_eq!(compress(input.clone()), input);
    }

    #[test]
    fn test_option_rules_do_not_subsume() {
        // The parent rule carries options, so the subdomain survives
        let input = lines(&["||example.com^$important", "||sub.example.com^"]);
        assert_eq!(compress(input.clone()), input);
    }

    #[test]
    fn test_comments_pass_through() {
        let input = lines(&["! header", "||example.com^"]);
        assert_eq!(compress(input.clone()), input);
    }

    #[test]
    fn test_compress_monotone_and_idempotent() {
        let input = lines(&[
            "0.0.0.0 a.example.com",
            "0.0.0.0 b.example.com",
            "example.com",
            "||other.org^",
        ]);
        let once = compress(input.clone());
        assert!(once.len() <= input.len());
        assert_eq!(compress(once.clone()), once);
    }
}
