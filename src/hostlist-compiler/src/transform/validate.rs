//! Rule validation: drops rules that cannot be expressed in a DNS
//! hostlist, together with their immediately preceding comments.

use crate::rules::{adblock, classify, hosts, RuleKind};
use crate::tld;

/// Modifiers supported in DNS filtering rules.
static SUPPORTED_MODIFIERS: &[&str] = &[
    "important",
    "~important",
    "badfilter",
    "ctag",
    "denyallow",
    "client",
    "dnstype",
    "dnsrewrite",
];

/// Minimum length of an adblock rule pattern.
const MIN_PATTERN_LENGTH: usize = 5;

/// Keep only valid rules.
///
/// Comments and empty lines survive unless the rule they annotate is
/// dropped: dropping a rule also drops the contiguous comment/empty lines
/// immediately above it. `allow_ip` additionally permits IP-literal
/// hostnames (the ValidateAllowIp variant).
#[must_use]
pub fn validate(lines: Vec<String>, allow_ip: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        match classify(&line) {
            RuleKind::Comment | RuleKind::Empty | RuleKind::Cosmetic => out.push(line),
            RuleKind::Hosts => {
                if is_valid_hosts_rule(&line, allow_ip) {
                    out.push(line);
                } else {
                    drop_with_preceding_comments(&mut out, &line);
                }
            }
            RuleKind::PlainDomain => {
                if is_valid_domain(line.trim(), allow_ip) {
                    out.push(line);
                } else {
                    drop_with_preceding_comments(&mut out, &line);
                }
            }
            RuleKind::Adblock => {
                if is_valid_adblock_rule(&line, allow_ip) {
                    out.push(line);
                } else {
                    drop_with_preceding_comments(&mut out, &line);
                }
            }
        }
    }
    out
}

/// Remove the comment/empty run immediately above a dropped rule.
fn drop_with_preceding_comments(out: &mut Vec<String>, dropped: &str) {
    tracing::debug!("Validate dropped rule: {}", dropped);
    while let Some(last) = out.last() {
        match classify(last) {
            RuleKind::Comment | RuleKind::Empty => {
                out.pop();
            }
            _ => break,
        }
    }
}

fn is_valid_hosts_rule(line: &str, allow_ip: bool) -> bool {
    let Ok(rule) = hosts::parse(line) else {
        return false;
    };
    rule.hostnames.iter().all(|h| is_valid_domain(h, allow_ip))
}

/// A hostname is valid when it passes the label grammar and is not itself
/// a public suffix. IP literals are only valid when `allow_ip` is set.
fn is_valid_domain(hostname: &str, allow_ip: bool) -> bool {
    if tld::is_ip(hostname) {
        return allow_ip;
    }
    if !tld::is_valid_hostname(hostname) {
        return false;
    }
    let normalized = hostname
        .strip_suffix('.')
        .unwrap_or(hostname)
        .to_ascii_lowercase();
    tld::get_public_suffix(&normalized).as_deref() != Some(normalized.as_str())
}

fn is_valid_adblock_rule(line: &str, allow_ip: bool) -> bool {
    let Ok(rule) = adblock::parse(line) else {
        return false;
    };

    if !rule
        .options
        .iter()
        .all(|o| SUPPORTED_MODIFIERS.contains(&o.name.as_str()))
    {
        return false;
    }

    // A scheme prefix is tolerated and ignored
    let pattern = match rule.pattern.split_once("://") {
        Some((_, rest)) => rest,
        None => rule.pattern.as_str(),
    };

    if pattern.len() < MIN_PATTERN_LENGTH {
        return false;
    }

    if !pattern
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'*' | b'|' | b'^'))
    {
        return false;
    }

    // No wildcard past the separator anchor
    if let Some(pos) = pattern.find('^') {
        if pattern[pos..].contains('*') {
            return false;
        }
    }

    if let Some(hostname) = &rule.hostname {
        if !is_valid_domain(hostname, allow_ip) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_valid_rules_kept() {
        let input = lines(&[
            "||example.com^",
            "@@||example.com^$important",
            "||example.com^$dnstype=AAAA",
            "0.0.0.0 tracker.example.org",
            "example.net",
        ]);
        assert_eq!(validate(input.clone(), false), input);
    }

    #[test]
    fn test_invalid_rule_dropped() {
        let input = lines(&["||example.com^", "non/valid_rule"]);
        assert_eq!(validate(input, false), lines(&["||example.com^"]));
    }

    #[test]
    fn test_unsupported_modifier_dropped() {
        let input = lines(&["||example.com^$script"]);
        assert!(validate(input, false).is_empty());
    }

    #[test]
    fn test_pattern_length_threshold() {
        // 4 characters: dropped; 5 characters: kept
        assert!(validate(lines(&["||a^"]), false).is_empty());
        assert_eq!(validate(lines(&["||ab^"]), false), lines(&["||ab^"]));
    }

    #[test]
    fn test_scheme_prefix_stripped() {
        let input = lines(&["://ads.example.com^"]);
        assert_eq!(validate(input.clone(), false), input);
    }

    #[test]
    fn test_wildcard_after_separator_dropped() {
        assert!(validate(lines(&["||example.com^*"]), false).is_empty());
        assert_eq!(
            validate(lines(&["||*.example.com^"]), false),
            lines(&["||*.example.com^"])
        );
    }

    #[test]
    fn test_hosts_rule_with_bad_hostname_dropped() {
        assert!(validate(lines(&["0.0.0.0 bad_host.example.com"]), false).is_empty());
    }

    #[test]
    fn test_public_suffix_hostname_dropped() {
        assert!(validate(lines(&["0.0.0.0 com"]), false).is_empty());
        assert!(validate(lines(&["0.0.0.0 co.uk"]), false).is_empty());
        assert!(validate(lines(&["||com^"]), false).is_empty());
    }

    #[test]
    fn test_ip_hostname_requires_allow_ip() {
        let input = lines(&["||127.0.0.1^"]);
        assert!(validate(input.clone(), false).is_empty());
        assert_eq!(validate(input.clone(), true), input);
    }

    #[test]
    fn test_dropped_rule_takes_preceding_comments() {
        let input = lines(&[
            "||kept.example.com^",
            "! annotation for the bad rule",
            "",
            "non/valid_rule",
            "||also-kept.example.com^",
        ]);
        assert_eq!(
            validate(input, false),
            lines(&["||kept.example.com^", "||also-kept.example.com^"])
        );
    }

    #[test]
    fn test_cosmetic_rules_pass_through() {
        let input = lines(&["example.com##.banner"]);
        assert_eq!(validate(input.clone(), false), input);
    }
}
