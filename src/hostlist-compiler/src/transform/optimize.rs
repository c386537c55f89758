//! Best-effort rule collapsing. Gated behind the RuleOptimizer
//! transformation name; every rewrite preserves match semantics.

use std::collections::HashSet;

use crate::rules::{adblock, classify, RuleKind};

/// Collapse redundant rules.
///
/// Two rewrites, both semantics-preserving in the `||` grammar:
/// `||*.host^` is dropped when `||host^` exists (the parent form already
/// covers every subdomain), and rules that are identical up to option
/// order collapse to their first occurrence.
#[must_use]
pub fn optimize(lines: Vec<String>) -> Vec<String> {
    let plain_hosts: HashSet<String> = lines
        .iter()
        .filter_map(|line| plain_hostname(line))
        .collect();

    let mut seen_keys = HashSet::new();
    lines
        .into_iter()
        .filter(|line| {
            if classify(line) != RuleKind::Adblock {
                return true;
            }

            if let Some(stripped) = wildcard_subdomain_host(line) {
                if plain_hosts.contains(&stripped) {
                    tracing::debug!("Optimizer folded '{}' into '||{}^'", line, stripped);
                    return false;
                }
            }

            match canonical_key(line) {
                Some(key) => seen_keys.insert(key),
                None => true,
            }
        })
        .collect()
}

/// Hostname of a plain `||host^` blocking rule.
fn plain_hostname(line: &str) -> Option<String> {
    if classify(line) != RuleKind::Adblock {
        return None;
    }
    let rule = adblock::parse(line).ok()?;
    if rule.whitelist || !rule.is_plain_hostname_rule() {
        return None;
    }
    rule.hostname
}

/// The `host` of a plain `||*.host^` blocking rule.
fn wildcard_subdomain_host(line: &str) -> Option<String> {
    let rule = adblock::parse(line).ok()?;
    if rule.whitelist || !rule.options.is_empty() {
        return None;
    }
    let host = rule
        .pattern
        .strip_prefix("||*.")?
        .strip_suffix('^')?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// A key identical for rules that differ only in option order.
fn canonical_key(line: &str) -> Option<String> {
    let rule = adblock::parse(line).ok()?;
    let mut options: Vec<String> = rule
        .options
        .iter()
        .map(|o| match &o.value {
            Some(value) => format!("{}={}", o.name, value),
            None => o.name.clone(),
        })
        .collect();
    options.sort_unstable();
    Some(format!(
        "{}|{}|{}",
        rule.whitelist,
        rule.pattern,
        options.join(",")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_wildcard_subdomain_folded() {
        let input = lines(&["||example.com^", "||*.example.com^"]);
        assert_eq!(optimize(input), lines(&["||example.com^"]));
    }

    #[test]
    fn test_wildcard_without_parent_kept() {
        let input = lines(&["||*.example.com^"]);
        assert_eq!(optimize(input.clone()), input);
    }

    #[test]
    fn test_option_order_duplicates_collapse() {
        let input = lines(&[
            "||example.com^$important,dnstype=AAAA",
            "||example.com^$dnstype=AAAA,important",
        ]);
        assert_eq!(
            optimize(input),
            lines(&["||example.com^$important,dnstype=AAAA"])
        );
    }

    #[test]
    fn test_distinct_rules_survive() {
        let input = lines(&["||a.com^", "||b.com^", "@@||a.com^", "! comment"]);
        assert_eq!(optimize(input.clone()), input);
    }

    #[test]
    fn test_optimize_idempotent() {
        let input = lines(&["||example.com^", "||*.example.com^", "||other.org^"]);
        let once = optimize(input);
        assert_eq!(optimize(once.clone()), once);
    }
}
