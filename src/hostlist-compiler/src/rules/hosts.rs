//! `/etc/hosts`-style rule parsing.

use crate::error::{CompilerError, Result};
use crate::tld;

/// Parsed properties of a hosts rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsRule {
    /// The IP address, as written (may carry an IPv6 `%zone`).
    pub ip: String,
    /// Hostnames mapped to the address, in input order.
    pub hostnames: Vec<String>,
    /// Trailing `#` comment, if any.
    pub comment: Option<String>,
}

/// Parse a hosts rule: `IP name1 [name2 ...] [# comment]`.
///
/// # Errors
///
/// Returns `InvalidRule` when the first token is not a syntactically valid
/// IP address or no hostname follows it.
pub fn parse(line: &str) -> Result<HostsRule> {
    let trimmed = line.trim();
    let mut tokens = trimmed.split_whitespace();

    let ip = tokens
        .next()
        .ok_or_else(|| CompilerError::InvalidRule("empty hosts rule".to_string()))?;
    if !tld::is_ip(ip) {
        return Err(CompilerError::InvalidRule(format!(
            "'{ip}' is not an IP address"
        )));
    }

    let mut hostnames = Vec::new();
    let mut comment_parts = Vec::new();
    let mut in_comment = false;
    for token in tokens {
        if in_comment {
            comment_parts.push(token);
        } else if let Some(stripped) = token.strip_prefix('#') {
            in_comment = true;
            if !stripped.is_empty() {
                comment_parts.push(stripped);
            }
        } else {
            hostnames.push(token.to_string());
        }
    }

    if hostnames.is_empty() {
        return Err(CompilerError::InvalidRule(format!(
            "hosts rule '{trimmed}' has no hostnames"
        )));
    }

    let comment = if comment_parts.is_empty() {
        None
    } else {
        Some(comment_parts.join(" "))
    };

    Ok(HostsRule {
        ip: ip.to_string(),
        hostnames,
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_hostname() {
        let rule = parse("0.0.0.0 example.com").unwrap();
        assert_eq!(rule.ip, "0.0.0.0");
        assert_eq!(rule.hostnames, vec!["example.com"]);
        assert_eq!(rule.comment, None);
    }

    #[test]
    fn test_parse_multiple_hostnames_with_comment() {
        let rule = parse("127.0.0.1 localhost local.dev # loopback aliases").unwrap();
        assert_eq!(rule.hostnames, vec!["localhost", "local.dev"]);
        assert_eq!(rule.comment.as_deref(), Some("loopback aliases"));
    }

    #[test]
    fn test_parse_ipv6_with_zone() {
        let rule = parse("fe80::1%lo0 router.lan").unwrap();
        assert_eq!(rule.ip, "fe80::1%lo0");
        assert_eq!(rule.hostnames, vec!["router.lan"]);
    }

    #[test]
    fn test_parse_rejects_non_ip() {
        assert!(parse("example.com www.example.com").is_err());
    }

    #[test]
    fn test_parse_rejects_ip_without_hostnames() {
        assert!(parse("0.0.0.0").is_err());
        assert!(parse("0.0.0.0 # comment only").is_err());
    }
}
