//! Non-ASCII domain conversion to Punycode.

use std::sync::LazyLock;

use regex::Regex;

/// Matches a domain-looking substring with an optional `*.` prefix. The
/// character class excludes the rule structure characters so patterns like
/// `||домен.рф^$dnstype=A` only surrender the domain portion.
static DOMAIN_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*\.|)([^ ^$|=]+(?:\.[^ ^$|=]+)+)").expect("static pattern"));

/// Convert every non-ASCII domain in a rule line to its Punycode form.
///
/// ASCII-only lines are returned unchanged. Substrings that fail IDNA
/// conversion are left as written.
#[must_use]
pub fn convert_non_ascii_to_punycode(line: &str) -> String {
    if line.is_ascii() {
        return line.to_string();
    }

    DOMAIN_CANDIDATE
        .replace_all(line, |caps: &regex::Captures<'_>| {
            let prefix = &caps[1];
            let domain = &caps[2];
            if domain.is_ascii() {
                return caps[0].to_string();
            }
            match idna::domain_to_ascii(domain) {
                Ok(ascii) => format!("{prefix}{ascii}"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_untouched() {
        assert_eq!(
            convert_non_ascii_to_punycode("||example.com^"),
            "||example.com^"
        );
    }

    #[test]
    fn test_cyrillic_domain() {
        assert_eq!(
            convert_non_ascii_to_punycode("||пример.рф^"),
            "||xn--e1afmkfd.xn--p1ai^"
        );
    }

    #[test]
    fn test_wildcard_prefix_preserved() {
        assert_eq!(
            convert_non_ascii_to_punycode("*.пример.рф"),
            "*.xn--e1afmkfd.xn--p1ai"
        );
    }

    #[test]
    fn test_hosts_rule_domain_converted() {
        assert_eq!(
            convert_non_ascii_to_punycode("0.0.0.0 пример.рф"),
            "0.0.0.0 xn--e1afmkfd.xn--p1ai"
        );
    }

    #[test]
    fn test_options_value_untouched_after_equals() {
        // The character class stops at '=', keeping option values intact
        let line = "||пример.рф^$dnstype=AAAA";
        let converted = convert_non_ascii_to_punycode(line);
        assert!(converted.starts_with("||xn--e1afmkfd.xn--p1ai^"));
        assert!(converted.ends_with("$dnstype=AAAA"));
    }
}
