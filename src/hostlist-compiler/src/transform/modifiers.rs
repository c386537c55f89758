//! Rule-rewriting transformations: InvertAllow and RemoveModifiers.

use crate::rules::{adblock, classify, RuleKind};

/// Emit a matching `@@||host^$important` exception after every plain
/// blocking hostname rule. Other lines pass through untouched.
#[must_use]
pub fn invert_allow(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let exception = if classify(&line) == RuleKind::Adblock {
            adblock::parse(&line)
                .ok()
                .filter(|rule| !rule.whitelist && rule.is_plain_hostname_rule())
                .and_then(|rule| rule.hostname)
                .map(|host| format!("@@||{host}^$important"))
        } else {
            None
        };
        out.push(line);
        if let Some(exception) = exception {
            out.push(exception);
        }
    }
    out
}

/// Strip the configured option names from every adblock rule.
///
/// Rules that do not parse, and lines of any other kind, pass through as
/// written.
#[must_use]
pub fn remove_modifiers(lines: Vec<String>, modifiers: &[String]) -> Vec<String> {
    if modifiers.is_empty() {
        return lines;
    }
    lines
        .into_iter()
        .map(|line| {
            if classify(&line) != RuleKind::Adblock {
                return line;
            }
            match adblock::parse(&line) {
                Ok(mut rule) if !rule.options.is_empty() => {
                    let before = rule.options.len();
                    rule.options.retain(|o| !modifiers.contains(&o.name));
                    if rule.options.len() == before {
                        line
                    } else {
                        adblock::serialize(&rule)
                    }
                }
                _ => line,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_invert_allow_emits_exception() {
        let input = lines(&["||example.com^"]);
        assert_eq!(
            invert_allow(input),
            lines(&["||example.com^", "@@||example.com^$important"])
        );
    }

    #[test]
    fn test_invert_allow_skips_non_hostname_rules() {
        let input = lines(&[
            "! comment",
            "@@||already.com^",
            "||example.com^$script",
            "||example.com/path",
        ]);
        assert_eq!(invert_allow(input.clone()), input);
    }

    #[test]
    fn test_remove_modifiers_default_target() {
        let modifiers = vec!["third-party".to_string()];
        let input = lines(&["||example.com^$third-party,script"]);
        assert_eq!(
            remove_modifiers(input, &modifiers),
            lines(&["||example.com^$script"])
        );
    }

    #[test]
    fn test_remove_modifiers_drops_separator_when_empty() {
        let modifiers = vec!["third-party".to_string()];
        let input = lines(&["||example.com^$third-party"]);
        assert_eq!(remove_modifiers(input, &modifiers), lines(&["||example.com^"]));
    }

    #[test]
    fn test_remove_modifiers_leaves_untargeted_rules() {
        let modifiers = vec!["third-party".to_string()];
        let input = lines(&["||example.com^$important", "0.0.0.0 example.org"]);
        assert_eq!(remove_modifiers(input.clone(), &modifiers), input);
    }
}
