//! Line-level transformations: comments, whitespace, duplicates, ASCII.

use std::collections::HashSet;

use crate::rules::{self, RuleKind};

/// Drop every classified comment line.
#[must_use]
pub fn remove_comments(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .filter(|line| rules::classify(line) != RuleKind::Comment)
        .collect()
}

/// Replace each line with its whitespace-stripped form.
#[must_use]
pub fn trim_lines(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().map(|line| line.trim().to_string()).collect()
}

/// Drop lines that are empty after trimming.
#[must_use]
pub fn remove_empty_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Append a single empty line iff the last line is non-empty.
#[must_use]
pub fn insert_final_newline(mut lines: Vec<String>) -> Vec<String> {
    if lines.last().is_some_and(|line| !line.is_empty()) {
        lines.push(String::new());
    }
    lines
}

/// Convert non-ASCII domains in every line to Punycode.
#[must_use]
pub fn convert_to_ascii(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| rules::convert_non_ascii_to_punycode(&line))
        .collect()
}

/// Remove exact duplicates, preserving the first occurrence.
#[must_use]
pub fn deduplicate(lines: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| {
            // Duplicate empty lines and comments are legitimate
            if line.trim().is_empty() || rules::classify(line) == RuleKind::Comment {
                return true;
            }
            seen.insert(line.clone())
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
    fn test_remove_comments() {
        let input = lines(&["! c", "# c", "||example.com^", "#### section", "0.0.0.0 a.com"]);
        assert_eq!(
            remove_comments(input),
            lines(&["||example.com^", "0.0.0.0 a.com"])
        );
    }

    #[test]
    fn test_trim_lines() {
        assert_eq!(
            trim_lines(lines(&["  a  ", "\tb", "c"])),
            lines(&["a", "b", "c"])
        );
    }

    #[test]
    fn test_remove_empty_lines() {
        assert_eq!(
            remove_empty_lines(lines(&["a", "", "   ", "b"])),
            lines(&["a", "b"])
        );
    }

    #[test]
    fn test_insert_final_newline() {
        assert_eq!(
            insert_final_newline(lines(&["a", "b"])),
            lines(&["a", "b", ""])
        );
        // Already terminated: unchanged
        assert_eq!(
            insert_final_newline(lines(&["a", ""])),
            lines(&["a", ""])
        );
        // Empty input: unchanged
        assert!(insert_final_newline(Vec::new()).is_empty());
    }

    #[test]
    fn test_deduplicate_first_wins() {
        let input = lines(&["||a.com^", "||b.com^", "||a.com^", "||c.com^"]);
        assert_eq!(
            deduplicate(input),
            lines(&["||a.com^", "||b.com^", "||c.com^"])
        );
    }

    #[test]
    fn test_deduplicate_keeps_comments_and_blanks() {
        let input = lines(&["!", "||a.com^", "", "!", "||b.com^", ""]);
        assert_eq!(deduplicate(input.clone()), input);
    }

    #[test]
    fn test_deduplicate_idempotent() {
        let input = lines(&["||a.com^", "||a.com^", "||b.com^"]);
        let once = deduplicate(input);
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_convert_to_ascii() {
        let input = lines(&["||example.com^", "||пример.рф^"]);
        assert_eq!(
            convert_to_ascii(input),
            lines(&["||example.com^", "||xn--e1afmkfd.xn--p1ai^"])
        );
    }
}
