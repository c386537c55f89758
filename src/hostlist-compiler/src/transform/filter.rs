//! Exclude/Include wildcard filtering.

use crate::error::Result;
use crate::rules::{classify, RuleKind};
use crate::wildcard::{compile_partitioned, Wildcard};

/// A compiled set of filter patterns, partitioned so plain substring
/// patterns are checked before globs and regexes.
#[derive(Debug, Clone, Default)]
pub struct FilterPatterns {
    plain: Vec<Wildcard>,
    complex: Vec<Wildcard>,
}

impl FilterPatterns {
    /// Compile a pattern list.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPattern` or a regex error for malformed patterns.
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let (plain, complex) = compile_partitioned(patterns)?;
        Ok(Self { plain, complex })
    }

    /// Whether no patterns are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.complex.is_empty()
    }

    /// Number of compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plain.len() + self.complex.len()
    }

    /// Whether any pattern matches the line.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.plain.iter().any(|w| w.test(line)) || self.complex.iter().any(|w| w.test(line))
    }
}

/// Drop every rule matched by any exclusion pattern.
///
/// Comments and empty lines are never excluded.
#[must_use]
pub fn exclude(lines: Vec<String>, patterns: &FilterPatterns) -> Vec<String> {
    if patterns.is_empty() {
        return lines;
    }
    lines
        .into_iter()
        .filter(|line| {
            if matches!(classify(line), RuleKind::Comment | RuleKind::Empty) {
                return true;
            }
            let excluded = patterns.matches(line);
            if excluded {
                tracing::debug!("Excluded rule: {}", line);
            }
            !excluded
        })
        .collect()
}

/// Keep only rules matched by an inclusion pattern.
///
/// With no patterns configured, everything is kept. Comments and empty
/// lines always survive.
#[must_use]
pub fn include(lines: Vec<String>, patterns: &FilterPatterns) -> Vec<String> {
    if patterns.is_empty() {
        return lines;
    }
    lines
        .into_iter()
        .filter(|line| {
            if matches!(classify(line), RuleKind::Comment | RuleKind::Empty) {
                return true;
            }
            patterns.matches(line)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn patterns(items: &[&str]) -> FilterPatterns {
        let owned: Vec<String> = items.iter().map(|s| (*s).to_string()).collect();
        FilterPatterns::compile(&owned).unwrap()
    }

    #[test]
    fn test_exclude_glob() {
        let input = lines(&["||ads.example.com^", "||tracker.example.org^", "||safe.org^"]);
        let result = exclude(input, &patterns(&["*example*"]));
        assert_eq!(result, lines(&["||safe.org^"]));
    }

    #[test]
    fn test_exclude_plain_and_regex() {
        let input = lines(&["||ads.example.com^", "@@||allowed.org^", "||safe.org^"]);
        let result = exclude(input, &patterns(&["ads.", "/^@@/"]));
        assert_eq!(result, lines(&["||safe.org^"]));
    }

    #[test]
    fn test_exclude_keeps_comments() {
        let input = lines(&["! example header", "||ads.example.com^"]);
        let result = exclude(input, &patterns(&["*example*"]));
        assert_eq!(result, lines(&["! example header"]));
    }

    #[test]
    fn test_include_no_patterns_keeps_all() {
        let input = lines(&["||a.com^", "||b.com^"]);
        assert_eq!(include(input.clone(), &FilterPatterns::default()), input);
    }

    #[test]
    fn test_include_filters_to_matches() {
        let input = lines(&["! header", "||a.example.com^", "||b.org^"]);
        let result = include(input, &patterns(&["*example*"]));
        assert_eq!(result, lines(&["! header", "||a.example.com^"]));
    }

    #[test]
    fn test_include_subset_of_input() {
        let input = lines(&["||a.com^", "||b.com^", "||c.com^"]);
        let result = include(input.clone(), &patterns(&["*b.com*"]));
        assert!(result.iter().all(|line| input.contains(line)));
    }
}
