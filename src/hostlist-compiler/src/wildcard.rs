//! Wildcard patterns for inclusion/exclusion filtering.
//!
//! A pattern is one of three kinds, decided once at construction:
//! - `/…/` compiles as a regex with the `m` and `i` flags;
//! - anything containing `*` compiles as an anchored case-insensitive glob;
//! - everything else is a plain case-sensitive substring test.

use regex::{Regex, RegexBuilder};

use crate::error::{CompilerError, Result};

/// The kind of a compiled wildcard pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Substring test.
    Plain,
    /// `*`-glob, anchored start to end.
    Glob,
    /// `/…/` regular expression.
    Regex,
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct Wildcard {
    pattern: String,
    kind: PatternKind,
    compiled: Option<Regex>,
}

impl Wildcard {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPattern` for empty input and a pattern error when a
    /// `/…/` regex does not compile.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(CompilerError::EmptyPattern);
        }

        if is_regex_pattern(pattern) {
            let inner = &pattern[1..pattern.len() - 1];
            let compiled = RegexBuilder::new(inner)
                .case_insensitive(true)
                .multi_line(true)
                .build()?;
            return Ok(Self {
                pattern: pattern.to_string(),
                kind: PatternKind::Regex,
                compiled: Some(compiled),
            });
        }

        if pattern.contains('*') {
            let escaped = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join("([\\s\\S]*)");
            let compiled = RegexBuilder::new(&format!("^{escaped}$"))
                .case_insensitive(true)
                .build()?;
            return Ok(Self {
                pattern: pattern.to_string(),
                kind: PatternKind::Glob,
                compiled: Some(compiled),
            });
        }

        Ok(Self {
            pattern: pattern.to_string(),
            kind: PatternKind::Plain,
            compiled: None,
        })
    }

    /// The original pattern text.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The compiled pattern kind.
    #[must_use]
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Test a rule string against this pattern.
    #[must_use]
    pub fn test(&self, s: &str) -> bool {
        match self.kind {
            PatternKind::Plain => s.contains(&self.pattern),
            PatternKind::Glob | PatternKind::Regex => self
                .compiled
                .as_ref()
                .is_some_and(|re| re.is_match(s)),
        }
    }
}

/// A pattern is a regex iff it starts and ends with `/` and has content.
fn is_regex_pattern(pattern: &str) -> bool {
    pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/')
}

/// Compile a list of patterns, partitioned into plain and non-plain.
///
/// The plain patterns are checked first by callers as a substring fast path.
pub fn compile_partitioned(patterns: &[String]) -> Result<(Vec<Wildcard>, Vec<Wildcard>)> {
    let mut plain = Vec::new();
    let mut complex = Vec::new();
    for pattern in patterns {
        let wildcard = Wildcard::new(pattern)?;
        match wildcard.kind() {
            PatternKind::Plain => plain.push(wildcard),
            _ => complex.push(wildcard),
        }
    }
    Ok((plain, complex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(
            Wildcard::new(""),
            Err(CompilerError::EmptyPattern)
        ));
    }

    #[test]
    fn test_plain_substring() {
        let w = Wildcard::new("example").unwrap();
        assert_eq!(w.kind(), PatternKind::Plain);
        assert!(w.test("||ads.example.com^"));
        assert!(!w.test("||safe.org^"));
    }

    #[test]
    fn test_glob() {
        let w = Wildcard::new("*example*").unwrap();
        assert_eq!(w.kind(), PatternKind::Glob);
        assert!(w.test("||ads.example.com^"));
        assert!(w.test("prefix EXAMPLE suffix"));
        assert!(!w.test("||safe.org^"));

        // Globs are anchored
        let w = Wildcard::new("||ads.*").unwrap();
        assert!(w.test("||ads.example.com^"));
        assert!(!w.test("x||ads.example.com^"));
    }

    #[test]
    fn test_regex() {
        let w = Wildcard::new("/^@@/").unwrap();
        assert_eq!(w.kind(), PatternKind::Regex);
        assert!(w.test("@@||example.com^"));
        assert!(!w.test("||example.com^"));
    }

    #[test]
    fn test_slash_but_not_regex() {
        // Too short to be a regex; falls back to plain
        let w = Wildcard::new("//").unwrap();
        assert_eq!(w.kind(), PatternKind::Plain);
    }

    #[test]
    fn test_partition() {
        let patterns = vec![
            "plain".to_string(),
            "*glob*".to_string(),
            "/regex/".to_string(),
        ];
        let (plain, complex) = compile_partitioned(&patterns).unwrap();
        assert_eq!(plain.len(), 1);
        assert_eq!(complex.len(), 2);
    }
}
