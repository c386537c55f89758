//! Adblock network rule parsing and serialization.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CompilerError, Result};

static HOSTNAME_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|\|([a-z0-9.-]+)\^?$").expect("static pattern"));

/// A single `name` or `name=value` rule option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOption {
    /// Option name.
    pub name: String,
    /// Option value, for `name=value` options.
    pub value: Option<String>,
}

impl RuleOption {
    /// Create a valueless option.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Parsed properties of an adblock network rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdblockRule {
    /// The rule pattern, without `@@` or options.
    pub pattern: String,
    /// Whether this is an exception (`@@`) rule.
    pub whitelist: bool,
    /// Parsed options, in input order.
    pub options: Vec<RuleOption>,
    /// The hostname, when the pattern is exactly `||host^?`.
    pub hostname: Option<String>,
}

impl AdblockRule {
    /// Whether the rule has the shape `||host^` with no options.
    #[must_use]
    pub fn is_plain_hostname_rule(&self) -> bool {
        self.hostname.is_some() && self.options.is_empty()
    }

    /// Look up an option by name.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&RuleOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// Parse an adblock network rule into its properties.
///
/// The options separator `$` is located by scanning from the right and
/// skipping escaped `\$`. Regex rules (`/…/` without `replace=`) never
/// carry options, so the scan is skipped for them.
///
/// # Errors
///
/// Returns `InvalidRule` when no pattern remains after `@@`.
pub fn parse(line: &str) -> Result<AdblockRule> {
    let trimmed = line.trim();
    let (whitelist, rest) = match trimmed.strip_prefix("@@") {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    if rest.is_empty() {
        return Err(CompilerError::InvalidRule(format!(
            "no pattern in rule '{trimmed}'"
        )));
    }

    let (pattern, options) = if is_regex_rule(rest) {
        (rest.to_string(), Vec::new())
    } else {
        match find_options_separator(rest) {
            Some(idx) => {
                let pattern = rest[..idx].to_string();
                let options = parse_options(&rest[idx + 1..]);
                (pattern, options)
            }
            None => (rest.to_string(), Vec::new()),
        }
    };

    if pattern.is_empty() {
        return Err(CompilerError::InvalidRule(format!(
            "no pattern in rule '{trimmed}'"
        )));
    }

    let hostname = extract_hostname(&pattern);

    Ok(AdblockRule {
        pattern,
        whitelist,
        options,
        hostname,
    })
}

/// Serialize rule properties back to rule text.
///
/// Inverse of [`parse`] for rules that round-trip cleanly.
#[must_use]
pub fn serialize(rule: &AdblockRule) -> String {
    let mut out = String::new();
    if rule.whitelist {
        out.push_str("@@");
    }
    out.push_str(&rule.pattern);
    if !rule.options.is_empty() {
        out.push('$');
        let rendered: Vec<String> = rule
            .options
            .iter()
            .map(|o| match &o.value {
                Some(value) => format!("{}={}", o.name, value.replace(',', "\\,")),
                None => o.name.clone(),
            })
            .collect();
        out.push_str(&rendered.join(","));
    }
    out
}

/// Extract the hostname from a `||host^?` pattern.
#[must_use]
pub fn extract_hostname(pattern: &str) -> Option<String> {
    HOSTNAME_RULE
        .captures(pattern)
        .map(|caps| caps[1].to_string())
}

/// A rule is a regex rule iff it starts and ends with `/` and does not
/// carry a `replace=` option.
fn is_regex_rule(rule: &str) -> bool {
    rule.len() > 2 && rule.starts_with('/') && rule.ends_with('/') && !rule.contains("replace=")
}

/// Find the index of the unescaped `$` options separator, scanning from
/// the right.
fn find_options_separator(rule: &str) -> Option<usize> {
    let bytes = rule.as_bytes();
    for idx in (0..bytes.len()).rev() {
        if bytes[idx] == b'$' && (idx == 0 || bytes[idx - 1] != b'\\') {
            return Some(idx);
        }
    }
    None
}

/// Split the options list on unescaped commas and parse each entry.
fn parse_options(text: &str) -> Vec<RuleOption> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&',') {
            current.push(',');
            chars.next();
        } else if c == ',' {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(|part| match part.split_once('=') {
            Some((name, value)) => RuleOption {
                name: name.to_string(),
                value: Some(value.to_string()),
            },
            None => RuleOption::flag(part),
        })
        .collect()
}
