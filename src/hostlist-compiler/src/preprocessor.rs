//! Source loading with `!#include` expansion and `!#if` conditionals.
//!
//! Includes are expanded in place at their line position. Remote includes
//! must stay on the host of the enclosing source; cycles and excessive
//! nesting are rejected. Conditional blocks are evaluated against a
//! configured platform string before include expansion.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;
use url::Url;

use crate::error::{CompilerError, Result};
use crate::fetch::{fetch_with_retry, read_local, split_lines, CancellationToken, Fetcher, RetryPolicy};

/// Maximum include nesting depth.
pub const MAX_INCLUDE_DEPTH: usize = 16;

static INCLUDE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!#include\s+(\S+)\s*$").expect("static pattern"));

/// Canonical location of a source or include target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A remote URL.
    Remote(Url),
    /// A local filesystem path.
    Local(PathBuf),
}

impl SourceLocation {
    /// Parse a top-level source reference.
    ///
    /// # Errors
    ///
    /// Returns a URL parse error for malformed `http(s)` references.
    pub fn new(reference: &str) -> Result<Self> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            Ok(Self::Remote(Url::parse(reference)?))
        } else {
            Ok(Self::Local(PathBuf::from(reference)))
        }
    }

    /// Canonical key for cycle detection.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Remote(url) => url.as_str().to_string(),
            Self::Local(path) => path.display().to_string(),
        }
    }

    /// Resolve an `!#include` reference against this location.
    ///
    /// Remote parents resolve references as URLs and enforce the
    /// same-origin rule; local parents resolve relative paths against
    /// their directory.
    ///
    /// # Errors
    ///
    /// Returns `CrossOriginInclude` when a remote include lands on a
    /// different host than its parent.
    pub fn resolve_include(&self, reference: &str) -> Result<Self> {
        match self {
            Self::Remote(parent) => {
                let child = parent.join(reference)?;
                if child.host_str() != parent.host_str() {
                    return Err(CompilerError::CrossOriginInclude {
                        include: reference.to_string(),
                        origin: parent.as_str().to_string(),
                    });
                }
                Ok(Self::Remote(child))
            }
            Self::Local(parent) => {
                if reference.starts_with("http://") || reference.starts_with("https://") {
                    return Ok(Self::Remote(Url::parse(reference)?));
                }
                let base = parent.parent().unwrap_or_else(|| Path::new("."));
                Ok(Self::Local(base.join(reference)))
            }
        }
    }
}

/// Loads a source and expands its preprocessor directives.
pub struct Preprocessor<'a> {
    fetcher: &'a dyn Fetcher,
    retry: &'a RetryPolicy,
    cancel: &'a CancellationToken,
    platform: String,
}

impl<'a> Preprocessor<'a> {
    /// Create a preprocessor bound to a fetcher and retry policy.
    pub fn new(
        fetcher: &'a dyn Fetcher,
        retry: &'a RetryPolicy,
        cancel: &'a CancellationToken,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            retry,
            cancel,
            platform: platform.into(),
        }
    }

    /// Load a source and return its fully expanded lines.
    ///
    /// # Errors
    ///
    /// Propagates fetch errors and include violations (`CrossOriginInclude`,
    /// `IncludeCycle`, `IncludeDepthExceeded`).
    pub async fn load(&self, location: &SourceLocation) -> Result<Vec<String>> {
        let mut visited = HashSet::new();
        self.load_recursive(location.clone(), 0, &mut visited).await
    }

    fn load_recursive<'b>(
        &'b self,
        location: SourceLocation,
        depth: usize,
        visited: &'b mut HashSet<String>,
    ) -> BoxFuture<'b, Result<Vec<String>>> {
        async move {
            self.cancel.check()?;

            let key = location.key();
            if !visited.insert(key.clone()) {
                return Err(CompilerError::IncludeCycle(key));
            }
            if depth > MAX_INCLUDE_DEPTH {
                return Err(CompilerError::IncludeDepthExceeded {
                    depth,
                    max: MAX_INCLUDE_DEPTH,
                    include: key,
                });
            }

            let content = match &location {
                SourceLocation::Remote(url) => {
                    fetch_with_retry(self.fetcher, url.as_str(), self.retry, self.cancel).await?
                }
                SourceLocation::Local(path) => read_local(path).await?,
            };

            let lines = apply_conditionals(split_lines(&content), &self.platform);

            let mut expanded = Vec::with_capacity(lines.len());
            for line in lines {
                if let Some(reference) = parse_include_directive(&line) {
                    let child = location.resolve_include(&reference)?;
                    tracing::debug!("Expanding include '{}' from '{}'", reference, key);
                    let mut child_lines =
                        self.load_recursive(child, depth + 1, visited).await?;
                    expanded.append(&mut child_lines);
                } else {
                    expanded.push(line);
                }
            }

            visited.remove(&key);
            Ok(expanded)
        }
        .boxed()
    }
}

/// Extract the reference from an `!#include` directive line, if any.
#[must_use]
pub fn parse_include_directive(line: &str) -> Option<String> {
    INCLUDE_DIRECTIVE
        .captures(line.trim())
        .map(|caps| caps[1].to_string())
}

/// Evaluate `!#if` / `!#else` / `!#endif` blocks against a platform string.
///
/// Unknown identifiers evaluate to false; a malformed expression excludes
/// its whole block, else-branch included. Directive lines are consumed.
#[must_use]
pub fn apply_conditionals(lines: Vec<String>, platform: &str) -> Vec<String> {
    struct Frame {
        parent_active: bool,
        condition: bool,
        // A malformed expression poisons both branches.
        poisoned: bool,
        in_else: bool,
    }

    let mut output = Vec::with_capacity(lines.len());
    let mut stack: Vec<Frame> = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if let Some(expr) = parse_if_directive(trimmed) {
            let parent_active = stack.last().map_or(true, frame_active);
            match eval_expression(expr, platform) {
                Ok(condition) => stack.push(Frame {
                    parent_active,
                    condition,
                    poisoned: false,
                    in_else: false,
                }),
                Err(reason) => {
                    tracing::warn!("Excluding conditional block: {}", reason);
                    stack.push(Frame {
                        parent_active,
                        condition: false,
                        poisoned: true,
                        in_else: false,
                    });
                }
            }
            continue;
        }
        if trimmed == "!#else" {
            if let Some(frame) = stack.last_mut() {
                frame.in_else = true;
            } else {
                tracing::warn!("Ignoring '!#else' without matching '!#if'");
            }
            continue;
        }
        if trimmed == "!#endif" {
            if stack.pop().is_none() {
                tracing::warn!("Ignoring '!#endif' without matching '!#if'");
            }
            continue;
        }

        if stack.iter().all(frame_active_ref) {
            output.push(line);
        }
    }

    fn frame_active(frame: &Frame) -> bool {
        if frame.poisoned {
            return false;
        }
        frame.parent_active && (frame.condition != frame.in_else)
    }

    fn frame_active_ref(frame: &Frame) -> bool {
        frame_active(frame)
    }

    output
}

/// Extract the expression from an `!#if` directive line, if any.
fn parse_if_directive(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix("!#if")?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Evaluate a conditional expression: literals `true`/`false`, `!`, `&&`,
/// `||`, parentheses, and platform identifiers (case-insensitive).
fn eval_expression(expr: &str, platform: &str) -> std::result::Result<bool, String> {
    let tokens = tokenize(expr)?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        platform,
    };
    let value = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("trailing tokens in expression '{expr}'"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(expr: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err("expected '&&'".to_string());
                }
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err("expected '||'".to_string());
                }
                tokens.push(Token::Or);
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    platform: &'a str,
}

impl ExprParser<'_> {
    fn parse_or(&mut self) -> std::result::Result<bool, String> {
        let mut value = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn parse_and(&mut self) -> std::result::Result<bool, String> {
        let mut value = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn parse_unary(&mut self) -> std::result::Result<bool, String> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(!self.parse_unary()?)
            }
            Some(Token::Open) => {
                self.pos += 1;
                let value = self.parse_or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err("unbalanced parentheses".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(Token::Ident(ident)) => {
                let value = if ident.eq_ignore_ascii_case("true") {
                    true
                } else if ident.eq_ignore_ascii_case("false") {
                    false
                } else {
                    // Unknown identifiers are false
                    ident.eq_ignore_ascii_case(self.platform)
                };
                self.pos += 1;
                Ok(value)
            }
            _ => Err("expected expression".to_string()),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }
}
