//! Transformation registry and pipeline.
//!
//! The pipeline accepts transformation names in any order but always
//! executes them in the canonical order below. Exclude and Include are not
//! named transformations; the compiler applies them after the pipeline.

pub mod compress;
pub mod conflict;
pub mod filter;
pub mod modifiers;
pub mod optimize;
pub mod text;
pub mod validate;

use std::collections::HashMap;

pub use conflict::{Conflict, ConflictRecommendation, ConflictResolution};
pub use filter::FilterPatterns;

use crate::error::Result;

/// Named transformations, declared in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Transformation {
    /// Drop comment lines.
    RemoveComments,
    /// Strip surrounding whitespace from each line.
    TrimLines,
    /// Drop lines that are empty after trimming.
    RemoveEmptyLines,
    /// Append a final empty line if missing.
    InsertFinalNewLine,
    /// Convert non-ASCII domains to Punycode.
    ConvertToAscii,
    /// Emit a matching exception for every plain blocking hostname rule.
    InvertAllow,
    /// Strip configured modifiers from adblock rules.
    RemoveModifiers,
    /// Drop rules that fail validation.
    Validate,
    /// Validate, but permit IP-literal hostnames.
    ValidateAllowIp,
    /// Drop exact duplicates, first occurrence wins.
    Deduplicate,
    /// Canonicalize hostname rules and remove subsumed subdomains.
    Compress,
    /// Detect blocking/exception conflicts per hostname.
    ConflictDetection,
    /// Best-effort semantics-preserving collapser.
    RuleOptimizer,
}

impl Transformation {
    /// All transformations, in canonical order.
    pub const ALL: [Self; 13] = [
        Self::RemoveComments,
        Self::TrimLines,
        Self::RemoveEmptyLines,
        Self::InsertFinalNewLine,
        Self::ConvertToAscii,
        Self::InvertAllow,
        Self::RemoveModifiers,
        Self::Validate,
        Self::ValidateAllowIp,
        Self::Deduplicate,
        Self::Compress,
        Self::ConflictDetection,
        Self::RuleOptimizer,
    ];

    /// The configuration name of this transformation.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RemoveComments => "RemoveComments",
            Self::TrimLines => "TrimLines",
            Self::RemoveEmptyLines => "RemoveEmptyLines",
            Self::InsertFinalNewLine => "InsertFinalNewLine",
            Self::ConvertToAscii => "ConvertToAscii",
            Self::InvertAllow => "InvertAllow",
            Self::RemoveModifiers => "RemoveModifiers",
            Self::Validate => "Validate",
            Self::ValidateAllowIp => "ValidateAllowIp",
            Self::Deduplicate => "Deduplicate",
            Self::Compress => "Compress",
            Self::ConflictDetection => "ConflictDetection",
            Self::RuleOptimizer => "RuleOptimizer",
        }
    }

    /// Apply this transformation to a rule list.
    ///
    /// # Errors
    ///
    /// Returns `TransformationFailed` when a stage fails internally.
    pub fn apply(self, lines: Vec<String>, ctx: &mut TransformContext) -> Result<Vec<String>> {
        let out = match self {
            Self::RemoveComments => text::remove_comments(lines),
            Self::TrimLines => text::trim_lines(lines),
            Self::RemoveEmptyLines => text::remove_empty_lines(lines),
            Self::InsertFinalNewLine => text::insert_final_newline(lines),
            Self::ConvertToAscii => text::convert_to_ascii(lines),
            Self::InvertAllow => modifiers::invert_allow(lines),
            Self::RemoveModifiers => modifiers::remove_modifiers(lines, &ctx.removed_modifiers),
            Self::Validate => validate::validate(lines, false),
            Self::ValidateAllowIp => validate::validate(lines, true),
            Self::Deduplicate => text::deduplicate(lines),
            Self::Compress => compress::compress(lines),
            Self::ConflictDetection => {
                let (lines, conflicts) =
                    conflict::detect_and_resolve(lines, ctx.conflict_resolution);
                ctx.conflicts.extend(conflicts);
                lines
            }
            Self::RuleOptimizer => optimize::optimize(lines),
        };
        Ok(out)
    }
}

/// Registry mapping transformation names to implementations.
///
/// Created once at startup and read-only afterwards.
#[derive(Debug)]
pub struct TransformationRegistry {
    by_name: HashMap<&'static str, Transformation>,
}

impl Default for TransformationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformationRegistry {
    /// Create a registry with every transformation registered.
    #[must_use]
    pub fn new() -> Self {
        let by_name = Transformation::ALL.iter().map(|t| (t.name(), *t)).collect();
        Self { by_name }
    }

    /// Look up a transformation by its configuration name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Transformation> {
        self.by_name.get(name).copied()
    }

    /// Number of registered transformations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Whether `name` is a known transformation name.
#[must_use]
pub fn is_known_transformation(name: &str) -> bool {
    Transformation::ALL.iter().any(|t| t.name() == name)
}

/// Mutable state threaded through a pipeline run.
#[derive(Debug)]
pub struct TransformContext {
    /// Option names stripped by RemoveModifiers.
    pub removed_modifiers: Vec<String>,
    /// Auto-resolution strategy for detected conflicts, if any.
    pub conflict_resolution: Option<ConflictResolution>,
    /// Conflicts collected by ConflictDetection.
    pub conflicts: Vec<Conflict>,
}

impl Default for TransformContext {
    fn default() -> Self {
        Self {
            removed_modifiers: vec!["third-party".to_string()],
            conflict_resolution: None,
            conflicts: Vec::new(),
        }
    }
}

/// An ordered, deduplicated pipeline of transformations.
#[derive(Debug, Clone, Default)]
pub struct TransformationPipeline {
    stages: Vec<Transformation>,
}

impl TransformationPipeline {
    /// Build a pipeline from configured names.
    ///
    /// Names are resolved through the registry, reordered into the
    /// canonical execution order, and deduplicated. Unknown names are
    /// skipped with a warning.
    #[must_use]
    pub fn from_names(registry: &TransformationRegistry, names: &[String]) -> Self {
        let mut stages: Vec<Transformation> = Vec::new();
        for name in names {
            match registry.get(name) {
                Some(transformation) => {
                    if !stages.contains(&transformation) {
                        stages.push(transformation);
                    }
                }
                None => {
                    tracing::warn!("Skipping unknown transformation '{}'", name);
                }
            }
        }
        stages.sort();
        Self { stages }
    }

    /// The stages of this pipeline, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Transformation] {
        &self.stages
    }

    /// Apply every stage in order.
    ///
    /// # Errors
    ///
    /// Propagates the first stage failure as `TransformationFailed`.
    pub fn apply(&self, mut lines: Vec<String>, ctx: &mut TransformContext) -> Result<Vec<String>> {
        for stage in &self.stages {
            let count = lines.len();
            lines = stage.apply(lines, ctx).map_err(|e| {
                crate::error::CompilerError::transformation(stage.name(), Some(count), e.to_string())
            })?;
            tracing::debug!(
                "Transformation {} applied: {} -> {} rules",
                stage.name(),
                count,
                lines.len()
            );
        }
        Ok(lines)
    }
}
