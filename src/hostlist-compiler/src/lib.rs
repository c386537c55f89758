//! # Hostlist Compiler
//!
//! Compiles a configured set of filter-list sources (adblock-syntax rules
//! and `/etc/hosts`-style rules) into a single normalized, deduplicated,
//! validated hostlist with canonical header, checksum, and optional
//! diff/metrics artifacts.
//!
//! The pipeline: per-source fetch with `!#include` expansion and `!#if`
//! conditionals, source-level transformations and filtering, merge in
//! configured order, global transformations in canonical order, global
//! Exclude/Include, header emission, checksum insertion.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hostlist_compiler::{read_config, CompilerOptions, FilterCompiler};
//!
//! # async fn demo() -> hostlist_compiler::Result<()> {
//! let config = read_config("configuration.json", None)?;
//! let compiler = FilterCompiler::new(CompilerOptions::default())?;
//! let result = compiler.compile(&config).await?;
//! println!("{}", result.text());
//! # Ok(())
//! # }
//! ```
//!
//! ## Pre-supplied content
//!
//! Fetching is a seam: swap [`fetch::HttpFetcher`] for
//! [`fetch::StaticFetcher`] to compile from an in-memory content map,
//! which is how the integration tests run without network.

pub mod cache;
pub mod checksum;
pub mod compiler;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod fetch;
pub mod header;
pub mod metrics;
pub mod preprocessor;
pub mod rules;
pub mod tld;
pub mod transform;
pub mod wildcard;

// Re-export main types from the config module
pub use config::{
    detect_format, read_config, to_json, ConfigFormat, FilterConfig, FilterSource, SourceType,
};

// Re-export main types from the compiler module
pub use compiler::{
    count_rules, CompilationResult, CompilerOptions, FilterCompiler,
};

// Re-export error types
pub use error::{CompilerError, Result};

// Re-export rule model types
pub use rules::{classify, AdblockRule, HostsRule, RuleKind};

// Re-export transformation types
pub use transform::{
    Conflict, ConflictRecommendation, ConflictResolution, Transformation,
    TransformationPipeline, TransformationRegistry,
};

// Re-export diff types
pub use diff::{diff, DiffOptions, DiffResult};

// Re-export fetch seams
pub use fetch::{CancellationToken, Fetcher, HttpFetcher, RetryPolicy, StaticFetcher};

// Re-export metrics types
pub use metrics::{CompilationMetrics, StageTiming};

// Re-export event types
pub use events::{DiagnosticsEmitter, EventDispatcher, PipelineEventHandler};

/// Library version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description.
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name_constant() {
        assert_eq!(NAME, "hostlist-compiler");
    }

    #[test]
    fn test_exports() {
        // Verify the main entry points are exported
        let _: fn() -> CompilerOptions = CompilerOptions::new;
        let _: fn() -> TransformationRegistry = TransformationRegistry::new;
        let _: fn(&str) -> RuleKind = classify;
    }
}
