//! Source compilation and the filter compiler orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use uuid::Uuid;

use crate::cache::{content_hash, SourceCache};
use crate::checksum;
use crate::config::{self, FilterConfig, FilterSource};
use crate::error::{CompilerError, Result};
use crate::events::{
    CompilationCompleteEventArgs, DiagnosticsEmitter, EventDispatcher, ProgressEventArgs,
    ProgressPhase, SourceCompleteEventArgs, SourceErrorEventArgs, SourceStartEventArgs,
    TransformationCompleteEventArgs, TransformationErrorEventArgs, TransformationEventArgs,
};
use crate::fetch::{
    fetch_with_retry, read_local, split_lines, CancellationToken, Fetcher, HttpFetcher,
    RetryPolicy,
};
use crate::header::{self, Clock, SystemClock};
use crate::metrics::{time_sync, CompilationMetrics, StageTiming};
use crate::preprocessor::{Preprocessor, SourceLocation};
use crate::transform::{
    filter, Conflict, ConflictResolution, FilterPatterns, TransformContext,
    TransformationPipeline, TransformationRegistry,
};

/// Options controlling a compilation run.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Platform string matched by `!#if` conditionals.
    pub platform: String,
    /// Skip sources that fail to fetch instead of aborting.
    pub ignore_failed_sources: bool,
    /// Auto-resolution strategy for detected conflicts.
    pub conflict_resolution: Option<ConflictResolution>,
    /// Option names stripped by RemoveModifiers.
    pub removed_modifiers: Vec<String>,
    /// Retry policy for network fetches.
    pub retry: RetryPolicy,
    /// Per-request timeout for the HTTP fetcher.
    pub request_timeout: Duration,
    /// Deadline for the whole compilation, if any.
    pub total_deadline: Option<Duration>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            platform: String::new(),
            ignore_failed_sources: false,
            conflict_resolution: None,
            removed_modifiers: vec!["third-party".to_string()],
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            total_deadline: None,
        }
    }
}

impl CompilerOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the platform string for conditional directives.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Skip failing sources instead of aborting the run.
    #[must_use]
    pub const fn with_ignore_failed_sources(mut self, ignore: bool) -> Self {
        self.ignore_failed_sources = ignore;
        self
    }

    /// Set the conflict auto-resolution strategy.
    #[must_use]
    pub const fn with_conflict_resolution(mut self, strategy: ConflictResolution) -> Self {
        self.conflict_resolution = Some(strategy);
        self
    }

    /// Bound the whole compilation by a deadline.
    #[must_use]
    pub const fn with_total_deadline(mut self, deadline: Duration) -> Self {
        self.total_deadline = Some(deadline);
        self
    }
}

/// The result of a compilation run.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    /// Name from the configuration.
    pub config_name: String,
    /// Version from the configuration.
    pub config_version: Option<String>,
    /// The compiled list, line by line.
    pub lines: Vec<String>,
    /// Number of rules in the output (comments excluded).
    pub rule_count: usize,
    /// The embedded checksum value.
    pub checksum: String,
    /// Conflicts reported by ConflictDetection, if it ran.
    pub conflicts: Vec<Conflict>,
    /// Per-run metrics.
    pub metrics: CompilationMetrics,
    /// Correlation id shared by this run's diagnostics.
    pub correlation_id: Uuid,
    /// Start time.
    pub start_time: DateTime<Utc>,
    /// End time.
    pub end_time: DateTime<Utc>,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

impl CompilationResult {
    /// The compiled list as a single newline-joined string.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Count the rules in a compiled list, skipping comments and blanks.
#[must_use]
pub fn count_rules(lines: &[String]) -> usize {
    lines
        .iter()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('!') && !trimmed.starts_with('#')
        })
        .count()
}

struct SourceOutcome {
    rules: Vec<String>,
    conflicts: Vec<Conflict>,
    timing: StageTiming,
}

/// Compiles a configuration into a single filter list.
///
/// # Examples
///
/// ```no_run
/// use hostlist_compiler::{CompilerOptions, FilterCompiler};
///
/// # async fn demo(config: hostlist_compiler::FilterConfig) -> hostlist_compiler::Result<()> {
/// let compiler = FilterCompiler::new(CompilerOptions::default())?;
/// let result = compiler.compile(&config).await?;
/// println!("{} rules", result.rule_count);
/// # Ok(())
/// # }
/// ```
pub struct FilterCompiler {
    fetcher: Arc<dyn Fetcher>,
    registry: TransformationRegistry,
    options: CompilerOptions,
    events: EventDispatcher,
    diagnostics: DiagnosticsEmitter,
    cache: SourceCache,
    cancel: CancellationToken,
    clock: Box<dyn Clock>,
}

impl FilterCompiler {
    /// Create a compiler with the HTTP fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to initialize.
    pub fn new(options: CompilerOptions) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(options.request_timeout)?);
        Ok(Self::with_fetcher(fetcher, options))
    }

    /// Create a compiler with a custom fetcher.
    #[must_use]
    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>, options: CompilerOptions) -> Self {
        Self {
            fetcher,
            registry: TransformationRegistry::new(),
            options,
            events: EventDispatcher::new(),
            diagnostics: DiagnosticsEmitter::new(),
            cache: SourceCache::new(),
            cancel: CancellationToken::new(),
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the clock used for header timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Access the event dispatcher to register handlers.
    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }

    /// A token that cancels this compiler's runs.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Compile a configuration into the final filter list.
    ///
    /// Sources are fetched concurrently; the merged order always follows
    /// the configured source order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationInvalid` before any fetch, fetch/include
    /// errors per source (unless `ignore_failed_sources`), transformation
    /// failures, `NetworkTimeout` when the total deadline trips, or
    /// `Cancelled`.
    pub async fn compile(&self, config: &FilterConfig) -> Result<CompilationResult> {
        match self.options.total_deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.compile_inner(config))
                .await
                .map_err(|_| {
                    CompilerError::NetworkTimeout("total compilation deadline".to_string())
                })?,
            None => self.compile_inner(config).await,
        }
    }

    async fn compile_inner(&self, config: &FilterConfig) -> Result<CompilationResult> {
        let started = Instant::now();
        let start_time = Utc::now();
        self.diagnostics.operation_started("compilation");

        config::validate(config)?;
        self.cancel.check()?;

        let mut metrics = CompilationMetrics {
            source_count: config.sources.len(),
            ..Default::default()
        };

        let exclusions = self
            .load_patterns(&config.exclusions, &config.exclusions_sources)
            .await?;
        let inclusions = self
            .load_patterns(&config.inclusions, &config.inclusions_sources)
            .await?;

        // Per-source compilation, concurrent; merge order stays configured
        // source order because join_all preserves input order.
        let total = config.sources.len();
        let outcomes = join_all(
            config
                .sources
                .iter()
                .enumerate()
                .map(|(index, source)| self.compile_source(index, total, source)),
        )
        .await;

        let mut merged: Vec<String> = Vec::new();
        let mut conflicts: Vec<Conflict> = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let source = &config.sources[index];
            match outcome {
                Ok(outcome) => {
                    metrics.record(outcome.timing);
                    conflicts.extend(outcome.conflicts);
                    merged.extend(outcome.rules);
                }
                Err(CompilerError::Cancelled) => return Err(CompilerError::Cancelled),
                Err(err) if self.options.ignore_failed_sources => {
                    tracing::warn!(
                        "Skipping source '{}': {}",
                        source.display_name(),
                        err
                    );
                    self.events.raise_source_error(&SourceErrorEventArgs {
                        source_name: source.display_name().to_string(),
                        error_message: err.to_string(),
                        skipped: true,
                    });
                }
                Err(err) => {
                    self.events.raise_source_error(&SourceErrorEventArgs {
                        source_name: source.display_name().to_string(),
                        error_message: err.to_string(),
                        skipped: false,
                    });
                    self.diagnostics.operation_failed("compilation", &err.to_string());
                    return Err(err);
                }
            }
            self.events.raise_progress(&ProgressEventArgs {
                phase: ProgressPhase::Sources,
                current: index + 1,
                total,
                message: format!("source {} of {}", index + 1, total),
            });
        }

        metrics.rule_count = merged.len();

        // Global transformations in canonical order, then Exclude/Include
        let pipeline = TransformationPipeline::from_names(&self.registry, &config.transformations);
        let mut ctx = self.transform_context();
        let mut lines = merged;
        let stage_total = pipeline.stages().len() + 2;
        for (stage_index, stage) in pipeline.stages().iter().enumerate() {
            self.cancel.check()?;
            let rules_in = lines.len();
            self.events.raise_transformation_start(&TransformationEventArgs {
                transformation: stage.name().to_string(),
                rule_count: rules_in,
            });

            let taken = std::mem::take(&mut lines);
            let (applied, timing) =
                time_sync(stage.name(), Some(rules_in), || stage.apply(taken, &mut ctx));
            match applied {
                Ok(out) => lines = out,
                Err(err) => {
                    self.events
                        .raise_transformation_error(&TransformationErrorEventArgs {
                            transformation: stage.name().to_string(),
                            error_message: err.to_string(),
                        });
                    return Err(CompilerError::transformation(
                        stage.name(),
                        Some(rules_in),
                        err.to_string(),
                    ));
                }
            }

            self.events
                .raise_transformation_complete(&TransformationCompleteEventArgs {
                    transformation: stage.name().to_string(),
                    rules_in,
                    rules_out: lines.len(),
                    duration_ms: timing.duration_ms,
                });
            self.events.raise_progress(&ProgressEventArgs {
                phase: ProgressPhase::Transformations,
                current: stage_index + 1,
                total: stage_total,
                message: stage.name().to_string(),
            });
            metrics.record(timing);
        }
        conflicts.extend(std::mem::take(&mut ctx.conflicts));

        self.cancel.check()?;
        let (lines, timing) = {
            let count = lines.len();
            time_sync("Exclude", Some(count), || filter::exclude(lines, &exclusions))
        };
        metrics.record(timing);
        let (lines, timing) = {
            let count = lines.len();
            time_sync("Include", Some(count), || filter::include(lines, &inclusions))
        };
        metrics.record(timing);

        // Header and checksum
        let body = header::strip_upstream_metadata(lines);
        let mut output = header::generate_header(config, self.clock.as_ref());
        output.extend(body);
        let output = checksum::insert(output);
        let checksum_value = checksum::calculate(&output);

        let rule_count = count_rules(&output);
        metrics.output_rule_count = rule_count;
        metrics.total_duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let end_time = Utc::now();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.events
            .raise_compilation_complete(&CompilationCompleteEventArgs {
                rule_count,
                duration_ms: metrics.total_duration_ms,
            });
        self.diagnostics
            .operation_completed("compilation", metrics.total_duration_ms);

        Ok(CompilationResult {
            config_name: config.name.clone(),
            config_version: config.version.clone(),
            lines: output,
            rule_count,
            checksum: checksum_value,
            conflicts,
            metrics,
            correlation_id: self.diagnostics.correlation_id(),
            start_time,
            end_time,
            elapsed_ms,
        })
    }

    /// Fetch, preprocess, transform, and filter a single source.
    async fn compile_source(
        &self,
        index: usize,
        total: usize,
        source: &FilterSource,
    ) -> Result<SourceOutcome> {
        self.cancel.check()?;
        let name = source.display_name().to_string();
        self.events.raise_source_start(&SourceStartEventArgs {
            source_index: index,
            total_sources: total,
            source_name: name.clone(),
        });

        let started = Instant::now();
        let location = SourceLocation::new(&source.source)?;
        let preprocessor = Preprocessor::new(
            self.fetcher.as_ref(),
            &self.options.retry,
            &self.cancel,
            self.options.platform.clone(),
        );
        let raw_lines = preprocessor.load(&location).await.map_err(|err| match err {
            CompilerError::NetworkError { .. } | CompilerError::NetworkTimeout(_) => {
                let retryable = err.is_retryable();
                CompilerError::source_fetch(name.clone(), err.to_string(), retryable)
            }
            other => other,
        })?;

        let raw_hash = content_hash(&raw_lines.join("\n"));
        if let Some(rules) = self.cache.get(&source.source, &raw_hash)? {
            self.diagnostics.cache_event("hit", &source.source);
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.events.raise_source_complete(&SourceCompleteEventArgs {
                source_index: index,
                total_sources: total,
                source_name: name.clone(),
                rule_count: rules.len(),
                duration_ms,
            });
            return Ok(SourceOutcome {
                timing: StageTiming::new(format!("source:{name}"), duration_ms, Some(rules.len())),
                conflicts: Vec::new(),
                rules,
            });
        }
        self.diagnostics.cache_event("miss", &source.source);

        let pipeline =
            TransformationPipeline::from_names(&self.registry, &source.transformations);
        let mut ctx = self.transform_context();
        let rules = pipeline.apply(raw_lines, &mut ctx)?;

        let exclusions = self
            .load_patterns(&source.exclusions, &source.exclusions_sources)
            .await?;
        let inclusions = self
            .load_patterns(&source.inclusions, &source.inclusions_sources)
            .await?;
        let rules = filter::exclude(rules, &exclusions);
        let rules = filter::include(rules, &inclusions);

        self.cache.put(&source.source, &raw_hash, rules.clone())?;

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.diagnostics
            .performance_metric(&format!("source:{name}"), duration_ms, Some(rules.len()));
        self.events.raise_source_complete(&SourceCompleteEventArgs {
            source_index: index,
            total_sources: total,
            source_name: name,
            rule_count: rules.len(),
            duration_ms,
        });

        Ok(SourceOutcome {
            timing: StageTiming::new(
                format!("source:{}", source.display_name()),
                duration_ms,
                Some(rules.len()),
            ),
            conflicts: ctx.conflicts,
            rules,
        })
    }

    /// Load and compile filter patterns from inline lists and pattern
    /// sources.
    async fn load_patterns(
        &self,
        inline: &[String],
        sources: &[String],
    ) -> Result<FilterPatterns> {
        let mut patterns: Vec<String> = inline.to_vec();
        for source in sources {
            self.cancel.check()?;
            let content = match SourceLocation::new(source)? {
                SourceLocation::Remote(url) => {
                    fetch_with_retry(
                        self.fetcher.as_ref(),
                        url.as_str(),
                        &self.options.retry,
                        &self.cancel,
                    )
                    .await?
                }
                SourceLocation::Local(path) => read_local(&path).await?,
            };
            patterns.extend(
                split_lines(&content)
                    .into_iter()
                    .map(|line| line.trim().to_string())
                    .filter(|line| {
                        !line.is_empty() && !line.starts_with('!') && !line.starts_with('#')
                    }),
            );
        }
        FilterPatterns::compile(&patterns)
    }

    fn transform_context(&self) -> TransformContext {
        TransformContext {
            removed_modifiers: self.options.removed_modifiers.clone(),
            conflict_resolution: self.options.conflict_resolution,
            conflicts: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_rules() {
        let lines: Vec<String> = [
            "! Comment",
            "# Another comment",
            "||example.com^",
            "||test.org^",
            "",
            "@@||allowed.com^",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
        assert_eq!(count_rules(&lines), 3);
    }

    #[test]
    fn test_options_builders() {
        let options = CompilerOptions::new()
            .with_platform("windows")
            .with_ignore_failed_sources(true)
            .with_conflict_resolution(ConflictResolution::KeepAllow);
        assert_eq!(options.platform, "windows");
        assert!(options.ignore_failed_sources);
        assert_eq!(
            options.conflict_resolution,
            Some(ConflictResolution::KeepAllow)
        );
    }
}
