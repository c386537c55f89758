//! Event types and handlers for the compilation pipeline.
//!
//! Two layers share this module: typed pipeline events for progress
//! observation, and structured diagnostics events correlated per run.
//! Handlers are optional; a dispatcher with no handlers costs nothing.
//! Handler panics are caught and logged so an observer can never abort a
//! compilation.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use uuid::Uuid;

// =============================================================================
// Pipeline events
// =============================================================================

/// Phase of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Fetching and compiling sources.
    Sources,
    /// Applying transformations.
    Transformations,
}

/// Event arguments for when a source starts loading.
#[derive(Debug, Clone, Default)]
pub struct SourceStartEventArgs {
    /// Index of this source in the source list.
    pub source_index: usize,
    /// Total number of sources.
    pub total_sources: usize,
    /// Source name.
    pub source_name: String,
}

/// Event arguments for when a source has been compiled.
#[derive(Debug, Clone, Default)]
pub struct SourceCompleteEventArgs {
    /// Index of this source.
    pub source_index: usize,
    /// Total number of sources.
    pub total_sources: usize,
    /// Source name.
    pub source_name: String,
    /// Number of rules produced by the source.
    pub rule_count: usize,
    /// Load and transform duration in milliseconds.
    pub duration_ms: f64,
}

/// Event arguments for when a source fails.
#[derive(Debug, Clone, Default)]
pub struct SourceErrorEventArgs {
    /// Source name.
    pub source_name: String,
    /// Error message.
    pub error_message: String,
    /// Whether the source was skipped rather than failing the run.
    pub skipped: bool,
}

/// Event arguments for transformation stage boundaries.
#[derive(Debug, Clone, Default)]
pub struct TransformationEventArgs {
    /// Transformation name.
    pub transformation: String,
    /// Rule count entering the stage.
    pub rule_count: usize,
}

/// Event arguments for when a transformation completes.
#[derive(Debug, Clone, Default)]
pub struct TransformationCompleteEventArgs {
    /// Transformation name.
    pub transformation: String,
    /// Rule count entering the stage.
    pub rules_in: usize,
    /// Rule count leaving the stage.
    pub rules_out: usize,
    /// Stage duration in milliseconds.
    pub duration_ms: f64,
}

/// Event arguments for a transformation failure.
#[derive(Debug, Clone, Default)]
pub struct TransformationErrorEventArgs {
    /// Transformation name.
    pub transformation: String,
    /// Error message.
    pub error_message: String,
}

/// Progress notification.
#[derive(Debug, Clone)]
pub struct ProgressEventArgs {
    /// Current phase.
    pub phase: ProgressPhase,
    /// Completed items in the phase.
    pub current: usize,
    /// Total items in the phase.
    pub total: usize,
    /// Human-readable progress message.
    pub message: String,
}

/// Event arguments for when compilation completes.
#[derive(Debug, Clone, Default)]
pub struct CompilationCompleteEventArgs {
    /// Number of rules in the final output.
    pub rule_count: usize,
    /// Total compilation duration in milliseconds.
    pub duration_ms: f64,
}

/// Trait for observing compilation events.
///
/// All methods have default no-op implementations.
#[allow(unused_variables)]
pub trait PipelineEventHandler: Send + Sync {
    /// Called when a source starts loading.
    fn on_source_start(&self, args: &SourceStartEventArgs) {}

    /// Called when a source has been compiled.
    fn on_source_complete(&self, args: &SourceCompleteEventArgs) {}

    /// Called when a source fails.
    fn on_source_error(&self, args: &SourceErrorEventArgs) {}

    /// Called when a transformation starts.
    fn on_transformation_start(&self, args: &TransformationEventArgs) {}

    /// Called when a transformation completes.
    fn on_transformation_complete(&self, args: &TransformationCompleteEventArgs) {}

    /// Called when a transformation fails.
    fn on_transformation_error(&self, args: &TransformationErrorEventArgs) {}

    /// Called on progress updates.
    fn on_progress(&self, args: &ProgressEventArgs) {}

    /// Called when compilation completes successfully.
    fn on_compilation_complete(&self, args: &CompilationCompleteEventArgs) {}
}

/// Dispatches pipeline events to registered handlers.
///
/// A panicking handler is isolated and logged; remaining handlers still
/// run and compilation continues.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn PipelineEventHandler>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event handler.
    pub fn add_handler(&mut self, handler: Box<dyn PipelineEventHandler>) {
        self.handlers.push(handler);
    }

    /// Get the number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn dispatch(&self, event_name: &str, call: impl Fn(&dyn PipelineEventHandler)) {
        for handler in &self.handlers {
            if catch_unwind(AssertUnwindSafe(|| call(handler.as_ref()))).is_err() {
                tracing::warn!("Event handler panicked during {}", event_name);
            }
        }
    }

    /// Raise the source start event.
    pub fn raise_source_start(&self, args: &SourceStartEventArgs) {
        self.dispatch("SourceStart", |h| h.on_source_start(args));
    }

    /// Raise the source complete event.
    pub fn raise_source_complete(&self, args: &SourceCompleteEventArgs) {
        self.dispatch("SourceComplete", |h| h.on_source_complete(args));
    }

    /// Raise the source error event.
    pub fn raise_source_error(&self, args: &SourceErrorEventArgs) {
        self.dispatch("SourceError", |h| h.on_source_error(args));
    }

    /// Raise the transformation start event.
    pub fn raise_transformation_start(&self, args: &TransformationEventArgs) {
        self.dispatch("TransformationStart", |h| h.on_transformation_start(args));
    }

    /// Raise the transformation complete event.
    pub fn raise_transformation_complete(&self, args: &TransformationCompleteEventArgs) {
        self.dispatch("TransformationComplete", |h| {
            h.on_transformation_complete(args);
        });
    }

    /// Raise the transformation error event.
    pub fn raise_transformation_error(&self, args: &TransformationErrorEventArgs) {
        self.dispatch("TransformationError", |h| h.on_transformation_error(args));
    }

    /// Raise a progress event.
    pub fn raise_progress(&self, args: &ProgressEventArgs) {
        self.dispatch("Progress", |h| h.on_progress(args));
    }

    /// Raise the compilation complete event.
    pub fn raise_compilation_complete(&self, args: &CompilationCompleteEventArgs) {
        self.dispatch("CompilationComplete", |h| h.on_compilation_complete(args));
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Category of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    /// Operation lifecycle (start/complete/error).
    Operation,
    /// Performance measurements.
    Performance,
    /// Cache activity.
    Cache,
    /// Network activity.
    Network,
}

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// Debug-level detail.
    Debug,
    /// Informational.
    Info,
    /// Something degraded but the run continues.
    Warning,
    /// A failure.
    Error,
}

/// A structured diagnostic event.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    /// Unique event id.
    pub event_id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Event category.
    pub category: DiagnosticCategory,
    /// Event severity.
    pub severity: DiagnosticSeverity,
    /// Human-readable message.
    pub message: String,
    /// Correlation id grouping all events of one compilation.
    pub correlation_id: Uuid,
    /// Additional key/value context.
    pub fields: HashMap<String, String>,
}

/// Emits diagnostic events for a single compilation run.
///
/// Every event carries the run's correlation id. Events are forwarded to
/// an optional sink and mirrored to `tracing`.
pub struct DiagnosticsEmitter {
    correlation_id: Uuid,
    sink: Option<Box<dyn Fn(&DiagnosticEvent) + Send + Sync>>,
}

impl std::fmt::Debug for DiagnosticsEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsEmitter")
            .field("correlation_id", &self.correlation_id)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for DiagnosticsEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsEmitter {
    /// Create an emitter with a fresh correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            sink: None,
        }
    }

    /// Attach a sink receiving every emitted event.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn Fn(&DiagnosticEvent) + Send + Sync>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The correlation id for this run.
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Emit an event.
    pub fn emit(
        &self,
        category: DiagnosticCategory,
        severity: DiagnosticSeverity,
        message: impl Into<String>,
        fields: HashMap<String, String>,
    ) {
        let event = DiagnosticEvent {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            category,
            severity,
            message: message.into(),
            correlation_id: self.correlation_id,
            fields,
        };

        match severity {
            DiagnosticSeverity::Debug => {
                tracing::debug!(correlation_id = %self.correlation_id, "{}", event.message);
            }
            DiagnosticSeverity::Info => {
                tracing::info!(correlation_id = %self.correlation_id, "{}", event.message);
            }
            DiagnosticSeverity::Warning => {
                tracing::warn!(correlation_id = %self.correlation_id, "{}", event.message);
            }
            DiagnosticSeverity::Error => {
                tracing::error!(correlation_id = %self.correlation_id, "{}", event.message);
            }
        }

        if let Some(sink) = &self.sink {
            if catch_unwind(AssertUnwindSafe(|| sink(&event))).is_err() {
                tracing::warn!("Diagnostics sink panicked");
            }
        }
    }

    /// Emit an operation-started event.
    pub fn operation_started(&self, operation: &str) {
        self.emit(
            DiagnosticCategory::Operation,
            DiagnosticSeverity::Debug,
            format!("{operation} started"),
            HashMap::new(),
        );
    }

    /// Emit an operation-completed event with its duration.
    pub fn operation_completed(&self, operation: &str, duration_ms: f64) {
        let mut fields = HashMap::new();
        fields.insert("duration_ms".to_string(), format!("{duration_ms:.1}"));
        self.emit(
            DiagnosticCategory::Operation,
            DiagnosticSeverity::Debug,
            format!("{operation} completed"),
            fields,
        );
    }

    /// Emit an operation-failed event.
    pub fn operation_failed(&self, operation: &str, error: &str) {
        let mut fields = HashMap::new();
        fields.insert("error".to_string(), error.to_string());
        self.emit(
            DiagnosticCategory::Operation,
            DiagnosticSeverity::Error,
            format!("{operation} failed"),
            fields,
        );
    }

    /// Emit a performance metric event.
    pub fn performance_metric(&self, name: &str, duration_ms: f64, item_count: Option<usize>) {
        let mut fields = HashMap::new();
        fields.insert("duration_ms".to_string(), format!("{duration_ms:.1}"));
        if let Some(count) = item_count {
            fields.insert("item_count".to_string(), count.to_string());
        }
        self.emit(
            DiagnosticCategory::Performance,
            DiagnosticSeverity::Debug,
            format!("metric {name}"),
            fields,
        );
    }

    /// Emit a cache event (`hit`, `miss`, `write`, `evict`).
    pub fn cache_event(&self, kind: &str, key: &str) {
        let mut fields = HashMap::new();
        fields.insert("key".to_string(), sanitize_url(key));
        self.emit(
            DiagnosticCategory::Cache,
            DiagnosticSeverity::Debug,
            format!("cache {kind}"),
            fields,
        );
    }

    /// Emit a network request event.
    pub fn network_request(&self, url: &str, status: Option<u16>, duration_ms: f64) {
        let mut fields = HashMap::new();
        fields.insert("url".to_string(), sanitize_url(url));
        fields.insert("duration_ms".to_string(), format!("{duration_ms:.1}"));
        if let Some(status) = status {
            fields.insert("status".to_string(), status.to_string());
        }
        self.emit(
            DiagnosticCategory::Network,
            DiagnosticSeverity::Debug,
            format!("request {}", sanitize_url(url)),
            fields,
        );
    }
}

/// Replace the query string of a URL with `[QUERY]`.
///
/// Keeps credentials and tokens out of logs and diagnostics.
#[must_use]
pub fn sanitize_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?[QUERY]"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize_url("https://example.org/list.txt?token=secret"),
            "https://example.org/list.txt?[QUERY]"
        );
        assert_eq!(
            sanitize_url("https://example.org/list.txt"),
            "https://example.org/list.txt"
        );
    }

    #[test]
    fn test_dispatcher_no_handlers() {
        let dispatcher = EventDispatcher::new();
        assert_eq!(dispatcher.handler_count(), 0);
        dispatcher.raise_compilation_complete(&CompilationCompleteEventArgs::default());
    }

    #[test]
    fn test_dispatcher_calls_handlers() {
        struct Counter(Arc<AtomicUsize>);
        impl PipelineEventHandler for Counter {
            fn on_source_start(&self, _args: &SourceStartEventArgs) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(Box::new(Counter(count.clone())));
        dispatcher.raise_source_start(&SourceStartEventArgs::default());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        struct Panicker;
        impl PipelineEventHandler for Panicker {
            fn on_source_start(&self, _args: &SourceStartEventArgs) {
                panic!("handler bug");
            }
        }
        struct Counter(Arc<AtomicUsize>);
        impl PipelineEventHandler for Counter {
            fn on_source_start(&self, _args: &SourceStartEventArgs) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(Box::new(Panicker));
        dispatcher.add_handler(Box::new(Counter(count.clone())));
        // The panicking handler must not prevent later handlers
        dispatcher.raise_source_start(&SourceStartEventArgs::default());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emitter_correlation_id_stable() {
        let captured = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink_events = captured.clone();
        let emitter = DiagnosticsEmitter::new().with_sink(Box::new(move |event| {
            sink_events.lock().unwrap().push(event.correlation_id);
        }));

        emitter.operation_started("compile");
        emitter.operation_completed("compile", 12.5);

        let ids = captured.lock().unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[0], emitter.correlation_id());
    }
}
