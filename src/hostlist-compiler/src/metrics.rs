//! Stage timers and per-run compilation metrics.

use std::future::Future;
use std::time::Instant;

use serde::Serialize;

/// Timing of a single named stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    /// Stage name.
    pub name: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Items processed, if meaningful for the stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    /// Throughput, when both duration and item count are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_per_second: Option<f64>,
}

impl StageTiming {
    /// Build a timing record from raw measurements.
    #[must_use]
    pub fn new(name: impl Into<String>, duration_ms: f64, item_count: Option<usize>) -> Self {
        let items_per_second = item_count.and_then(|count| {
            if duration_ms > 0.0 {
                Some(count as f64 / (duration_ms / 1000.0))
            } else {
                None
            }
        });
        Self {
            name: name.into(),
            duration_ms,
            item_count,
            items_per_second,
        }
    }
}

/// Aggregate metrics for one compilation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationMetrics {
    /// Total wall-clock duration in milliseconds.
    pub total_duration_ms: f64,
    /// Per-stage timings, in execution order.
    pub stages: Vec<StageTiming>,
    /// Number of configured sources.
    pub source_count: usize,
    /// Rules entering the global pipeline.
    pub rule_count: usize,
    /// Rules in the final output.
    pub output_rule_count: usize,
}

impl CompilationMetrics {
    /// Record a stage timing.
    pub fn record(&mut self, timing: StageTiming) {
        self.stages.push(timing);
    }
}

/// Time a synchronous stage.
pub fn time_sync<T>(
    name: &str,
    item_count: Option<usize>,
    f: impl FnOnce() -> T,
) -> (T, StageTiming) {
    let start = Instant::now();
    let result = f();
    let timing = StageTiming::new(name, elapsed_ms(start), item_count);
    (result, timing)
}

/// Time an asynchronous stage.
pub async fn time_async<T, F>(name: &str, item_count: Option<usize>, fut: F) -> (T, StageTiming)
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let result = fut.await;
    let timing = StageTiming::new(name, elapsed_ms(start), item_count);
    (result, timing)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_sync_returns_result_and_timing() {
        let (value, timing) = time_sync("double", Some(4), || 21 * 2);
        assert_eq!(value, 42);
        assert_eq!(timing.name, "double");
        assert_eq!(timing.item_count, Some(4));
        assert!(timing.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_time_async() {
        let (value, timing) = time_async("fetch", None, async { "done" }).await;
        assert_eq!(value, "done");
        assert_eq!(timing.name, "fetch");
        assert_eq!(timing.items_per_second, None);
    }

    #[test]
    fn test_items_per_second() {
        let timing = StageTiming::new("stage", 500.0, Some(1000));
        let rate = timing.items_per_second.unwrap();
        assert!((rate - 2000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_serialize() {
        let mut metrics = CompilationMetrics {
            total_duration_ms: 12.0,
            source_count: 2,
            rule_count: 100,
            output_rule_count: 90,
            ..Default::default()
        };
        metrics.record(StageTiming::new("Deduplicate", 1.5, Some(100)));

        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"source_count\":2"));
        assert!(json.contains("\"Deduplicate\""));
    }
}
