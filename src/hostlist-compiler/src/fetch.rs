//! Fetching seams: remote HTTP, pre-supplied content, and local files,
//! plus the retry policy applied to network fetches.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;

use crate::error::{CompilerError, Result};
use crate::events::sanitize_url;

/// Cooperative cancellation signal, checked at every suspension point.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` after [`CancellationToken::cancel`] was called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CompilerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Abstraction over remote content retrieval.
///
/// Implementations return the response body for a URL. The compiler ships
/// an HTTP implementation and a pre-supplied-content implementation for
/// tests and hosted wrappers.
pub trait Fetcher: Send + Sync {
    /// Fetch the content behind `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Retry policy for network fetches.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Upper bound on the computed delay.
    pub max_delay: Duration,
    /// Random jitter fraction added on top (0.3 = up to 30 %).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Compute the backoff delay before the given 1-based retry attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.factor.powi(attempt.saturating_sub(1) as i32);
        let base = self.initial_delay.as_secs_f64() * exp;
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = rand::rng().random_range(0.0..=self.jitter);
        Duration::from_secs_f64(capped * (1.0 + jitter))
    }
}

/// HTTP fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns a network error if the TLS backend fails to initialize.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hostlist-compiler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                CompilerError::source_fetch("<http-client>", e.to_string(), false)
            })?;
        Ok(Self { client })
    }

    async fn fetch_inner(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status.is_server_error() || status.as_u16() == 429;
            return Err(CompilerError::NetworkError {
                url: sanitize_url(url),
                status_code: Some(status.as_u16()),
                retryable,
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, &e))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String>> {
        self.fetch_inner(url).boxed()
    }
}

fn classify_reqwest_error(url: &str, err: &reqwest::Error) -> CompilerError {
    if err.is_timeout() {
        return CompilerError::NetworkTimeout(sanitize_url(url));
    }
    CompilerError::NetworkError {
        url: sanitize_url(url),
        status_code: err.status().map(|s| s.as_u16()),
        // Connection refused/reset and similar transport failures
        retryable: err.is_connect() || err.is_request(),
    }
}

/// Fetcher serving pre-supplied content from an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    contents: HashMap<String, String>,
}

impl StaticFetcher {
    /// Create an empty static fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register content for a URL.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, content: impl Into<String>) -> Self {
        self.contents.insert(url.into(), content.into());
        self
    }
}

impl Fetcher for StaticFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String>> {
        let result = self.contents.get(url).cloned().ok_or_else(|| {
            CompilerError::source_fetch(url, "no pre-supplied content", false)
        });
        async move { result }.boxed()
    }
}

/// Fetch a URL with retries per the policy.
///
/// Retryable failures (timeouts, connection errors, HTTP 5xx/429) back off
/// exponentially with jitter; terminal failures and cancellation return
/// immediately.
///
/// # Errors
///
/// Returns the last fetch error, or `Cancelled`.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut attempt = 1;
    loop {
        cancel.check()?;
        match fetcher.fetch(url).await {
            Ok(body) => return Ok(body),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    "Fetch attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    sanitize_url(url),
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                cancel.check()?;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Read a local file as UTF-8 text.
///
/// # Errors
///
/// Returns `FileNotFound` or `PermissionDenied` mapped from the IO error.
pub async fn read_local(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CompilerError::from_io(path.display().to_string(), &e))
}

/// Normalize line endings and split content into lines.
#[must_use]
pub fn split_lines(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    content
        .replace("\r\n", "\n")
        .split('\n')
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::new().with("https://example.org/a.txt", "||example.com^");
        let body = fetcher.fetch("https://example.org/a.txt").await.unwrap();
        assert_eq!(body, "||example.com^");
        assert!(fetcher.fetch("https://example.org/missing.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_retry_terminal_error_fails_fast() {
        let fetcher = StaticFetcher::new();
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let err = fetch_with_retry(&fetcher, "https://example.org/x", &policy, &cancel)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_fetch() {
        let fetcher = StaticFetcher::new().with("https://example.org/a.txt", "x");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fetch_with_retry(
            &fetcher,
            "https://example.org/a.txt",
            &RetryPolicy::default(),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CompilerError::Cancelled));
    }

    #[test]
    fn test_backoff_delays_grow_and_cap() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        // Capped at 30 s
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_split_lines_normalizes_crlf() {
        assert_eq!(split_lines("a\r\nb\nc"), vec!["a", "b", "c"]);
        assert!(split_lines("").is_empty());
    }
}
