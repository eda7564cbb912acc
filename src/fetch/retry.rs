//! Bounded retry with jittered exponential backoff.

use super::{FetchError, SchemaFetcher};
use crate::config::SchemaCacheConfig;
use crate::models::{FetchAttempt, SchemaDocument};
use chrono::Utc;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Retry policy for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Backoff ceiling for the first retry; doubled on each retry.
    pub base_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Loads the policy from config settings.
    #[must_use]
    pub const fn from_config(config: &SchemaCacheConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Upper bound of the delay before retry `retry` (0-based).
    #[must_use]
    pub fn max_delay(&self, retry: u32) -> Duration {
        let factor = 1_u32 << retry.min(16);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Delay before retry `retry` (0-based), drawn uniformly from
    /// `[0, max_delay(retry)]`.
    #[must_use]
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let cap = u64::try_from(self.max_delay(retry).as_millis()).unwrap_or(u64::MAX);
        if cap == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=cap))
    }
}

type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Wraps a fetcher with retry, tracing and metrics.
///
/// Only transient failures ([`FetchError::is_transient`]) are retried.
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
    sleeper: Sleeper,
}

impl<F: SchemaFetcher> RetryingFetcher<F> {
    /// Wraps `inner` with `policy`.
    #[must_use]
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    /// Replaces the sleep function (tests use this to skip real delays).
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the wrapped fetcher.
    #[must_use]
    pub const fn inner(&self) -> &F {
        &self.inner
    }

    fn record_attempt(fetcher: &'static str, status: &'static str, elapsed: Duration) {
        metrics::counter!(
            "schema_fetch_total",
            "fetcher" => fetcher,
            "status" => status
        )
        .increment(1);
        metrics::histogram!("schema_fetch_duration_ms", "fetcher" => fetcher)
            .record(elapsed.as_secs_f64() * 1000.0);
    }
}

impl<F: SchemaFetcher> SchemaFetcher for RetryingFetcher<F> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn endpoint(&self) -> Option<&str> {
        self.inner.endpoint()
    }

    fn fetch(&self) -> Result<SchemaDocument, FetchError> {
        let fetcher = self.inner.name();
        let span = tracing::info_span!(
            "schema.fetch",
            fetcher = fetcher,
            endpoint = self.inner.endpoint().unwrap_or(""),
            attempts = tracing::field::Empty,
            status = tracing::field::Empty,
            error = tracing::field::Empty
        );
        let _enter = span.enter();

        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started_at = Utc::now();
            let start = Instant::now();
            let result = self.inner.fetch();
            let elapsed = start.elapsed();
            span.record("attempts", attempt);

            let err = match result {
                Ok(document) => {
                    FetchAttempt::succeeded(attempt, started_at).log();
                    Self::record_attempt(fetcher, "success", elapsed);
                    span.record("status", "success");
                    return Ok(document);
                },
                Err(err) => err,
            };

            FetchAttempt::failed(attempt, started_at, err.outcome(), err.to_string()).log();
            Self::record_attempt(fetcher, err.outcome().as_str(), elapsed);

            if !err.is_transient() || attempt >= max_attempts {
                span.record("status", err.outcome().as_str());
                span.record("error", tracing::field::display(&err));
                return Err(err);
            }

            let delay = self.policy.delay_for_attempt(attempt - 1);
            tracing::info!(
                attempt = attempt,
                max_attempts = max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying schema fetch"
            );
            metrics::counter!("schema_fetch_retries_total", "fetcher" => fetcher).increment(1);
            if !delay.is_zero() {
                (self.sleeper)(delay);
            }
        }
    }
}

impl<F: fmt::Debug> fmt::Debug for RetryingFetcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingFetcher")
            .field("inner", &self.inner)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedFetcher {
        calls: AtomicU32,
        script: Mutex<Vec<Result<SchemaDocument, FetchError>>>,
    }

    impl ScriptedFetcher {
        fn new(mut script: Vec<Result<SchemaDocument, FetchError>>) -> Self {
            script.reverse();
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SchemaFetcher for ScriptedFetcher {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn fetch(&self) -> Result<SchemaDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(FetchError::network("script exhausted")))
        }
    }

    fn doc() -> SchemaDocument {
        SchemaDocument::detect("type Query { ok: Boolean }")
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_max_delay_doubles_and_caps() {
        let policy = policy(5);
        assert_eq!(policy.max_delay(0), Duration::from_millis(100));
        assert_eq!(policy.max_delay(1), Duration::from_millis(200));
        assert_eq!(policy.max_delay(2), Duration::from_millis(250));
        assert_eq!(policy.max_delay(40), Duration::from_millis(250));
    }

    #[test]
    fn test_delay_within_jitter_bounds() {
        let policy = policy(5);
        for retry in 0..6 {
            let delay = policy.delay_for_attempt(retry);
            assert!(delay <= policy.max_delay(retry));
        }
        assert_eq!(RetryPolicy::none().delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn test_retries_transient_then_succeeds() {
        let inner = Arc::new(ScriptedFetcher::new(vec![
            Err(FetchError::from_status(503, "unavailable")),
            Err(FetchError::timeout("slow")),
            Ok(doc()),
        ]));
        let slept = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&slept);
        let fetcher = RetryingFetcher::new(Arc::clone(&inner), policy(2))
            .with_sleeper(move |d| recorder.lock().unwrap().push(d));

        let result = fetcher.fetch();

        assert_eq!(result.unwrap(), doc());
        assert_eq!(inner.calls(), 3);
        assert!(slept.lock().unwrap().len() <= 2);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let inner = Arc::new(ScriptedFetcher::new(vec![
            Err(FetchError::network("refused")),
            Err(FetchError::network("refused")),
            Err(FetchError::network("refused")),
            Ok(doc()),
        ]));
        let fetcher = RetryingFetcher::new(Arc::clone(&inner), policy(2)).with_sleeper(|_| {});

        let err = fetcher.fetch().unwrap_err();

        assert!(err.is_transient());
        assert_eq!(inner.calls(), 3);
    }

    #[test]
    fn test_terminal_errors_are_not_retried() {
        for terminal in [
            FetchError::from_status(401, "bad token"),
            FetchError::from_status(404, "missing"),
            FetchError::malformed("empty body"),
        ] {
            let inner = Arc::new(ScriptedFetcher::new(vec![Err(terminal.clone()), Ok(doc())]));
            let fetcher =
                RetryingFetcher::new(Arc::clone(&inner), policy(3)).with_sleeper(|_| {});

            assert_eq!(fetcher.fetch().unwrap_err(), terminal);
            assert_eq!(inner.calls(), 1);
        }
    }
}
