//! Retry configuration, delay calculation and the shared retry loop.
//!
//! [`RetryConfig`] decides *whether* and *how long*; [`with_retry`] is the
//! explicit loop that sleeps between attempts. The decision functions are
//! pure so they can be tested without a runtime.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::telemetry;
use crate::{Result, WeubError};

/// Fraction of the backoff added as random jitter, at most.
const JITTER_FRACTION: f64 = 0.1;

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with optional jitter:
///
/// ```rust
/// # use weub::pipeline::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(5)
///     .base_delay(Duration::from_millis(200))
///     .jitter(false);
/// assert_eq!(config.backoff_delay(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt. 0 = no retry.
    /// Default: 3.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 1s.
    pub base_delay: Duration,
    /// Upper bound for any single delay. Default: 30s.
    pub max_delay: Duration,
    /// Whether to add up to 10% random jitter. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Whether a failure of attempt number `attempt` (0-indexed) should be
    /// retried.
    ///
    /// Only transport failures and 408/429/5xx statuses are retried, and
    /// never once `attempt` has reached `max_retries`.
    pub fn should_retry(&self, error: &WeubError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }

    /// Un-jittered delay for `attempt` (0-indexed): `base * 2^attempt`,
    /// capped at `max_delay`. Non-decreasing in `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Delay to wait before retrying after attempt `attempt`.
    ///
    /// [`delay_for_attempt`](Self::delay_for_attempt) plus, with jitter on,
    /// up to 10% of it, rounded to the millisecond and never above
    /// `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter {
            return delay;
        }
        let millis = delay.as_millis() as f64;
        let jittered = (millis + millis * JITTER_FRACTION * rand::random::<f64>()).round();
        Duration::from_millis(jittered as u64).min(self.max_delay)
    }

    /// Backoff, or the server's `Retry-After` hint when it gave one.
    /// The hint is also capped at `max_delay`.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.backoff_delay(attempt),
        }
    }
}

// ============================================================================
// Shared retry helper
// ============================================================================

/// Execute an async operation with retry logic.
///
/// Retries while [`RetryConfig::should_retry`] allows it, sleeping
/// [`RetryConfig::effective_delay`] between attempts. Permanent errors are
/// returned immediately; after the last retry the last error is returned.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, method: &str, url: &str, f: F) -> Result<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) if config.should_retry(&e, attempt) => {
                let delay = config.effective_delay(attempt, e.retry_after());
                metrics::counter!(telemetry::RETRIES_TOTAL, "method" => method.to_owned())
                    .increment(1);
                warn!(
                    method,
                    url,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
