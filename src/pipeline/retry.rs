//! Bounded retry-with-backoff around provider calls.
//!
//! The loop is explicit: computed delay per attempt, a longer fixed wait
//! after a rate-limit classification, and no retry at all for
//! non-retryable categories.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};

/// Retry policy for provider invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier applied per retry
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Fixed wait after a rate-limit response, in milliseconds
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_rate_limit_delay() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            rate_limit_delay_ms: default_rate_limit_delay(),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32, error: &PipelineError) -> Duration {
        if matches!(error, PipelineError::RateLimit(_)) {
            return Duration::from_millis(self.rate_limit_delay_ms);
        }

        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    /// Whether another attempt is permitted after `attempt` failures.
    pub fn should_retry(&self, attempt: u32, error: &PipelineError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}

/// Run `call` until it succeeds or the policy is exhausted.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, label: &str, mut call: F) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.should_retry(attempt, &e) => {
                let delay = policy.delay_for_attempt(attempt, &e);
                warn!(
                    %label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn provider_err() -> PipelineError {
        PipelineError::ProviderInvocation("boom".to_string())
    }

    #[test]
    fn test_backoff_delays() {
        let policy = RetryPolicy {
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 3000,
            ..Default::default()
        };
        let e = provider_err();

        assert_eq!(policy.delay_for_attempt(1, &e), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2, &e), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3, &e), Duration::from_millis(3000)); // capped
    }

    #[test]
    fn test_rate_limit_uses_fixed_delay() {
        let policy = RetryPolicy::default();
        let e = PipelineError::RateLimit("throttled".to_string());
        assert_eq!(policy.delay_for_attempt(1, &e), Duration::from_millis(60_000));
        assert_eq!(policy.delay_for_attempt(2, &e), Duration::from_millis(60_000));
    }

    #[test]
    fn test_non_retryable_stops_immediately() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(1, &PipelineError::Validation("bad".to_string())));
        assert!(!policy.should_retry(1, &PipelineError::ModelUnavailable("gone".to_string())));
        assert!(policy.should_retry(1, &provider_err()));
        assert!(!policy.should_retry(3, &provider_err()));
    }

    #[tokio::test]
    async fn test_with_retry_recovers() {
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 1,
            ..Default::default()
        };
        let calls = AtomicU32::new(0);

        let result = with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(provider_err())
                } else {
                    Ok("recovered")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            ..Default::default()
        };
        let calls = AtomicU32::new(0);

        let result: PipelineResult<()> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(provider_err()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
