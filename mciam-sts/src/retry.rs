//! Bounded retries with exponential backoff.
//!
//! Only failures the caller marks as retryable are repeated. For STS calls
//! that means transport failures; a provider that answered with an error
//! status is never asked again.
//!
//! ```rust,no_run
//! use mciam_sts::retry::{with_retry_if, RetryConfig};
//!
//! #[derive(Debug)]
//! enum CallError {
//!     Connect,
//!     Denied,
//! }
//!
//! impl std::fmt::Display for CallError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! async fn example() -> Result<(), CallError> {
//!     with_retry_if(
//!         &RetryConfig::default(),
//!         || async { Err(CallError::Connect) },
//!         |err| matches!(err, CallError::Connect),
//!     )
//!     .await
//! }
//! ```

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and backoff curve for one outbound call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,

    /// Pause after the first failure
    pub initial_delay: Duration,

    /// Upper bound for any pause
    pub max_delay: Duration,

    /// Growth factor applied to the pause after each failure
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no pause.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
        }
    }

    /// Pause before attempt `n + 1`, where `n` failures have happened.
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = self.exponential_base.powi(failures.saturating_sub(1) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `call` until it succeeds, fails with an error `is_retryable`
/// rejects, or the attempt budget is spent.
///
/// The last error is returned when the budget runs out.
pub async fn with_retry_if<F, Fut, T, E, P>(config: &RetryConfig, mut call: F, is_retryable: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let budget = config.max_attempts.max(1);
    let mut failures = 0;

    loop {
        let err = match call().await {
            Ok(value) => {
                if failures > 0 {
                    debug!(failures, "Call succeeded after transport failures");
                }
                return Ok(value);
            }
            Err(err) => err,
        };
        failures += 1;

        if !is_retryable(&err) || failures >= budget {
            if failures > 1 {
                warn!(attempts = failures, error = %err, "Giving up on call");
            }
            return Err(err);
        }

        let pause = config.backoff(failures);
        warn!(
            attempt = failures,
            of = budget,
            pause_ms = pause.as_millis() as u64,
            error = %err,
            "Transport failure, retrying"
        );
        tokio::time::sleep(pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            exponential_base: 2.0,
        }
    }

    /// Fails with `err` for the first `failures` calls, then yields 7.
    async fn flaky(calls: &AtomicU32, failures: u32, err: &'static str) -> Result<u32, &'static str> {
        if calls.fetch_add(1, Ordering::SeqCst) < failures {
            Err(err)
        } else {
            Ok(7)
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = fast(5);
        assert_eq!(config.backoff(1), Duration::from_millis(1));
        assert_eq!(config.backoff(2), Duration::from_millis(2));
        assert_eq!(config.backoff(3), Duration::from_millis(4));
        assert_eq!(config.backoff(9), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn test_transient_failures_are_absorbed() {
        let calls = AtomicU32::new(0);
        let result = with_retry_if(&fast(3), || flaky(&calls, 2, "connection reset"), |_| true).await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_is_respected() {
        let calls = AtomicU32::new(0);
        let result = with_retry_if(&fast(3), || flaky(&calls, 10, "connection refused"), |_| true).await;

        assert_eq!(result, Err("connection refused"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_final_answers_are_not_repeated() {
        let calls = AtomicU32::new(0);
        let result = with_retry_if(
            &fast(3),
            || flaky(&calls, 10, "403 AccessDenied"),
            |err: &&str| !err.contains("403"),
        )
        .await;

        assert_eq!(result, Err("403 AccessDenied"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_makes_one_call() {
        let calls = AtomicU32::new(0);
        let _ = with_retry_if(&RetryConfig::no_retry(), || flaky(&calls, 10, "timeout"), |_| true).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
