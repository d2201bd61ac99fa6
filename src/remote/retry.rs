//! Bounded retries with a fixed pause between attempts.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::{error, info, warn};

/// How often and how patiently to retry an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; values below 1 act as 1
    pub max_attempts: usize,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub const fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Attempts that will actually be made.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Delays between attempts; one fewer than the number of attempts.
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        FixedInterval::new(self.delay).take(self.attempts() - 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single()
    }
}

/// Run `operation` under `policy`.
///
/// `operation` receives the 1-based attempt number. An error for which
/// `should_retry` returns `false` ends the loop immediately; otherwise attempts
/// continue until one succeeds or the policy is exhausted, and the last error is
/// returned.
///
/// # Errors
///
/// Returns the error of the final attempt.
///
/// # Examples
///
/// ```
/// use song_relay::remote::{with_retry, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() {
/// let policy = RetryPolicy::new(3, Duration::ZERO);
/// let result: Result<u32, String> = with_retry(
///     &policy,
///     "example",
///     |attempt| async move { if attempt < 2 { Err("flaky".to_string()) } else { Ok(7) } },
///     |_| true,
/// )
/// .await;
/// assert_eq!(result, Ok(7));
/// # }
/// ```
pub async fn with_retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
    mut should_retry: C,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.attempts();
    let attempt = AtomicUsize::new(0);
    let started = Instant::now();

    let result = RetryIf::spawn(
        policy.strategy(),
        || operation(attempt.fetch_add(1, Ordering::SeqCst) + 1),
        |e: &E| {
            let retry = should_retry(e);
            warn!(
                operation = label,
                attempt = attempt.load(Ordering::SeqCst),
                max_attempts,
                retry,
                error = %e,
                "Attempt failed"
            );
            retry
        },
    )
    .await;

    let attempts = attempt.load(Ordering::SeqCst);
    let elapsed_ms = started.elapsed().as_millis();
    match &result {
        Ok(_) if attempts > 1 => {
            info!(operation = label, attempts, elapsed_ms, "Retry succeeded");
        }
        Ok(_) => {}
        Err(e) => {
            error!(operation = label, attempts, elapsed_ms, error = %e, "Giving up");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    #[test]
    fn test_strategy_length() {
        assert_eq!(RetryPolicy::single().strategy().count(), 0);
        assert_eq!(RetryPolicy::new(2, Duration::from_secs(210)).strategy().count(), 1);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
    }

    #[test]
    fn test_strategy_is_fixed() {
        let delays: Vec<_> = RetryPolicy::new(4, Duration::from_secs(5)).strategy().collect();
        assert_eq!(delays, vec![Duration::from_secs(5); 3]);
    }

    #[tokio::test]
    async fn test_exhausts_exactly_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(2, Duration::ZERO);

        let counter = calls.clone();
        let result: Result<(), TestError> = with_retry(
            &policy,
            "test",
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_success_on_second_attempt_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let counter = calls.clone();
        let result: Result<usize, TestError> = with_retry(
            &policy,
            "test",
            move |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        Err(TestError::Transient)
                    } else {
                        Ok(attempt)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let counter = calls.clone();
        let result: Result<(), TestError> = with_retry(
            &policy,
            "test",
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            },
            |e| *e == TestError::Transient,
        )
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_fixed_delay_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(210));
        let started = tokio::time::Instant::now();

        let result: Result<(), TestError> =
            with_retry(&policy, "test", |_| async { Err(TestError::Transient) }, |_| true).await;

        assert!(result.is_err());
        assert!(started.elapsed() >= Duration::from_secs(420));
    }
}
