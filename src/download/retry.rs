//! Retry-with-backoff around fallible async operations.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::DownloadError;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u32,
    pub max_delay_ms: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 200,
            max_delay_ms: 10_000,
        }
    }
}

impl BackoffPolicy {
    /// Same delays, but allowing `retries` attempts after the first.
    pub fn with_retries(self, retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..self
        }
    }

    /// Delay before retry number `attempt` (0-based), jitter drawn from `rand`.
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms(attempt, rand::random::<f64>()))
    }

    /// `base * 2^attempt`, plus `unit * 25%` jitter, clamped to `max_delay_ms`.
    ///
    /// `unit` is expected in `[0, 1)`.
    pub fn delay_ms(&self, attempt: u32, unit: f64) -> u64 {
        let delay = self.base_delay_ms as f64 * 2f64.powi(attempt.min(63) as i32);
        let jittered = delay + unit * 0.25 * delay;
        jittered.min(self.max_delay_ms as f64).floor() as u64
    }
}

/// Why [`with_retry`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: DownloadError,
    /// Attempts actually started.
    pub attempts: u32,
}

/// Sleep for `delay` unless `cancel` fires first. Returns `false` when cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Run `operation` until it succeeds, retrying errors that
/// [`DownloadError::is_retryable`] accepts.
pub async fn with_retry<T, F, Fut>(
    operation: F,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    with_retry_if(operation, policy, cancel, DownloadError::is_retryable).await
}

/// Like [`with_retry`], with a caller-chosen retry predicate.
///
/// Cancellation is checked before every attempt and during every backoff
/// delay. A [`DownloadError::Cancelled`] from the operation is returned
/// immediately regardless of `should_retry`.
pub async fn with_retry_if<T, F, Fut, P>(
    mut operation: F,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    should_retry: P,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
    P: Fn(&DownloadError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryFailure {
                error: DownloadError::Cancelled,
                attempts,
            });
        }

        attempts += 1;
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if error.is_cancelled() || !should_retry(&error) || attempts >= max_attempts {
            return Err(RetryFailure { error, attempts });
        }

        let delay = policy.delay(attempts - 1);
        warn!(
            attempt = attempts,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Operation failed, retrying"
        );
        if !sleep_or_cancel(delay, cancel).await {
            return Err(RetryFailure {
                error: DownloadError::Cancelled,
                attempts,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts,
            base_delay_ms: 200,
            max_delay_ms: 10_000,
        }
    }

    proptest! {
        #[test]
        fn prop_backoff_within_bounds(attempt in 0u32..=10, unit in 0.0f64..1.0) {
            let p = policy(1);
            let raw = 200.0 * 2f64.powi(attempt as i32);
            let delay = p.delay_ms(attempt, unit) as f64;
            prop_assert!(delay >= raw.min(10_000.0));
            prop_assert!(delay <= (1.25 * raw).min(10_000.0));
        }
    }

    #[test]
    fn test_backoff_exact_values() {
        let p = policy(1);
        assert_eq!(p.delay_ms(0, 0.0), 200);
        assert_eq!(p.delay_ms(0, 0.5), 225);
        assert_eq!(p.delay_ms(3, 0.0), 1600);
        assert_eq!(p.delay_ms(10, 0.0), 10_000);
        assert_eq!(p.delay_ms(u32::MAX, 0.9), 10_000);
    }

    #[test]
    fn test_with_retries() {
        assert_eq!(policy(1).with_retries(0).max_attempts, 1);
        assert_eq!(policy(1).with_retries(3).max_attempts, 4);
        assert_eq!(policy(1).with_retries(u32::MAX).max_attempts, u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let result = with_retry(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DownloadError::Network("reset".into()))
                } else {
                    Ok("done")
                }
            },
            &policy(3),
            &cancel,
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 200ms then 400ms, each with up to 25% jitter
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(600));
        assert!(elapsed <= Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_with_last_error() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = with_retry(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(DownloadError::Network(format!("failure {n}")))
            },
            &policy(3),
            &cancel,
        )
        .await;

        assert_eq!(
            result,
            Err(RetryFailure {
                error: DownloadError::Network("failure 2".into()),
                attempts: 3,
            })
        );
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = with_retry(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DownloadError::Http(404))
            },
            &policy(5),
            &cancel,
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate_overrides_classification() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = with_retry_if(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DownloadError::Cancelled)
            },
            &policy(5),
            &cancel,
            |_| true,
        )
        .await;

        // Cancellation is never retried, even when the predicate says so
        assert_eq!(result.unwrap_err().error, DownloadError::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_precancelled_token_skips_operation() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), _> = with_retry(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            &policy(3),
            &cancel,
        )
        .await;

        assert_eq!(
            result,
            Err(RetryFailure {
                error: DownloadError::Cancelled,
                attempts: 0,
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let slow = BackoffPolicy {
            max_attempts: 5,
            base_delay_ms: 60_000,
            max_delay_ms: 60_000,
        };
        let start = Instant::now();

        let retry = with_retry(
            move || async move { Err::<(), _>(DownloadError::Timeout(Duration::from_secs(1))) },
            &slow,
            &cancel,
        );
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(retry, canceller);

        assert_eq!(
            result,
            Err(RetryFailure {
                error: DownloadError::Cancelled,
                attempts: 1,
            })
        );
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
