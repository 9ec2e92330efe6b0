//! crates/study_notes_core/src/pipeline/retry.rs
//!
//! Bounded retries with exponential backoff.
//!
//! The delay before attempt `n` (n >= 2) is `base * 2^(n-2)`: with the default
//! one second base that is 1s, 2s, 4s, ... Backoff is a `tokio` sleep, so a
//! waiting invocation never blocks others on the same runtime.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy always makes at least one attempt.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// How long to wait before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt - 2))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; `last` is the final failure, unchanged.
    Exhausted { attempts: u32, last: E },
    /// The token was cancelled; no further attempt was started.
    Cancelled,
}

/// Runs `operation` until it succeeds, `policy.max_attempts` is reached, or
/// `cancel` fires. The operation receives the 1-based attempt number.
///
/// Every error is treated as retryable.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = operation(attempt) => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                warn!("Attempt {}/{} failed: {}. Giving up.", attempt, max_attempts, e);
                return Err(RetryError::Exhausted { attempts: attempt, last: e });
            }
            Err(e) => {
                let delay = policy.delay_before(attempt + 1);
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn delays_double_from_the_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(1));
        assert_eq!(policy.delay_before(3), Duration::from_secs(2));
        assert_eq!(policy.delay_before(4), Duration::from_secs(4));
        assert_eq!(policy.delay_before(5), Duration::from_secs(8));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, DEFAULT_BASE_DELAY).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn k_failures_then_success_waits_one_two_four_seconds() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let calls = Mutex::new(Vec::new());

        let result = with_retry(&policy, &cancel, |attempt| {
            let calls = &calls;
            async move {
                calls.lock().unwrap().push(start.elapsed());
                if attempt <= 3 {
                    Err(format!("failure {}", attempt))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(4));
        let calls = calls.into_inner().unwrap();
        assert_eq!(
            calls,
            vec![
                Duration::from_secs(0),
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(7),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_the_last_error_unchanged() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();

        let result: Result<(), _> = with_retry(&policy, &cancel, |attempt| async move {
            Err(format!("failure {}", attempt))
        })
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: "failure 3".to_string()
            })
        );
    }

    #[tokio::test]
    async fn cancelled_token_prevents_any_attempt() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Mutex::new(0u32);

        let result: Result<(), RetryError<String>> = with_retry(&policy, &cancel, |_| {
            let calls = &calls;
            async move {
                *calls.lock().unwrap() += 1;
                Ok(())
            }
        })
        .await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_further_attempts() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });
        let calls = Mutex::new(0u32);

        let result: Result<(), RetryError<String>> = with_retry(&policy, &cancel, |_| {
            let calls = &calls;
            async move {
                *calls.lock().unwrap() += 1;
                Err("upstream down".to_string())
            }
        })
        .await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_an_attempt_in_flight() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });
        let calls = Mutex::new(0u32);
        let start = Instant::now();

        let result: Result<(), RetryError<String>> = with_retry(&policy, &cancel, |_| {
            let calls = &calls;
            async move {
                *calls.lock().unwrap() += 1;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        })
        .await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(start.elapsed() < Duration::from_secs(3600));
    }
}
