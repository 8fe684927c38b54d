//! Bounded connection retries.
//!
//! Batch commands retry on their own with a pause between attempts; the
//! interactive shell lets the user change settings between attempts and only
//! counts consecutive failures with an [`AttemptBudget`].

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Calls `connect` until it succeeds or `attempts` calls have failed.
///
/// `connect` receives the 1-based attempt number. An `attempts` of zero is
/// treated as one. `delay` is slept between failed attempts, not after the last.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn with_retry<T, F, Fut>(attempts: u32, delay: Duration, mut connect: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    "Connection attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, attempts, e, delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            },
            Err(e) => return Err(e),
        }
    }
}

/// Counts consecutive connection failures against a fixed limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    limit: u32,
    failures: u32,
}

impl AttemptBudget {
    /// A `limit` of zero is treated as one.
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            failures: 0,
        }
    }

    /// Records a failure; returns `true` once the limit is reached.
    pub fn fail(&mut self) -> bool {
        self.failures += 1;
        self.failures >= self.limit
    }

    /// A successful connection starts the count over.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use rstest::rstest;
    use std::cell::Cell;

    fn refused(attempt: u32) -> AppError {
        AppError::Store(format!("connection refused on attempt {}", attempt))
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    #[tokio::test]
    async fn test_gives_up_after_limit(#[case] attempts: u32) {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(attempts, Duration::ZERO, |attempt| {
            calls.set(calls.get() + 1);
            async move { Err(refused(attempt)) }
        })
        .await;

        assert_eq!(calls.get(), attempts);
        match result {
            Err(AppError::Store(msg)) => assert!(msg.ends_with(&attempts.to_string())),
            other => panic!("expected the last store error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_later_attempt() {
        let calls = Cell::new(0);
        let value = with_retry(3, Duration::ZERO, |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt < 3 {
                    Err(refused(attempt))
                } else {
                    Ok("connected")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "connected");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(0, Duration::ZERO, |attempt| {
            calls.set(calls.get() + 1);
            async move { Err(refused(attempt)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_success_first_time_does_not_retry() {
        let calls = Cell::new(0);
        let value = with_retry(3, Duration::from_secs(60), |_| {
            calls.set(calls.get() + 1);
            async { Ok(7) }
        })
        .await
        .unwrap();
        assert_eq!((value, calls.get()), (7, 1));
    }

    #[test]
    fn test_budget_counts_consecutive_failures() {
        let mut budget = AttemptBudget::new(3);
        assert!(!budget.fail());
        assert!(!budget.fail());
        budget.reset();
        assert_eq!(budget.failures(), 0);

        assert!(!budget.fail());
        assert!(!budget.fail());
        assert!(budget.fail());
        assert_eq!(budget.failures(), budget.limit());
    }

    #[test]
    fn test_zero_budget_allows_one_attempt() {
        let mut budget = AttemptBudget::new(0);
        assert_eq!(budget.limit(), 1);
        assert!(budget.fail());
    }
}
