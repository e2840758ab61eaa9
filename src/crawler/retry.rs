//! Retry combinator shared by the listing and detail stages
//!
//! An operation is attempted up to `max_attempts` times. Retryable failures
//! sleep on an exponential backoff schedule before the next attempt; a fatal
//! failure ends the loop immediately. The result is always one of three typed
//! outcomes, never an unwound error.

use crate::config::CrawlConfig;
use crate::FetchError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by one attempt of a fetch operation
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Attempt budget and backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub base_delay: Duration,

    /// Cap on any single backoff delay
    pub max_delay: Duration,

    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier: 2.0,
        }
    }

    /// Page-level policy for the listing stage
    pub fn for_listing(config: &CrawlConfig) -> Self {
        Self::new(
            config.page_retries,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// Item-level policy for the detail stage
    pub fn for_details(config: &CrawlConfig) -> Self {
        Self::new(
            config.detail_attempts,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// A single attempt, no backoff
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay_ms = (self.base_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

/// Result of running an operation under a [`RetryPolicy`]
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),

    /// Every attempt failed with a retryable error; holds the last one
    Exhausted { error: FetchError, attempts: u32 },

    /// A non-retryable error ended the loop
    Fatal(FetchError),
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Runs `operation` against `target` until it succeeds, fails fatally, or the
/// attempt budget is spent
///
/// The target (usually a fetch session) is lent to each attempt in turn.
///
/// # Example
///
/// ```no_run
/// use gleaner::crawler::{with_retry, FetchSession, RetryPolicy};
///
/// # async fn example(session: &mut (dyn FetchSession + 'static)) {
/// let outcome = with_retry(&RetryPolicy::default(), session, |s| s.fetch_listing(0)).await;
/// # }
/// ```
pub async fn with_retry<S, T, F>(policy: &RetryPolicy, target: &mut S, mut operation: F) -> RetryOutcome<T>
where
    S: ?Sized + Send,
    F: for<'a> FnMut(&'a mut S) -> FetchFuture<'a, T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(&mut *target).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Operation succeeded after retry");
                }
                return RetryOutcome::Success(value);
            }
            Err(error) if !error.is_retryable() => {
                return RetryOutcome::Fatal(error);
            }
            Err(error) => {
                tracing::warn!(attempt, max_attempts, error = %error, "Attempt failed");

                if attempt >= max_attempts {
                    return RetryOutcome::Exhausted {
                        error,
                        attempts: attempt,
                    };
                }

                let delay = policy.delay_after(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
