//! Bounded retry with exponential backoff for remote calls

use std::future::Future;
use std::time::Duration;

use crate::config::RetrySettings;

/// How often and how patiently a remote call is retried.
///
/// The delay after failed attempt `n` (1-based) is
/// `min(max_backoff, initial_backoff * 2^(n-1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

/// Successful outcome with the effort it took
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
    /// Total time spent sleeping between attempts
    pub backoff: Duration,
}

/// Final error after the policy gave up
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.initial_backoff_ms),
            Duration::from_millis(settings.max_backoff_ms),
        )
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Worst-case time spent sleeping before giving up
    pub fn max_total_backoff(&self) -> Duration {
        (1..self.attempts()).map(|a| self.backoff_for(a)).sum()
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error
    /// or runs out of attempts. The operation receives the 1-based attempt
    /// number.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<Retried<T>, RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.attempts();
        let mut backoff = Duration::ZERO;
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    return Ok(Retried {
                        value,
                        attempts: attempt,
                        backoff,
                    })
                }
                Err(error) if attempt < max_attempts && is_retryable(&error) => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:.1}s",
                        attempt,
                        max_attempts,
                        error,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    backoff += delay;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}
