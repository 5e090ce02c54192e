//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Errors that can say whether another attempt might succeed
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff before `attempt` (0-based): 0, base, 2*base, 4*base...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.base_delay * 2u32.saturating_pow(attempt - 1)
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let delay = policy.delay_for(attempt);
        if !delay.is_zero() {
            tracing::debug!("Retrying after {}ms", delay.as_millis());
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}",
                    attempt + 1,
                    policy.max_attempts,
                    e
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
