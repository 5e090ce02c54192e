//! Request pacing for the market data API
//!
//! Hands out evenly spaced request slots: with a rate of N per second each
//! caller waits until at least `1/N` seconds have passed since the previous
//! slot. Clones share the same schedule, so one limiter can be handed to
//! every concurrent fetch.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum requests allowed per second
    pub max_requests_per_second: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: 10,
        }
    }
}

impl RateLimiterConfig {
    pub fn with_rate(mut self, requests_per_second: usize) -> Self {
        self.max_requests_per_second = requests_per_second;
        self
    }

    /// Spacing between consecutive slots; zero disables pacing
    pub fn interval(&self) -> Duration {
        if self.max_requests_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / self.max_requests_per_second as u32
        }
    }
}

/// Shared request pacer
///
/// # Example
///
/// ```
/// use ohl_backtest::common::RateLimiter;
///
/// #[tokio::main]
/// async fn main() {
///     let limiter = RateLimiter::with_rate(10);
///     limiter.acquire().await;
///     // Make API request...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    next_slot: Arc<Mutex<Option<Instant>>>,
    interval: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            next_slot: Arc::new(Mutex::new(None)),
            interval: config.interval(),
        }
    }

    pub fn with_rate(requests_per_second: usize) -> Self {
        Self::new(RateLimiterConfig::default().with_rate(requests_per_second))
    }

    /// No pacing at all (tests, local sources)
    pub fn unlimited() -> Self {
        Self::with_rate(0)
    }

    /// Wait for the next request slot
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        sleep_until(slot).await;
    }
}
