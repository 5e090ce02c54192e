//! Common utilities for market data clients
//!
//! - Rate limiter spacing requests to the data provider
//! - Retry with exponential backoff for transient failures

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{retry_with_backoff, RetryPolicy, Transient};
