//! Yahoo Finance market data
//!
//! Public chart endpoint, no API key required. Used as the default
//! [`BarFetcher`](crate::fetcher::BarFetcher) implementation.

pub mod client;
pub mod types;

pub use client::{ClientConfig, YahooClient, YahooError, YahooResult};
pub use types::ChartResponse;
