//! Yahoo Finance chart API client
//!
//! Fetches daily OHLC bars with:
//! - Exchange suffix handling (RELIANCE -> RELIANCE.NS)
//! - Request pacing through a shared rate limiter
//! - Bounded retry with exponential backoff on transient failures

use chrono::{Duration, NaiveDate};
use reqwest::{Client, StatusCode};
use std::time::Duration as StdDuration;
use thiserror::Error;
use tracing::debug;

use super::types::ChartResponse;
use crate::common::{retry_with_backoff, RateLimiter, RateLimiterConfig, RetryPolicy, Transient};
use crate::config::DataSourceConfig;
use crate::PriceBar;

/// Suffixes that already name an exchange
const EXCHANGE_SUFFIXES: &[&str] = &[".NS", ".BO"];

#[derive(Debug, Error)]
pub enum YahooError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("no data: {0}")]
    NoData(String),
}

impl Transient for YahooError {
    fn is_transient(&self) -> bool {
        match self {
            YahooError::Network(_) => true,
            YahooError::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            YahooError::Parse(_) | YahooError::NoData(_) => false,
        }
    }
}

pub type YahooResult<T> = Result<T, YahooError>;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub symbol_suffix: String,
    pub user_agent: String,
    pub timeout: StdDuration,
    pub retry: RetryPolicy,
    pub rate_limiter: RateLimiterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&DataSourceConfig::default())
    }
}

impl From<&DataSourceConfig> for ClientConfig {
    fn from(cfg: &DataSourceConfig) -> Self {
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            symbol_suffix: cfg.symbol_suffix.clone(),
            user_agent: cfg.user_agent.clone(),
            timeout: cfg.timeout(),
            retry: RetryPolicy::new(cfg.max_attempts, cfg.backoff()),
            rate_limiter: RateLimiterConfig::default().with_rate(cfg.requests_per_second),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: usize) -> Self {
        self.rate_limiter = self.rate_limiter.with_rate(requests_per_second);
        self
    }
}

/// Yahoo Finance chart API client
#[derive(Debug, Clone)]
pub struct YahooClient {
    client: Client,
    config: ClientConfig,
    rate_limiter: RateLimiter,
}

impl YahooClient {
    pub fn new(config: ClientConfig) -> YahooResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(10)
            .build()?;

        let rate_limiter = RateLimiter::new(config.rate_limiter.clone());

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Add the configured exchange suffix to bare symbols
    pub fn to_exchange_symbol(&self, symbol: &str) -> String {
        let symbol = symbol.trim().to_uppercase();
        if self.config.symbol_suffix.is_empty()
            || symbol.contains('.')
            || EXCHANGE_SUFFIXES.iter().any(|s| symbol.ends_with(s))
        {
            symbol
        } else {
            format!("{}{}", symbol, self.config.symbol_suffix)
        }
    }

    /// Fetch daily bars for `[start, end]` inclusive, retrying transient failures
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> YahooResult<Vec<PriceBar>> {
        let ticker = self.to_exchange_symbol(symbol);
        let ticker = ticker.as_str();

        retry_with_backoff(&self.config.retry, move || async move {
            self.rate_limiter.acquire().await;
            self.request_chart(ticker, start, end).await
        })
        .await
    }

    async fn request_chart(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> YahooResult<Vec<PriceBar>> {
        let url = format!("{}/v8/finance/chart/{}", self.config.base_url, ticker);
        let period1 = unix_seconds(start);
        // period2 is exclusive
        let period2 = unix_seconds(end + Duration::days(1));

        debug!(
            "Fetching chart: ticker={}, start={}, end={}",
            ticker, start, end
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(YahooError::NoData(format!("{} not found", ticker)));
        }

        if !status.is_success() {
            return Err(YahooError::Api { status, body: text });
        }

        let chart: ChartResponse =
            serde_json::from_str(&text).map_err(|e| YahooError::Parse(e.to_string()))?;

        if let Some(err) = chart.chart.error {
            return Err(YahooError::NoData(format!(
                "{}: {} {}",
                ticker, err.code, err.description
            )));
        }

        let bars = chart
            .chart
            .result
            .unwrap_or_default()
            .first()
            .map(|r| r.to_bars())
            .unwrap_or_default();

        if bars.is_empty() {
            return Err(YahooError::NoData(format!(
                "{} has no bars between {} and {}",
                ticker, start, end
            )));
        }

        debug!("Fetched {} bars for {}", bars.len(), ticker);
        Ok(bars)
    }
}

fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}
