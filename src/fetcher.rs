//! Market data port
//!
//! The pipeline only sees [`BarFetcher`]; the Yahoo client, the cache and
//! test doubles all sit behind it.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::yahoo::{YahooClient, YahooError};
use crate::PriceBar;

/// Source of daily OHLC bars
#[async_trait]
pub trait BarFetcher: Send + Sync {
    /// Bars for `symbol` between `start` and `end` inclusive, oldest first
    ///
    /// Fails with `InvalidRange` when `start > end`, `NoData` when the source
    /// has nothing for the range, and `DataUnavailable` for anything else.
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalysisResult<Vec<PriceBar>>;
}

#[async_trait]
impl<T: BarFetcher + ?Sized> BarFetcher for Arc<T> {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalysisResult<Vec<PriceBar>> {
        (**self).fetch(symbol, start, end).await
    }
}

pub fn check_range(symbol: &str, start: NaiveDate, end: NaiveDate) -> AnalysisResult<()> {
    if start > end {
        return Err(AnalysisError::InvalidRange {
            symbol: symbol.to_string(),
            start,
            end,
        });
    }
    Ok(())
}

/// Calendar window fetched around a pattern date
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub lookback_days: i64,
    pub lookahead_days: i64,
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self {
            lookback_days: 15,
            lookahead_days: 30,
        }
    }
}

impl FetchWindow {
    pub fn around(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        (
            date - Duration::days(self.lookback_days.max(1)),
            date + Duration::days(self.lookahead_days.max(0)),
        )
    }
}

// =============================================================================
// Yahoo adapter
// =============================================================================

pub struct YahooFetcher {
    client: YahooClient,
}

impl YahooFetcher {
    pub fn new(client: YahooClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BarFetcher for YahooFetcher {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalysisResult<Vec<PriceBar>> {
        check_range(symbol, start, end)?;

        self.client
            .get_daily_bars(symbol, start, end)
            .await
            .map_err(|e| match e {
                YahooError::NoData(reason) => {
                    debug!("No data for {}: {}", symbol, reason);
                    AnalysisError::NoData {
                        symbol: symbol.to_string(),
                    }
                }
                other => AnalysisError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: other.to_string(),
                },
            })
    }
}

// =============================================================================
// Cache
// =============================================================================

type CacheKey = (String, NaiveDate, NaiveDate);

/// Memoizes successful fetches so repeated rows cost one request
///
/// Concurrent requests for the same key share a single in-flight fetch.
/// Failures are not cached; the next caller for that key tries again.
pub struct CachedFetcher<F> {
    inner: F,
    cache: Mutex<HashMap<CacheKey, Arc<OnceCell<Vec<PriceBar>>>>>,
}

impl<F: BarFetcher> CachedFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached (successful) fetches
    pub async fn len(&self) -> usize {
        self.cache
            .lock()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<F: BarFetcher> BarFetcher for CachedFetcher<F> {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalysisResult<Vec<PriceBar>> {
        let key = (symbol.to_uppercase(), start, end);
        let cell = Arc::clone(self.cache.lock().await.entry(key).or_default());

        if let Some(bars) = cell.get() {
            debug!("Cache hit for {} {}..{}", symbol, start, end);
            return Ok(bars.clone());
        }

        let bars = cell
            .get_or_try_init(|| async {
                let bars = self.inner.fetch(symbol, start, end).await?;
                if bars.windows(2).any(|w| w[0].date >= w[1].date) {
                    warn!("Bars for {} were not in date order", symbol);
                }
                Ok::<_, AnalysisError>(bars)
            })
            .await?;

        Ok(bars.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
        delay: Option<std::time::Duration>,
    }

    #[async_trait]
    impl BarFetcher for CountingFetcher {
        async fn fetch(
            &self,
            symbol: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> AnalysisResult<Vec<PriceBar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(AnalysisError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: "down".into(),
                });
            }
            Ok(vec![PriceBar::new_unchecked(start, 10.0, 11.0, 9.0, 10.5)])
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_cache_hits() {
        let fetcher = CachedFetcher::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: None,
        });

        fetcher.fetch("sbin", date(1), date(20)).await.unwrap();
        fetcher.fetch("SBIN", date(1), date(20)).await.unwrap();
        fetcher.fetch("SBIN", date(2), date(20)).await.unwrap();

        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.len().await, 2);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let fetcher = CachedFetcher::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            fail: true,
            delay: None,
        });

        assert!(fetcher.fetch("SBIN", date(1), date(20)).await.is_err());
        assert!(fetcher.fetch("SBIN", date(1), date(20)).await.is_err());

        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 2);
        assert!(fetcher.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_duplicates_share_one_fetch() {
        let fetcher = CachedFetcher::new(CountingFetcher {
            delay: Some(std::time::Duration::from_millis(50)),
            ..CountingFetcher::default()
        });

        let (a, b, c) = tokio::join!(
            fetcher.fetch("SBIN", date(1), date(20)),
            fetcher.fetch("sbin", date(1), date(20)),
            fetcher.fetch("SBIN", date(1), date(20)),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failure_is_retried_by_waiters() {
        let fetcher = CachedFetcher::new(CountingFetcher {
            fail: true,
            delay: Some(std::time::Duration::from_millis(50)),
            ..CountingFetcher::default()
        });

        let (a, b) = tokio::join!(
            fetcher.fetch("SBIN", date(1), date(20)),
            fetcher.fetch("SBIN", date(1), date(20)),
        );

        assert!(a.is_err() && b.is_err());
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 2);
        assert!(fetcher.is_empty().await);
    }

    #[test]
    fn test_check_range() {
        assert!(check_range("SBIN", date(1), date(1)).is_ok());
        assert!(matches!(
            check_range("SBIN", date(2), date(1)),
            Err(AnalysisError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_window_around() {
        let window = FetchWindow {
            lookback_days: 10,
            lookahead_days: 20,
        };
        let (start, end) = window.around(date(15));
        assert_eq!(start, date(5));
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 4, 4).unwrap());
    }
}
