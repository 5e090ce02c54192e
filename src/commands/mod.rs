//! Subcommand implementations

pub mod analyze;
pub mod bars;

use anyhow::{Context, Result};
use std::sync::Arc;

use ohl_backtest::fetcher::{BarFetcher, CachedFetcher, YahooFetcher};
use ohl_backtest::yahoo::{ClientConfig, YahooClient};
use ohl_backtest::Config;

/// Cached Yahoo fetcher built from the data source config
fn build_fetcher(config: &Config) -> Result<Arc<dyn BarFetcher>> {
    let client = YahooClient::new(ClientConfig::from(&config.data_source))
        .context("Failed to build market data client")?;
    Ok(Arc::new(CachedFetcher::new(YahooFetcher::new(client))))
}
