//! Bars command implementation
//!
//! Diagnostic view of what the analyzer sees for a single record: the bars
//! in the fetch window and where the pattern day falls.

use anyhow::{Context, Result};
use tracing::info;

use ohl_backtest::data::parse_date;
use ohl_backtest::evaluator::{evaluate, EvalPolicy};
use ohl_backtest::fetcher::FetchWindow;
use ohl_backtest::{BarFetcher, Config, PatternRecord};

pub fn run(config: Config, symbol: String, date: String) -> Result<()> {
    let date =
        parse_date(&date).with_context(|| format!("Unrecognized date format: {}", date))?;
    let record = PatternRecord::new(symbol.trim().to_uppercase(), date);

    let window = FetchWindow {
        lookback_days: config.data_source.lookback_days,
        lookahead_days: config.data_source.lookahead_days,
    };
    let (start, end) = window.around(date);
    info!("Fetching {} from {} to {}", record.symbol, start, end);

    let fetcher = super::build_fetcher(&config)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let bars = runtime.block_on(fetcher.fetch(&record.symbol, start, end))?;

    println!("\n{}", "=".repeat(72));
    println!("{} DAILY BARS {} to {}", record.symbol, start, end);
    println!("{}", "=".repeat(72));
    println!(
        "{:<3} {:<10} {:>10} {:>10} {:>10} {:>10} {:>14}",
        "", "DATE", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME"
    );
    for bar in &bars {
        let marker = if bar.date == date { ">>" } else { "" };
        println!(
            "{:<3} {:<10} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>14.0}",
            marker, bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
        );
    }
    println!("{}", "=".repeat(72));

    match evaluate(&record, &bars, &EvalPolicy::from(&config.analysis)) {
        Ok(outcome) => println!(
            "Entry {:.2}  Target {:.2}  Stop {:.2}  ->  {} ({:+.2}%)",
            outcome.entry,
            outcome.target,
            outcome.stop_loss,
            outcome.result,
            outcome.profit_loss_pct * 100.0
        ),
        Err(e) => println!("Not evaluable: {}", e),
    }

    Ok(())
}
