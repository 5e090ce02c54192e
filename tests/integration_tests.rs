//! Integration tests for the OHL backtest pipeline
//!
//! These run the loader, analyzer and report writers together against an
//! in-memory bar source.

use approx::assert_relative_eq;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ohl_backtest::data::{load_patterns, read_patterns};
use ohl_backtest::fetcher::CachedFetcher;
use ohl_backtest::report::{CsvReportWriter, ReportWriter, TextReportWriter};
use ohl_backtest::{
    AnalysisError, AnalysisResult, AnalysisRun, Analyzer, AnalyzerOptions, BarFetcher, ErrorKind,
    PriceBar, TradeResult,
};

// =============================================================================
// Test Utilities
// =============================================================================

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

/// Bar with open at the low and close mid-range
fn bar(day: u32, high: f64, low: f64) -> PriceBar {
    PriceBar::new(d(day), low, high, low, (high + low) / 2.0, 10_000.0).unwrap()
}

/// Previous day (low 90) followed by the pattern day {high 100, low 95}
fn setup(forward: Vec<PriceBar>) -> Vec<PriceBar> {
    let mut bars = vec![bar(4, 96.0, 90.0), bar(5, 100.0, 95.0)];
    bars.extend(forward);
    bars
}

/// Serves canned bars per symbol; unknown symbols are a source outage
#[derive(Default)]
struct MockFetcher {
    bars: HashMap<String, Vec<PriceBar>>,
    calls: AtomicUsize,
    latency: Option<std::time::Duration>,
}

impl MockFetcher {
    fn with(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }
}

#[async_trait]
impl BarFetcher for MockFetcher {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalysisResult<Vec<PriceBar>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(start <= end);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.bars.get(symbol) {
            Some(bars) if bars.is_empty() => Err(AnalysisError::NoData {
                symbol: symbol.to_string(),
            }),
            Some(bars) => Ok(bars
                .iter()
                .filter(|b| b.date >= start && b.date <= end)
                .cloned()
                .collect()),
            None => Err(AnalysisError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "connection refused".into(),
            }),
        }
    }
}

fn scenario_fetcher() -> MockFetcher {
    MockFetcher::default()
        .with(
            "FAIL",
            setup(vec![bar(6, 100.1, 96.0), bar(7, 99.0, 89.0)]),
        )
        .with("WIN", setup(vec![bar(6, 100.3, 98.0)]))
        .with("LAST", setup(vec![]))
        .with("DELISTED", vec![])
        .with(
            "WEEKEND",
            vec![bar(8, 50.0, 45.0), bar(11, 52.0, 48.0), bar(12, 53.0, 49.0)],
        )
}

fn options() -> AnalyzerOptions {
    AnalyzerOptions {
        show_progress: false,
        ..AnalyzerOptions::default()
    }
}

const INPUT: &str = "\
symbol,date,scanner
FAIL,2024-03-05,ohl
win,05-03-2024 09:15 AM,ohl
LAST,05/03/2024,ohl
DELISTED,2024-03-05,ohl
,2024-03-05,ohl
SBIN,not-a-date,ohl
WEEKEND,2024-03-09,ohl
OFFLINE,2024-03-05,ohl
";

async fn run_input(fetcher: Arc<dyn BarFetcher>) -> AnalysisRun {
    let loaded = read_patterns(INPUT.as_bytes(), true).unwrap();
    Analyzer::new(fetcher, options())
        .run(loaded.records, loaded.rejected)
        .await
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn test_end_to_end_outcomes() {
    let run = run_input(Arc::new(scenario_fetcher())).await;

    assert_eq!(run.rows_read, 8);
    let by_symbol: HashMap<&str, _> = run
        .outcomes
        .iter()
        .map(|o| (o.record.symbol.as_str(), o))
        .collect();

    let fail = by_symbol["FAIL"];
    assert_eq!(fail.entry, 100.0);
    assert_eq!(fail.stop_loss, 90.0);
    assert_relative_eq!(fail.target, 100.2, max_relative = 1e-9);
    assert_eq!(fail.result, TradeResult::Failure);
    assert_eq!(fail.exit_date, Some(d(7)));
    assert_eq!(fail.days_held, 2);
    assert_relative_eq!(fail.profit_loss_pct, -0.11, epsilon = 1e-12);

    let win = by_symbol["WIN"];
    assert_eq!(win.result, TradeResult::Success);
    assert_eq!(win.exit_date, Some(d(6)));
    assert_relative_eq!(win.profit_loss_pct, 0.003, epsilon = 1e-12);

    let last = by_symbol["LAST"];
    assert_eq!(last.result, TradeResult::Incomplete);
    assert_eq!(last.exit_date, None);

    // Saturday rolled forward to Monday the 11th, stop at Friday's low
    let weekend = by_symbol["WEEKEND"];
    assert_eq!(weekend.record.date, d(11));
    assert_eq!(weekend.record.original_date, Some(d(9)));
    assert_eq!(weekend.entry, 52.0);
    assert_eq!(weekend.stop_loss, 45.0);
    assert_eq!(weekend.result, TradeResult::Success);
}

#[tokio::test]
async fn test_skipped_records_are_tallied() {
    let run = run_input(Arc::new(scenario_fetcher())).await;

    assert_eq!(run.outcomes.len(), 4);
    assert_eq!(run.skipped.len(), 4);
    assert_eq!(run.outcomes.len() + run.skipped.len(), run.rows_read);

    let kinds = run.skipped_by_kind();
    assert_eq!(kinds[&ErrorKind::InvalidRow], 2);
    assert_eq!(kinds[&ErrorKind::NoData], 1);
    assert_eq!(kinds[&ErrorKind::DataUnavailable], 1);

    let lines: Vec<usize> = run
        .skipped
        .iter()
        .filter_map(|s| match &s.error {
            AnalysisError::InvalidRow { line, .. } => Some(*line),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec![6, 7]);
}

#[tokio::test]
async fn test_summary_partition() {
    let run = run_input(Arc::new(scenario_fetcher())).await;
    let stats = &run.stats;

    assert_eq!(stats.total, 4);
    assert_eq!(stats.successes, 2);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.incomplete, 1);
    let rest = (stats.failures + stats.incomplete) as f64 / stats.total as f64;
    assert_relative_eq!(stats.success_rate.unwrap() + rest, 1.0, epsilon = 1e-12);
    assert_relative_eq!(stats.win_loss_ratio, 2.0);
    assert_relative_eq!(stats.avg_loss_on_failures.unwrap(), -0.11, epsilon = 1e-12);
}

#[tokio::test]
async fn test_sequential_matches_concurrent() {
    let loaded = read_patterns(INPUT.as_bytes(), true).unwrap();
    let sequential = Analyzer::new(
        Arc::new(scenario_fetcher()),
        AnalyzerOptions {
            concurrency: 1,
            ..options()
        },
    )
    .run(loaded.records.clone(), vec![])
    .await;
    let concurrent = Analyzer::new(
        Arc::new(scenario_fetcher()),
        AnalyzerOptions {
            concurrency: 8,
            ..options()
        },
    )
    .run(loaded.records, vec![])
    .await;

    assert_eq!(sequential.outcomes, concurrent.outcomes);
    assert_eq!(sequential.stats, concurrent.stats);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_rows_hit_source_once() {
    let mock = Arc::new(MockFetcher {
        latency: Some(std::time::Duration::from_millis(50)),
        ..MockFetcher::default().with("WIN", setup(vec![bar(6, 100.3, 98.0)]))
    });
    let cached = Arc::new(CachedFetcher::new(mock.clone()));
    let loaded = read_patterns(
        "symbol,date\nWIN,2024-03-05\nWIN,2024-03-05\nwin,2024-03-05\n".as_bytes(),
        true,
    )
    .unwrap();

    // Default concurrency keeps all three fetches in flight together
    let run = Analyzer::new(cached, options())
        .run(loaded.records, loaded.rejected)
        .await;

    assert_eq!(run.outcomes.len(), 3);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_holding_window_limits_scan() {
    let forward: Vec<PriceBar> = (6..=12).map(|day| bar(day, 99.0, 96.0)).collect();
    let mut bars = setup(forward);
    // Day 8 of the forward window would reach the target
    bars.push(bar(13, 101.0, 97.0));
    let fetcher = Arc::new(MockFetcher::default().with("SLOW", bars));

    let loaded = read_patterns("symbol,date\nSLOW,2024-03-05\n".as_bytes(), true).unwrap();
    let run = Analyzer::new(fetcher, options())
        .run(loaded.records, vec![])
        .await;

    assert_eq!(run.outcomes[0].result, TradeResult::Incomplete);
    assert_eq!(run.outcomes[0].days_held, 6);
}

// =============================================================================
// Files
// =============================================================================

#[tokio::test]
async fn test_reports_written_from_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("patterns.csv");
    let mut file = fs::File::create(&input).unwrap();
    file.write_all(INPUT.as_bytes()).unwrap();
    drop(file);

    let loaded = load_patterns(&input, true).unwrap();
    let run = Analyzer::new(Arc::new(scenario_fetcher()), options())
        .run(loaded.records, loaded.rejected)
        .await;

    let report = dir.path().join("report.txt");
    let csv_path = dir.path().join("trades.csv");
    TextReportWriter::new(&report).write(&run).unwrap();
    CsvReportWriter::new(&csv_path).write(&run).unwrap();

    let text = fs::read_to_string(&report).unwrap();
    for needle in ["FAIL", "WIN", "LAST", "WEEKEND", "-11.00%", "+0.30%", "SKIPPED"] {
        assert!(text.contains(needle), "report missing {}", needle);
    }

    let rows = csv::Reader::from_path(&csv_path)
        .unwrap()
        .records()
        .count();
    assert_eq!(rows, run.outcomes.len());
}

#[test]
fn test_missing_input_is_setup_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_patterns(dir.path().join("absent.csv"), true).is_err());
}

#[test]
fn test_missing_date_column_is_setup_error() {
    assert!(read_patterns("symbol,when\nSBIN,2024-03-05\n".as_bytes(), true).is_err());
}
