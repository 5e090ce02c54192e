//! Analyze command implementation

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use ohl_backtest::report::{format_summary, CsvReportWriter, ReportWriter, TextReportWriter};
use ohl_backtest::{data, AnalysisRun, Analyzer, AnalyzerOptions, Config};

pub fn run(
    mut config: Config,
    input: PathBuf,
    output: PathBuf,
    csv_output: Option<PathBuf>,
    concurrency_override: Option<usize>,
    holding_days_override: Option<usize>,
) -> Result<()> {
    info!("Starting analysis");

    if let Some(concurrency) = concurrency_override {
        info!("Overriding concurrency to: {}", concurrency);
        config.pipeline.concurrency = concurrency;
    }

    if let Some(days) = holding_days_override {
        info!("Overriding holding days to: {}", days);
        config.analysis.holding_days = days;
    }

    info!("Loading patterns from: {}", input.display());
    let loaded = data::load_patterns(&input, config.analysis.adjust_weekends)?;
    info!(
        "Loaded {} records ({} rows rejected)",
        loaded.records.len(),
        loaded.rejected.len()
    );

    let fetcher = super::build_fetcher(&config)?;
    let options = AnalyzerOptions::from(&config);
    debug!("Analyzer options: {:?}", options);
    let analyzer = Analyzer::new(fetcher, options);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let run = runtime.block_on(analyzer.run(loaded.records, loaded.rejected));

    TextReportWriter::new(&output).write(&run)?;
    if let Some(path) = &csv_output {
        CsvReportWriter::new(path).write(&run)?;
    }

    print_summary(&run);
    println!("Report: {}", output.display());
    if let Some(path) = &csv_output {
        println!("CSV:    {}", path.display());
    }

    info!("Analysis complete");
    Ok(())
}

fn print_summary(run: &AnalysisRun) {
    let summary = format_summary(&run.stats);
    // Mirror the summary into the debug log
    for line in summary.lines() {
        info!("{}", line);
    }

    println!("\n{}", "=".repeat(60));
    println!("OHL BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Rows Read:            {}", run.rows_read);
    println!("Evaluated:            {}", run.outcomes.len());
    println!("Skipped:              {}", run.skipped.len());
    for (kind, count) in run.skipped_by_kind() {
        println!("  {:<20} {}", kind, count);
    }
    println!("{}", "-".repeat(60));
    print!("{}", summary);
    println!("{}", "=".repeat(60));
}
