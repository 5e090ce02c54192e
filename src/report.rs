//! Report writers
//!
//! The text report is the primary output; the CSV writer emits one row per
//! trade for spreadsheets and further analysis.

use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AnalysisError, AnalysisResult};
use crate::pipeline::AnalysisRun;
use crate::{SummaryStats, TradeOutcome};

pub trait ReportWriter {
    fn write(&self, run: &AnalysisRun) -> AnalysisResult<()>;
}

fn write_error(path: &Path, source: std::io::Error) -> AnalysisError {
    AnalysisError::ReportWrite {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(path: &Path) -> AnalysisResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| write_error(path, e))
        }
        _ => Ok(()),
    }
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:+.2}%", v * 100.0))
}

fn rate(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn days(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}", v))
}

/// Summary block shared by the text report and the console
pub fn format_summary(stats: &SummaryStats) -> String {
    let mut out = String::new();
    let date_range = match (stats.first_date, stats.last_date) {
        (Some(first), Some(last)) => format!("{} to {}", first, last),
        _ => "n/a".to_string(),
    };

    let _ = writeln!(out, "Total Trades:         {}", stats.total);
    let _ = writeln!(out, "Successful:           {}", stats.successes);
    let _ = writeln!(out, "Failed:               {}", stats.failures);
    let _ = writeln!(out, "Incomplete:           {}", stats.incomplete);
    let _ = writeln!(out, "Success Rate:         {}", rate(stats.success_rate));
    let _ = writeln!(out, "Failure Rate:         {}", rate(stats.failure_rate()));
    let _ = writeln!(out, "Incomplete Rate:      {}", rate(stats.incomplete_rate()));
    let _ = writeln!(out, "Avg Profit/Loss:      {}", pct(stats.avg_profit_loss));
    let _ = writeln!(out, "Avg Loss (failures):  {}", pct(stats.avg_loss_on_failures));
    let _ = writeln!(out, "Win/Loss Ratio:       {:.2}", stats.win_loss_ratio);
    let _ = writeln!(out, "Avg Days to Target:   {}", days(stats.avg_days_to_target));
    let _ = writeln!(out, "Avg Days to Stop:     {}", days(stats.avg_days_to_stop));
    let _ = writeln!(out, "Avg Stop Loss Gap:    {}", rate(stats.avg_stop_gap_on_failures));
    let _ = writeln!(out, "Avg Incomplete P/L:   {}", pct(stats.avg_incomplete_return));
    let _ = writeln!(out, "Avg Best (open):      {}", pct(stats.avg_incomplete_best_return));
    let _ = writeln!(out, "Avg Worst (open):     {}", pct(stats.avg_incomplete_worst_return));
    let _ = writeln!(out);
    let _ = writeln!(out, "Pattern Day");
    let _ = writeln!(out, "Avg Open to Close:    {}", pct(stats.avg_pattern_move));
    let _ = writeln!(out, "Max Open to Close:    {}", pct(stats.max_pattern_move));
    let _ = writeln!(out, "Min Open to Close:    {}", pct(stats.min_pattern_move));
    let _ = writeln!(out, "Avg Day Range:        {}", rate(stats.avg_pattern_range));
    let _ = writeln!(out, "Max Day Range:        {}", rate(stats.max_pattern_range));
    let _ = writeln!(out, "Min Day Range:        {}", rate(stats.min_pattern_range));
    let _ = writeln!(out);
    let _ = writeln!(out, "Date Range:           {}", date_range);

    if stats.is_empty() {
        let _ = writeln!(out, "No trades were evaluated; rates and averages are undefined.");
    }
    out
}

fn format_trade(outcome: &TradeOutcome) -> String {
    let exit_date = outcome
        .exit_date
        .map_or_else(|| "-".to_string(), |d| d.to_string());

    format!(
        "{:<14} {:<10} {:>10.2} {:>10.2} {:>10.2} {:<10} {:<10} {:>4} {:>8}",
        outcome.record.symbol,
        outcome.record.date,
        outcome.entry,
        outcome.target,
        outcome.stop_loss,
        outcome.result,
        exit_date,
        outcome.days_held,
        pct(Some(outcome.profit_loss_pct)),
    )
}

/// Render the complete plain-text report
pub fn render_text(run: &AnalysisRun) -> String {
    let mut out = String::new();
    let rule = "=".repeat(100);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "OHL PATTERN BACKTEST");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{:<14} {:<10} {:>10} {:>10} {:>10} {:<10} {:<10} {:>4} {:>8}",
        "SYMBOL", "DATE", "ENTRY", "TARGET", "STOP", "RESULT", "EXIT", "DAYS", "P/L"
    );
    let _ = writeln!(out, "{}", "-".repeat(100));
    for outcome in &run.outcomes {
        let _ = writeln!(out, "{}", format_trade(outcome));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Rows Read:            {}", run.rows_read);
    let _ = writeln!(out, "Evaluated:            {}", run.outcomes.len());
    let _ = writeln!(out, "Skipped:              {}", run.skipped.len());
    out.push_str(&format_summary(&run.stats));

    if !run.skipped.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "SKIPPED RECORDS");
        let _ = writeln!(out, "{}", "-".repeat(100));
        for (kind, count) in run.skipped_by_kind() {
            let _ = writeln!(out, "  {:<24} {}", kind, count);
        }
        for skipped in &run.skipped {
            match &skipped.record {
                Some(record) => {
                    let _ = writeln!(out, "  line {:>5}  {}: {}", record.line, record, skipped.error);
                }
                None => {
                    let _ = writeln!(out, "  {}", skipped.error);
                }
            }
        }
    }
    out
}

pub struct TextReportWriter {
    path: PathBuf,
}

impl TextReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportWriter for TextReportWriter {
    fn write(&self, run: &AnalysisRun) -> AnalysisResult<()> {
        ensure_parent(&self.path)?;
        fs::write(&self.path, render_text(run)).map_err(|e| write_error(&self.path, e))?;
        info!("Report written to {}", self.path.display());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    symbol: &'a str,
    date: chrono::NaiveDate,
    original_date: Option<chrono::NaiveDate>,
    line: usize,
    entry: f64,
    target: f64,
    stop_loss: f64,
    result: String,
    exit_date: Option<chrono::NaiveDate>,
    exit_price: f64,
    profit_loss_pct: f64,
    days_held: usize,
    stop_gap_pct: f64,
    pattern_range_pct: f64,
    pattern_move_pct: f64,
    best_return_pct: Option<f64>,
    worst_return_pct: Option<f64>,
}

impl<'a> From<&'a TradeOutcome> for TradeRow<'a> {
    fn from(o: &'a TradeOutcome) -> Self {
        Self {
            symbol: &o.record.symbol,
            date: o.record.date,
            original_date: o.record.original_date,
            line: o.record.line,
            entry: o.entry,
            target: o.target,
            stop_loss: o.stop_loss,
            result: o.result.to_string(),
            exit_date: o.exit_date,
            exit_price: o.exit_price,
            profit_loss_pct: o.profit_loss_pct,
            days_held: o.days_held,
            stop_gap_pct: o.stop_gap_pct,
            pattern_range_pct: o.pattern_range_pct,
            pattern_move_pct: o.pattern_move_pct,
            best_return_pct: o.best_return_pct,
            worst_return_pct: o.worst_return_pct,
        }
    }
}

pub struct CsvReportWriter {
    path: PathBuf,
}

impl CsvReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_rows(&self, outcomes: &[TradeOutcome]) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        for outcome in outcomes {
            writer.serialize(TradeRow::from(outcome))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportWriter for CsvReportWriter {
    fn write(&self, run: &AnalysisRun) -> AnalysisResult<()> {
        ensure_parent(&self.path)?;
        self.write_rows(&run.outcomes)
            .map_err(|e| write_error(&self.path, e.into()))?;
        info!(
            "CSV with {} trades written to {}",
            run.outcomes.len(),
            self.path.display()
        );
        Ok(())
    }
}
