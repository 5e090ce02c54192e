//! Pattern list loading
//!
//! Reads the `symbol,date` CSV produced by the scanner, validating every row
//! up front. Bad rows become [`AnalysisError::InvalidRow`] and are returned
//! alongside the good ones so the caller can log and count them.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::AnalysisError;
use crate::PatternRecord;

/// Date-only formats accepted in the input file
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Date-time formats accepted in the input file (time is discarded)
const DATETIME_FORMATS: &[&str] = &["%d-%m-%Y %I:%M %p", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Result of loading a pattern file
#[derive(Debug, Default)]
pub struct PatternLoad {
    pub records: Vec<PatternRecord>,
    pub rejected: Vec<AnalysisError>,
}

/// Load pattern records from a CSV file
pub fn load_patterns(path: impl AsRef<Path>, adjust_weekends: bool) -> Result<PatternLoad> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open pattern file {}", path.display()))?;

    info!("Loading patterns from {}", path.display());
    let load = read_patterns(file, adjust_weekends)
        .with_context(|| format!("Failed to read pattern file {}", path.display()))?;

    info!(
        "Loaded {} records ({} rejected)",
        load.records.len(),
        load.rejected.len()
    );
    Ok(load)
}

/// Load pattern records from any reader
///
/// The header must contain `symbol` and `date` columns (case-insensitive, any
/// order). A missing column is a setup error; everything after the header is
/// validated row by row.
pub fn read_patterns<R: Read>(reader: R, adjust_weekends: bool) -> Result<PatternLoad> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().context("Missing header row")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .with_context(|| format!("Header is missing a '{}' column", name))
    };
    let symbol_idx = column("symbol")?;
    let date_idx = column("date")?;

    let mut load = PatternLoad::default();

    let mut fallback_line = 1;
    for result in reader.records() {
        // Physical line where the row starts
        let position = match &result {
            Ok(row) => row.position(),
            Err(e) => e.position(),
        };
        let line = position.map_or(fallback_line + 1, |p| p.line() as usize);
        fallback_line = line;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping line {}: {}", line, e);
                load.rejected.push(AnalysisError::InvalidRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match parse_row(row.get(symbol_idx), row.get(date_idx), line, adjust_weekends) {
            Ok(record) => load.records.push(record),
            Err(e) => {
                warn!("Skipping {}", e);
                load.rejected.push(e);
            }
        }
    }

    Ok(load)
}

fn parse_row(
    symbol: Option<&str>,
    date: Option<&str>,
    line: usize,
    adjust_weekends: bool,
) -> Result<PatternRecord, AnalysisError> {
    let invalid = |reason: String| AnalysisError::InvalidRow { line, reason };

    let symbol = symbol
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("missing symbol".to_string()))?;
    let date_str = date
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("missing date".to_string()))?;
    let parsed =
        parse_date(date_str).ok_or_else(|| invalid(format!("unparseable date '{}'", date_str)))?;

    let mut record = PatternRecord {
        symbol: symbol.to_uppercase(),
        date: parsed,
        original_date: None,
        line,
    };

    if adjust_weekends && !is_weekday(parsed) {
        let adjusted = next_weekday(parsed);
        debug!(
            "Adjusted {} to {} for {} (weekend adjustment)",
            parsed, adjusted, record.symbol
        );
        record.date = adjusted;
        record.original_date = Some(parsed);
    }

    Ok(record)
}

/// Parse a pattern date in any of the accepted formats
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let date_str = date_str.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_str, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(date_str, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First weekday strictly after `date`
pub fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while !is_weekday(next) {
        next += Duration::days(1);
    }
    next
}
