//! Error taxonomy for the analysis pipeline
//!
//! Per-record errors are recovered by the pipeline and counted; the rest
//! abort the run.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("invalid date range for {symbol}: {start} > {end}")]
    InvalidRange {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("pattern day {date} not found in {bars} bars for {symbol}")]
    PatternDayNotFound {
        symbol: String,
        date: NaiveDate,
        bars: usize,
    },

    #[error("no bar before pattern day {date} for {symbol}")]
    NoPreviousDay { symbol: String, date: NaiveDate },

    #[error("failed to write report {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Short label used when tallying skipped records
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidRow { .. } => ErrorKind::InvalidRow,
            AnalysisError::InvalidRange { .. } | AnalysisError::DataUnavailable { .. } => {
                ErrorKind::DataUnavailable
            }
            AnalysisError::NoData { .. } => ErrorKind::NoData,
            AnalysisError::PatternDayNotFound { .. } => ErrorKind::PatternDayNotFound,
            AnalysisError::NoPreviousDay { .. } => ErrorKind::NoPreviousDay,
            AnalysisError::ReportWrite { .. } | AnalysisError::Csv(_) | AnalysisError::Io(_) => {
                ErrorKind::Fatal
            }
        }
    }

    /// Whether the pipeline skips the record and keeps going
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Fatal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    InvalidRow,
    DataUnavailable,
    NoData,
    PatternDayNotFound,
    NoPreviousDay,
    Fatal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::InvalidRow => "invalid row",
            ErrorKind::DataUnavailable => "data unavailable",
            ErrorKind::NoData => "no data",
            ErrorKind::PatternDayNotFound => "pattern day not found",
            ErrorKind::NoPreviousDay => "no previous day",
            ErrorKind::Fatal => "fatal",
        };
        write!(f, "{}", label)
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
