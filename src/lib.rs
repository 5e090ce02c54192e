//! OHL Pattern Backtest
//!
//! Replays "open equals low" pattern occurrences from a scanner export
//! against daily bars: entry at the pattern day's high, a fixed-percentage
//! target, and a stop at the previous day's low, with the stop taking
//! precedence when both are touched on the same bar.

pub mod aggregate;
pub mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod fetcher;
pub mod pipeline;
pub mod report;
pub mod types;
pub mod yahoo;

pub use config::Config;
pub use error::{AnalysisError, AnalysisResult, ErrorKind};
pub use fetcher::BarFetcher;
pub use pipeline::{AnalysisRun, Analyzer, AnalyzerOptions};
pub use types::*;
