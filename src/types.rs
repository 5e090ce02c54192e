//! Core data types used across the backtester

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for daily bar data
#[derive(Debug, Error, PartialEq)]
pub enum BarValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// One trading day of OHLC data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Create a new bar with validation
    pub fn new(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarValidationError> {
        let bar = Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Create a bar without validation (test fixtures, trusted sources)
    pub fn new_unchecked(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), BarValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(BarValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(BarValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    /// (high - low) / open
    pub fn range_pct(&self) -> f64 {
        (self.high - self.low) / self.open
    }

    /// (close - open) / open
    pub fn move_pct(&self) -> f64 {
        (self.close - self.open) / self.open
    }
}

/// A single pattern occurrence read from the input CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub symbol: String,
    pub date: NaiveDate,
    /// Date as written in the CSV, when it was rolled forward off a weekend
    pub original_date: Option<NaiveDate>,
    /// 1-based line number in the input file (header is line 1)
    pub line: usize,
}

impl PatternRecord {
    pub fn new(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            original_date: None,
            line: 0,
        }
    }
}

impl std::fmt::Display for PatternRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.symbol, self.date)
    }
}

/// Classification of a simulated trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeResult {
    Success,
    Failure,
    Incomplete,
}

impl std::fmt::Display for TradeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeResult::Success => write!(f, "SUCCESS"),
            TradeResult::Failure => write!(f, "FAILURE"),
            TradeResult::Incomplete => write!(f, "INCOMPLETE"),
        }
    }
}

/// Which price a triggered exit is filled at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitFill {
    /// The triggering bar's extreme: high on target, low on stop
    #[default]
    BarExtreme,
    /// The target or stop-loss price itself
    Threshold,
}

impl std::str::FromStr for ExitFill {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bar_extreme" | "extreme" => Ok(ExitFill::BarExtreme),
            "threshold" => Ok(ExitFill::Threshold),
            _ => Err(format!(
                "Unknown exit fill: {}. Use 'bar_extreme' or 'threshold'",
                s
            )),
        }
    }
}

/// Evaluated result for one pattern record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub record: PatternRecord,
    pub entry: f64,
    pub target: f64,
    pub stop_loss: f64,
    pub result: TradeResult,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: f64,
    /// Fraction of entry, e.g. -0.11 for an 11% loss
    pub profit_loss_pct: f64,
    /// Forward trading days until exit (window length when incomplete)
    pub days_held: usize,
    /// (entry - stop_loss) / entry
    pub stop_gap_pct: f64,
    pub pattern_range_pct: f64,
    pub pattern_move_pct: f64,
    /// Best high across the scanned window, relative to entry
    pub best_return_pct: Option<f64>,
    /// Worst low across the scanned window, relative to entry
    pub worst_return_pct: Option<f64>,
}

impl TradeOutcome {
    pub fn is_success(&self) -> bool {
        self.result == TradeResult::Success
    }

    pub fn is_failure(&self) -> bool {
        self.result == TradeResult::Failure
    }

    pub fn is_incomplete(&self) -> bool {
        self.result == TradeResult::Incomplete
    }
}

/// Summary statistics over a set of trade outcomes
///
/// Means over empty subsets are `None` rather than NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub incomplete: usize,
    pub success_rate: Option<f64>,
    pub avg_profit_loss: Option<f64>,
    pub avg_loss_on_failures: Option<f64>,
    pub win_loss_ratio: f64,
    pub avg_days_to_target: Option<f64>,
    pub avg_days_to_stop: Option<f64>,
    /// Mean (entry - stop) / entry over stopped trades
    pub avg_stop_gap_on_failures: Option<f64>,
    pub avg_incomplete_return: Option<f64>,
    /// Mean best high reached by trades that ran out the window
    pub avg_incomplete_best_return: Option<f64>,
    /// Mean worst low reached by trades that ran out the window
    pub avg_incomplete_worst_return: Option<f64>,
    /// Pattern-day open to close
    pub avg_pattern_move: Option<f64>,
    pub max_pattern_move: Option<f64>,
    pub min_pattern_move: Option<f64>,
    /// Pattern-day high to low, relative to open
    pub avg_pattern_range: Option<f64>,
    pub max_pattern_range: Option<f64>,
    pub min_pattern_range: Option<f64>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl SummaryStats {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn failure_rate(&self) -> Option<f64> {
        self.ratio(self.failures)
    }

    pub fn incomplete_rate(&self) -> Option<f64> {
        self.ratio(self.incomplete)
    }

    fn ratio(&self, count: usize) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(count as f64 / self.total as f64)
        }
    }
}
