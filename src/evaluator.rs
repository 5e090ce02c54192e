//! Open-High-Low pattern trade evaluation
//!
//! Entry is the pattern day's high, the stop is the previous day's low and
//! the target sits a fixed fraction above entry. Forward bars are scanned in
//! order; a bar that touches both levels counts as a stop-out since the
//! intraday sequence of a daily bar is unknown.

use tracing::{debug, trace};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::{ExitFill, PatternRecord, PriceBar, TradeOutcome, TradeResult};

/// Rule parameters for one evaluation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalPolicy {
    pub target_pct: f64,
    pub holding_days: usize,
    pub exit_fill: ExitFill,
}

impl Default for EvalPolicy {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for EvalPolicy {
    fn from(cfg: &AnalysisConfig) -> Self {
        Self {
            target_pct: cfg.target_pct,
            holding_days: cfg.holding_days,
            exit_fill: cfg.exit_fill,
        }
    }
}

/// Entry, target and stop for a pattern day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeLevels {
    pub entry: f64,
    pub target: f64,
    pub stop_loss: f64,
}

impl TradeLevels {
    pub fn new(pattern_day: &PriceBar, previous_day: &PriceBar, target_pct: f64) -> Self {
        let entry = pattern_day.high;
        Self {
            entry,
            target: entry * (1.0 + target_pct),
            stop_loss: previous_day.low,
        }
    }

    pub fn stop_hit(&self, bar: &PriceBar) -> bool {
        bar.low <= self.stop_loss
    }

    pub fn target_hit(&self, bar: &PriceBar) -> bool {
        bar.high >= self.target
    }

    pub fn return_at(&self, price: f64) -> f64 {
        (price - self.entry) / self.entry
    }
}

/// Evaluate one pattern record against its bar series
///
/// `bars` must be in ascending date order and contain the pattern day and
/// at least one bar before it.
pub fn evaluate(
    record: &PatternRecord,
    bars: &[PriceBar],
    policy: &EvalPolicy,
) -> AnalysisResult<TradeOutcome> {
    let idx = bars
        .iter()
        .position(|b| b.date == record.date)
        .ok_or_else(|| AnalysisError::PatternDayNotFound {
            symbol: record.symbol.clone(),
            date: record.date,
            bars: bars.len(),
        })?;

    if idx == 0 {
        return Err(AnalysisError::NoPreviousDay {
            symbol: record.symbol.clone(),
            date: record.date,
        });
    }

    let pattern_day = &bars[idx];
    let previous_day = &bars[idx - 1];
    let levels = TradeLevels::new(pattern_day, previous_day, policy.target_pct);

    debug!(
        "{}: entry={:.2} target={:.2} stop={:.2} (prev day {})",
        record, levels.entry, levels.target, levels.stop_loss, previous_day.date
    );

    let forward_end = (idx + 1 + policy.holding_days).min(bars.len());
    let window = &bars[idx + 1..forward_end];

    let mut result = TradeResult::Incomplete;
    let mut exit_date = None;
    let mut exit_price = window.last().map_or(levels.entry, |b| b.close);
    let mut days_held = window.len();

    for (offset, bar) in window.iter().enumerate() {
        let stop = levels.stop_hit(bar);
        let target = levels.target_hit(bar);
        trace!(
            "{} day {} {}: high={:.2} low={:.2} stop={} target={}",
            record.symbol,
            offset + 1,
            bar.date,
            bar.high,
            bar.low,
            stop,
            target
        );

        if stop {
            result = TradeResult::Failure;
            exit_price = match policy.exit_fill {
                ExitFill::BarExtreme => bar.low,
                ExitFill::Threshold => levels.stop_loss,
            };
        } else if target {
            result = TradeResult::Success;
            exit_price = match policy.exit_fill {
                ExitFill::BarExtreme => bar.high,
                ExitFill::Threshold => levels.target,
            };
        } else {
            continue;
        }

        exit_date = Some(bar.date);
        days_held = offset + 1;
        break;
    }

    let scanned = &window[..days_held];
    let best_return_pct = scanned
        .iter()
        .map(|b| b.high)
        .reduce(f64::max)
        .map(|p| levels.return_at(p));
    let worst_return_pct = scanned
        .iter()
        .map(|b| b.low)
        .reduce(f64::min)
        .map(|p| levels.return_at(p));

    let outcome = TradeOutcome {
        record: record.clone(),
        entry: levels.entry,
        target: levels.target,
        stop_loss: levels.stop_loss,
        result,
        exit_date,
        exit_price,
        profit_loss_pct: levels.return_at(exit_price),
        days_held,
        stop_gap_pct: (levels.entry - levels.stop_loss) / levels.entry,
        pattern_range_pct: pattern_day.range_pct(),
        pattern_move_pct: pattern_day.move_pct(),
        best_return_pct,
        worst_return_pct,
    };

    debug!(
        "{}: {} after {} day(s), P/L {:+.2}%",
        record,
        outcome.result,
        outcome.days_held,
        outcome.profit_loss_pct * 100.0
    );

    Ok(outcome)
}
