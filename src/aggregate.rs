//! Summary statistics over evaluated trades

use itertools::Itertools;
use statrs::statistics::Statistics;

use crate::{SummaryStats, TradeOutcome, TradeResult};

/// Mean of a slice, `None` when empty
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

/// (min, max) of a slice, `None` when empty
fn extremes(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        (None, None)
    } else {
        (
            Some(Statistics::min(values.iter())),
            Some(Statistics::max(values.iter())),
        )
    }
}

/// Values of `f` over outcomes with the given result (all when `None`)
fn collect<F>(outcomes: &[TradeOutcome], result: Option<TradeResult>, f: F) -> Vec<f64>
where
    F: Fn(&TradeOutcome) -> Option<f64>,
{
    outcomes
        .iter()
        .filter(|o| result.is_none_or(|r| o.result == r))
        .filter_map(f)
        .collect()
}

/// Compute summary statistics for a set of outcomes
///
/// An empty set yields `total == 0` with every rate and mean set to `None`.
pub fn aggregate(outcomes: &[TradeOutcome]) -> SummaryStats {
    let counts = outcomes.iter().counts_by(|o| o.result);
    let count = |r| counts.get(&r).copied().unwrap_or(0);

    let total = outcomes.len();
    let successes = count(TradeResult::Success);
    let failures = count(TradeResult::Failure);
    let incomplete = count(TradeResult::Incomplete);

    let success_rate = if total == 0 {
        None
    } else {
        Some(successes as f64 / total as f64)
    };

    let (first_date, last_date) = outcomes
        .iter()
        .map(|o| o.record.date)
        .minmax()
        .into_option()
        .map_or((None, None), |(a, b)| (Some(a), Some(b)));

    let success = Some(TradeResult::Success);
    let failure = Some(TradeResult::Failure);
    let timed_out = Some(TradeResult::Incomplete);

    let moves = collect(outcomes, None, |o| Some(o.pattern_move_pct));
    let ranges = collect(outcomes, None, |o| Some(o.pattern_range_pct));
    let (min_pattern_move, max_pattern_move) = extremes(&moves);
    let (min_pattern_range, max_pattern_range) = extremes(&ranges);

    SummaryStats {
        total,
        successes,
        failures,
        incomplete,
        success_rate,
        avg_profit_loss: mean(&collect(outcomes, None, |o| Some(o.profit_loss_pct))),
        avg_loss_on_failures: mean(&collect(outcomes, failure, |o| Some(o.profit_loss_pct))),
        win_loss_ratio: successes as f64 / failures.max(1) as f64,
        avg_days_to_target: mean(&collect(outcomes, success, |o| Some(o.days_held as f64))),
        avg_days_to_stop: mean(&collect(outcomes, failure, |o| Some(o.days_held as f64))),
        avg_stop_gap_on_failures: mean(&collect(outcomes, failure, |o| Some(o.stop_gap_pct))),
        avg_incomplete_return: mean(&collect(outcomes, timed_out, |o| Some(o.profit_loss_pct))),
        avg_incomplete_best_return: mean(&collect(outcomes, timed_out, |o| o.best_return_pct)),
        avg_incomplete_worst_return: mean(&collect(outcomes, timed_out, |o| o.worst_return_pct)),
        avg_pattern_move: mean(&moves),
        max_pattern_move,
        min_pattern_move,
        avg_pattern_range: mean(&ranges),
        max_pattern_range,
        min_pattern_range,
        first_date,
        last_date,
    }
}
