//! Analysis pipeline
//!
//! Fetches bars for every record with bounded concurrency, then evaluates
//! and aggregates on a single task in input order. Per-record failures are
//! logged and tallied; they never abort the run.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::config::Config;
use crate::error::{AnalysisError, AnalysisResult, ErrorKind};
use crate::evaluator::{evaluate, EvalPolicy};
use crate::fetcher::{BarFetcher, FetchWindow};
use crate::{PatternRecord, PriceBar, SummaryStats, TradeOutcome};

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    pub window: FetchWindow,
    pub policy: EvalPolicy,
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub show_progress: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AnalyzerOptions {
    fn from(config: &Config) -> Self {
        Self {
            window: FetchWindow {
                lookback_days: config.data_source.lookback_days,
                lookahead_days: config.data_source.lookahead_days,
            },
            policy: EvalPolicy::from(&config.analysis),
            concurrency: config.pipeline.concurrency,
            fetch_timeout: config.pipeline.fetch_timeout(),
            show_progress: config.pipeline.show_progress,
        }
    }
}

/// A record (or input row) that produced no outcome
#[derive(Debug)]
pub struct SkippedRecord {
    /// `None` for rows rejected before a record could be built
    pub record: Option<PatternRecord>,
    pub error: AnalysisError,
}

impl SkippedRecord {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Everything a run produced
#[derive(Debug, Default)]
pub struct AnalysisRun {
    /// Input rows, valid or not
    pub rows_read: usize,
    pub outcomes: Vec<TradeOutcome>,
    pub skipped: Vec<SkippedRecord>,
    pub stats: SummaryStats,
}

impl AnalysisRun {
    pub fn skipped_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        self.skipped.iter().fold(BTreeMap::new(), |mut acc, s| {
            *acc.entry(s.kind()).or_insert(0) += 1;
            acc
        })
    }
}

pub struct Analyzer {
    fetcher: Arc<dyn BarFetcher>,
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(fetcher: Arc<dyn BarFetcher>, options: AnalyzerOptions) -> Self {
        Self { fetcher, options }
    }

    /// Run the full pipeline
    ///
    /// `rejected` carries rows that failed validation at load time so they
    /// show up in the tally alongside fetch and evaluation failures.
    pub async fn run(
        &self,
        records: Vec<PatternRecord>,
        rejected: Vec<AnalysisError>,
    ) -> AnalysisRun {
        let rows_read = records.len() + rejected.len();
        let mut skipped: Vec<SkippedRecord> = rejected
            .into_iter()
            .map(|error| SkippedRecord {
                record: None,
                error,
            })
            .collect();

        info!(
            "Analyzing {} records (concurrency {}, {} day window)",
            records.len(),
            self.options.concurrency.max(1),
            self.options.policy.holding_days
        );

        let fetched = self.fetch_all(&records).await;
        let mut outcomes = Vec::with_capacity(records.len());

        for (record, bars) in records.into_iter().zip(fetched) {
            match bars.and_then(|bars| evaluate(&record, &bars, &self.options.policy)) {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    warn!("Skipping {} (line {}): {}", record, record.line, error);
                    skipped.push(SkippedRecord {
                        record: Some(record),
                        error,
                    });
                }
            }
        }

        let stats = aggregate(&outcomes);
        info!(
            "Evaluated {} trades, skipped {}",
            outcomes.len(),
            skipped.len()
        );

        AnalysisRun {
            rows_read,
            outcomes,
            skipped,
            stats,
        }
    }

    /// Fetch bars for every record, results in input order
    async fn fetch_all(&self, records: &[PatternRecord]) -> Vec<AnalysisResult<Vec<PriceBar>>> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let progress = self.progress_bar(records.len() as u64);
        let mut tasks = JoinSet::new();

        for (idx, record) in records.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let symbol = record.symbol.clone();
            let (start, end) = self.options.window.around(record.date);
            let fetch_timeout = self.options.fetch_timeout;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return (
                            idx,
                            Err(AnalysisError::DataUnavailable {
                                symbol,
                                reason: e.to_string(),
                            }),
                        )
                    }
                };

                debug!("Fetching {} {}..{}", symbol, start, end);
                let fetched =
                    tokio::time::timeout(fetch_timeout, fetcher.fetch(&symbol, start, end)).await;
                let result = fetched.unwrap_or_else(|_| {
                    Err(AnalysisError::DataUnavailable {
                        reason: format!("timed out after {}s", fetch_timeout.as_secs_f64()),
                        symbol,
                    })
                });
                (idx, result)
            });
        }

        let mut results: Vec<Option<AnalysisResult<Vec<PriceBar>>>> =
            (0..records.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => {
                    if let Err(e) = &result {
                        warn!("Fetch failed: {}", e);
                    }
                    results[idx] = Some(result);
                }
                Err(e) => warn!("Fetch task failed: {}", e),
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        results
            .into_iter()
            .zip(records)
            .map(|(result, record)| {
                result.unwrap_or_else(|| {
                    Err(AnalysisError::DataUnavailable {
                        symbol: record.symbol.clone(),
                        reason: "fetch task aborted".to_string(),
                    })
                })
            })
            .collect()
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} fetched ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
