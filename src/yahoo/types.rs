//! Yahoo Finance chart API response types

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::warn;

use crate::PriceBar;

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    #[serde(default)]
    pub symbol: Option<String>,
    /// Exchange offset from UTC in seconds (19800 for NSE)
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
}

/// Column-oriented OHLCV arrays; holidays and halts show up as nulls
#[derive(Debug, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

impl ChartResult {
    /// Convert the column arrays to validated daily bars in date order
    ///
    /// Rows with missing prices or failing validation are dropped with a
    /// warning.
    pub fn to_bars(&self) -> Vec<PriceBar> {
        let Some(quote) = self.indicators.quote.first() else {
            return Vec::new();
        };

        let at = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();
        let mut bars = Vec::with_capacity(self.timestamp.len());
        let mut dropped = 0;

        for (i, &ts) in self.timestamp.iter().enumerate() {
            let Some(date) = local_date(ts, self.meta.gmtoffset) else {
                dropped += 1;
                continue;
            };

            let (Some(open), Some(high), Some(low), Some(close)) = (
                at(&quote.open, i),
                at(&quote.high, i),
                at(&quote.low, i),
                at(&quote.close, i),
            ) else {
                dropped += 1;
                continue;
            };
            let volume = at(&quote.volume, i).unwrap_or(0.0);

            match PriceBar::new(date, open, high, low, close, volume) {
                Ok(bar) => bars.push(bar),
                Err(e) => {
                    dropped += 1;
                    warn!("Skipping invalid bar on {}: {}", date, e);
                }
            }
        }

        if dropped > 0 {
            warn!(
                "Dropped {} of {} rows for {}",
                dropped,
                self.timestamp.len(),
                self.meta.symbol.as_deref().unwrap_or("?")
            );
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        bars
    }
}

/// Exchange-local calendar date for a unix timestamp
pub fn local_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "RELIANCE.NS", "gmtoffset": 19800, "exchangeTimezoneName": "Asia/Kolkata" },
                "timestamp": [1709610300, 1709696700, 1709783100],
                "indicators": {
                    "quote": [{
                        "open":   [2950.0, null, 2990.0],
                        "high":   [2980.5, 3000.0, 3010.0],
                        "low":    [2940.0, 2960.0, 2985.0],
                        "close":  [2970.0, 2990.0, 3005.0],
                        "volume": [1000, 2000, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_and_convert() {
        let response: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let result = &response.chart.result.unwrap()[0];
        let bars = result.to_bars();

        // Second row has a null open and is dropped
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(bars[0].high, 2980.5);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn test_error_payload() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let response: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(response.chart.result.is_none());
        assert_eq!(response.chart.error.unwrap().code, "Not Found");
    }

    #[test]
    fn test_local_date_uses_offset() {
        // 2024-03-04 20:00 UTC is already 2024-03-05 in IST
        let ts = 1709582400;
        assert_eq!(
            local_date(ts, 0),
            Some(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
        );
        assert_eq!(
            local_date(ts, 19800),
            Some(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        );
    }
}
