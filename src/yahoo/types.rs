//! Yahoo chart API response types

use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::types::{Interval, IntervalUnit, RawRecord};

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    /// Bar open times in seconds; absent when the range holds no bars
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
    #[serde(default)]
    pub adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Quote {
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AdjClose {
    pub adjclose: Vec<Option<f64>>,
}

/// Yahoo `interval` parameter for a timeframe, if Yahoo serves it
pub fn interval_code(interval: &Interval) -> Option<&'static str> {
    let code = match (interval.unit(), interval.count()) {
        (IntervalUnit::Minute, 1) => "1m",
        (IntervalUnit::Minute, 2) => "2m",
        (IntervalUnit::Minute, 5) => "5m",
        (IntervalUnit::Minute, 15) => "15m",
        (IntervalUnit::Minute, 30) => "30m",
        (IntervalUnit::Minute, 90) => "90m",
        (IntervalUnit::Hour, 1) => "1h",
        (IntervalUnit::Day, 1) => "1d",
        (IntervalUnit::Day, 5) => "5d",
        (IntervalUnit::Week, 1) => "1wk",
        (IntervalUnit::Month, 1) => "1mo",
        (IntervalUnit::Month, 3) => "3mo",
        _ => return None,
    };
    Some(code)
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// Turn a chart response into records.
///
/// Rows with no values at all (market holidays) are skipped. With
/// `auto_adjust`, open/high/low/close are scaled by `adjclose / close` so the
/// series accounts for dividends and splits.
pub fn parse_chart(
    response: ChartResponse,
    auto_adjust: bool,
    provider: &str,
) -> Result<Vec<RawRecord>, FetchError> {
    if let Some(error) = response.chart.error {
        return Err(FetchError::rejected(
            provider,
            format!("{}: {}", error.code, error.description),
        ));
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .unwrap_or_default()
        .adjclose;

    let mut records = Vec::with_capacity(result.timestamp.len());
    for (i, &seconds) in result.timestamp.iter().enumerate() {
        let mut open = at(&quote.open, i);
        let mut high = at(&quote.high, i);
        let mut low = at(&quote.low, i);
        let mut close = at(&quote.close, i);
        let volume = at(&quote.volume, i);

        if [open, high, low, close, volume].iter().all(Option::is_none) {
            continue;
        }

        if auto_adjust {
            if let (Some(adj), Some(raw_close)) = (at(&adjclose, i), close) {
                if raw_close != 0.0 {
                    let ratio = adj / raw_close;
                    open = open.map(|v| v * ratio);
                    high = high.map(|v| v * ratio);
                    low = low.map(|v| v * ratio);
                    close = Some(adj);
                }
            }
        }

        let Some(timestamp) = seconds.checked_mul(1000) else {
            return Err(FetchError::rejected(
                provider,
                format!("timestamp out of range: {}", seconds),
            ));
        };

        records.push(RawRecord::new(
            timestamp,
            Value::from(open),
            Value::from(high),
            Value::from(low),
            Value::from(close),
            Value::from(volume),
        ));
    }

    Ok(records)
}
