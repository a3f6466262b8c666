//! Kraken OHLC wire format
//!
//! ```text
//! {"error": [],
//!  "result": {"XXBTZUSD": [[time, open, high, low, close, vwap, volume, count], ...],
//!             "last": 1688672160}}
//! ```
//!
//! Times are whole seconds; prices and volume are decimal strings.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::types::{Interval, RawRecord};

/// Supported OHLC intervals, in minutes
pub const KRAKEN_INTERVAL_MINUTES: &[u32] = &[1, 5, 15, 30, 60, 240, 1440, 10080, 21600];

/// Error prefixes Kraken uses for throttling and maintenance windows
const TRANSIENT_ERROR_PREFIXES: &[&str] = &[
    "EAPI:Rate limit",
    "EGeneral:Too many requests",
    "EService:Unavailable",
    "EService:Busy",
];

#[derive(Debug, Clone, Deserialize)]
pub struct OhlcResponse {
    #[serde(default)]
    pub error: Vec<String>,
    pub result: Option<Map<String, Value>>,
}

/// Kraken `interval` parameter for a timeframe, if Kraken serves it
pub fn interval_minutes(interval: &Interval) -> Option<u32> {
    interval
        .minutes()
        .filter(|m| KRAKEN_INTERVAL_MINUTES.contains(m))
}

pub fn is_transient_error(message: &str) -> bool {
    TRANSIENT_ERROR_PREFIXES
        .iter()
        .any(|prefix| message.starts_with(prefix))
}

/// Convert one OHLC row; the vwap column (index 5) is skipped
pub fn ohlc_row_to_record(row: &[Value]) -> Option<RawRecord> {
    if row.len() < 7 {
        return None;
    }

    let seconds = row[0]
        .as_i64()
        .or_else(|| row[0].as_f64().map(|t| t as i64))?;

    Some(RawRecord {
        timestamp: seconds.checked_mul(1000)?,
        open: row[1].clone(),
        high: row[2].clone(),
        low: row[3].clone(),
        close: row[4].clone(),
        volume: row[6].clone(),
    })
}

/// Extract the candle series from a response.
///
/// A non-empty `error` array fails the request; rate-limit and service errors
/// are transient, the rest are rejections.
pub fn parse_ohlc(response: OhlcResponse, provider: &str) -> Result<Vec<RawRecord>, FetchError> {
    if !response.error.is_empty() {
        let message = response.error.join("; ");
        return Err(if response.error.iter().any(|e| is_transient_error(e)) {
            FetchError::transient(provider, message)
        } else {
            FetchError::rejected(provider, message)
        });
    }

    let result = response
        .result
        .ok_or_else(|| FetchError::rejected(provider, "response has no result"))?;

    // The result holds one entry keyed by Kraken's pair name plus the `last` cursor
    let rows = result
        .iter()
        .filter(|(key, _)| key.as_str() != "last")
        .find_map(|(_, value)| value.as_array())
        .ok_or_else(|| FetchError::rejected(provider, "response has no OHLC series"))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            row.as_array()
                .and_then(|cols| ohlc_row_to_record(cols))
                .ok_or_else(|| {
                    FetchError::rejected(provider, format!("malformed OHLC row {}: {}", i, row))
                })
        })
        .collect()
}
