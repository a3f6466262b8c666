//! Raw series -> typed candle rows

use chrono::DateTime;
use serde_json::Value;

use crate::error::Error;
use crate::fetcher::Series;
use crate::types::{Candle, RawRecord};

/// Coerce every record of `series` into a [`Candle`].
///
/// Numbers are taken as-is, strings are parsed as floats. Any other value
/// aborts with [`Error::MalformedRecord`]. An empty series is an
/// [`Error::EmptyResult`] so that callers never persist an empty file.
pub fn normalize(series: &Series, symbol: &str, interval: &str) -> Result<Vec<Candle>, Error> {
    if series.is_empty() {
        return Err(Error::EmptyResult {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        });
    }

    series
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| to_candle(index, record))
        .collect()
}

fn to_candle(index: usize, record: &RawRecord) -> Result<Candle, Error> {
    let datetime =
        DateTime::from_timestamp_millis(record.timestamp).ok_or_else(|| Error::MalformedRecord {
            index,
            field: "timestamp",
            value: record.timestamp.to_string(),
        })?;

    Ok(Candle {
        datetime,
        open: coerce(index, "open", &record.open)?,
        high: coerce(index, "high", &record.high)?,
        low: coerce(index, "low", &record.low)?,
        close: coerce(index, "close", &record.close)?,
        volume: coerce(index, "volume", &record.volume)?,
    })
}

fn coerce(index: usize, field: &'static str, value: &Value) -> Result<f64, Error> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| Error::MalformedRecord {
        index,
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn series(records: Vec<RawRecord>) -> Series {
        Series {
            records,
            requests: 1,
        }
    }

    #[test]
    fn test_string_fields_are_parsed() {
        let s = series(vec![RawRecord::new(
            1_577_836_800_000,
            "7195.24",
            "7196.25",
            "7175.46",
            "7177.02",
            "511.81",
        )]);

        let candles = normalize(&s, "BTCUSDT", "1h").unwrap();

        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.datetime.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert_relative_eq!(c.open, 7195.24);
        assert_relative_eq!(c.high, 7196.25);
        assert_relative_eq!(c.low, 7175.46);
        assert_relative_eq!(c.close, 7177.02);
        assert_relative_eq!(c.volume, 511.81);
    }

    #[test]
    fn test_numeric_fields_pass_through() {
        let s = series(vec![RawRecord::new(
            1_700_000_000_000,
            json!(189.5),
            json!(190),
            json!(188.25),
            json!(189.9),
            json!(51_000_000u64),
        )]);

        let candles = normalize(&s, "AAPL", "1d").unwrap();

        assert_relative_eq!(candles[0].high, 190.0);
        assert_relative_eq!(candles[0].volume, 51_000_000.0);
    }

    #[test]
    fn test_receipt_order_and_duplicates_preserved() {
        let s = series(vec![
            RawRecord::new(2_000, "2", "2", "2", "2", "2"),
            RawRecord::new(1_000, "1", "1", "1", "1", "1"),
            RawRecord::new(1_000, "1", "1", "1", "1", "1"),
        ]);

        let candles = normalize(&s, "X", "1s").unwrap();

        let ts: Vec<i64> = candles.iter().map(|c| c.datetime.timestamp_millis()).collect();
        assert_eq!(ts, vec![2_000, 1_000, 1_000]);
    }

    #[test]
    fn test_empty_series_is_an_error() {
        let err = normalize(&Series::default(), "BTCUSDT", "1m").unwrap_err();
        assert!(matches!(
            err,
            Error::EmptyResult { ref symbol, ref interval } if symbol == "BTCUSDT" && interval == "1m"
        ));
    }

    #[test]
    fn test_non_numeric_price_is_malformed() {
        let s = series(vec![
            RawRecord::new(0, "1", "1", "1", "1", "1"),
            RawRecord::new(60_000, "1", "abc", "1", "1", "1"),
        ]);

        let err = normalize(&s, "BTCUSDT", "1m").unwrap_err();

        match err {
            Error::MalformedRecord { index, field, value } => {
                assert_eq!(index, 1);
                assert_eq!(field, "high");
                assert_eq!(value, "\"abc\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_volume_is_malformed() {
        let s = series(vec![RawRecord::new(0, json!(1.0), json!(1.0), json!(1.0), json!(1.0), Value::Null)]);

        let err = normalize(&s, "AAPL", "1d").unwrap_err();

        assert!(matches!(err, Error::MalformedRecord { field: "volume", .. }));
    }

    #[test]
    fn test_out_of_range_timestamp_is_malformed() {
        let s = series(vec![RawRecord::new(i64::MAX, "1", "1", "1", "1", "1")]);

        let err = normalize(&s, "BTCUSDT", "1m").unwrap_err();

        assert!(matches!(err, Error::MalformedRecord { field: "timestamp", .. }));
    }
}
