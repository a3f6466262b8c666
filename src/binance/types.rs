//! Binance kline wire format and symbol/interval conventions

use serde_json::Value;

use crate::types::{Interval, RawRecord};

/// Binance kline row
/// API returns an array: [open_time, open, high, low, close, volume, close_time,
///                        quote_volume, trades, taker_buy_base, taker_buy_quote, ignore]
/// Only the first six fields are kept.
pub fn kline_to_record(raw: &[Value]) -> Option<RawRecord> {
    if raw.len() < 6 {
        return None;
    }

    Some(RawRecord {
        timestamp: raw[0].as_i64()?,
        open: raw[1].clone(),
        high: raw[2].clone(),
        low: raw[3].clone(),
        close: raw[4].clone(),
        volume: raw[5].clone(),
    })
}

/// Convert rows from the klines endpoint, failing on the first row that
/// lacks an integer open time or the OHLCV columns
pub fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<RawRecord>, String> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            kline_to_record(row)
                .ok_or_else(|| format!("malformed kline at row {}: {}", i, Value::from(row.clone())))
        })
        .collect()
}

/// Binance pair for a native (`BTCUSDT`) or unified (`BTC/USDT`) symbol
pub fn to_binance_pair(symbol: &str) -> String {
    symbol
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_'))
        .collect()
}

/// Valid Binance intervals
pub const BINANCE_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Check if interval is valid for Binance
pub fn is_valid_interval(interval: &str) -> bool {
    BINANCE_INTERVALS.contains(&interval)
}

/// Binance interval code, if Binance serves this timeframe
pub fn interval_code(interval: &Interval) -> Option<String> {
    let code = interval.to_string();
    is_valid_interval(&code).then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kline_row_keeps_ohlcv() {
        let row: Vec<Value> = serde_json::from_value(json!([
            1577836800000i64, "7195.24000000", "7196.25000000", "7175.46000000",
            "7177.02000000", "511.81416100", 1577837699999i64, "3675857.68", 7640,
            "226.96", "1630633.42", "0"
        ]))
        .unwrap();

        let record = kline_to_record(&row).unwrap();

        assert_eq!(record.timestamp, 1_577_836_800_000);
        assert_eq!(record.open, json!("7195.24000000"));
        assert_eq!(record.volume, json!("511.81416100"));
    }

    #[test]
    fn test_short_row_is_rejected() {
        let rows = vec![vec![json!(1), json!("1"), json!("1")]];
        assert!(parse_klines(&rows).unwrap_err().contains("row 0"));
    }

    #[test]
    fn test_non_integer_open_time_is_rejected() {
        let rows = vec![vec![json!("x"), json!("1"), json!("1"), json!("1"), json!("1"), json!("1")]];
        assert!(parse_klines(&rows).is_err());
    }

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(to_binance_pair("BTCUSDT"), "BTCUSDT");
        assert_eq!(to_binance_pair("btc/usdt"), "BTCUSDT");
        assert_eq!(to_binance_pair(" ETH-BTC "), "ETHBTC");
    }

    #[test]
    fn test_valid_intervals() {
        assert!(is_valid_interval("1h"));
        assert!(is_valid_interval("4h"));
        assert!(is_valid_interval("1d"));
        assert!(!is_valid_interval("2d"));
    }

    #[test]
    fn test_interval_code() {
        assert_eq!(interval_code(&"60m".parse().unwrap()), Some("1h".to_string()));
        assert_eq!(interval_code(&"1M".parse().unwrap()), Some("1M".to_string()));
        assert_eq!(interval_code(&"90m".parse().unwrap()), None);
    }
}
