//! Core data types shared by the fetcher, normalizer and sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One upstream record as received, before type coercion.
///
/// `timestamp` is the bar open time in milliseconds since the Unix epoch.
/// Price and volume fields keep the upstream JSON representation (Binance
/// and Kraken send strings, Yahoo sends numbers or `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub timestamp: i64,
    pub open: Value,
    pub high: Value,
    pub low: Value,
    pub close: Value,
    pub volume: Value,
}

impl RawRecord {
    pub fn new(
        timestamp: i64,
        open: impl Into<Value>,
        high: impl Into<Value>,
        low: impl Into<Value>,
        close: impl Into<Value>,
        volume: impl Into<Value>,
    ) -> Self {
        RawRecord {
            timestamp,
            open: open.into(),
            high: high.into(),
            low: low.into(),
            close: close.into(),
            volume: volume.into(),
        }
    }
}

/// OHLCV candlestick row after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Calendar unit of an [`Interval`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

/// Candle timeframe, e.g. `1m`, `4h`, `1d`, `1M`.
///
/// Parsing also accepts the aggregator spellings `60m`, `1wk` and `1mo`.
/// Minute counts that are whole hours are folded into hours so that `60m`
/// and `1h` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    count: u32,
    unit: IntervalUnit,
}

impl Interval {
    pub const ONE_MINUTE: Interval = Interval::new(1, IntervalUnit::Minute);
    pub const ONE_HOUR: Interval = Interval::new(1, IntervalUnit::Hour);
    pub const ONE_DAY: Interval = Interval::new(1, IntervalUnit::Day);

    pub const fn new(count: u32, unit: IntervalUnit) -> Self {
        Interval { count, unit }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Bar length in milliseconds. `None` for calendar months, whose length varies.
    pub fn duration_ms(&self) -> Option<i64> {
        let unit_ms: i64 = match self.unit {
            IntervalUnit::Minute => 60_000,
            IntervalUnit::Hour => 3_600_000,
            IntervalUnit::Day => 86_400_000,
            IntervalUnit::Week => 604_800_000,
            IntervalUnit::Month => return None,
        };
        unit_ms.checked_mul(i64::from(self.count))
    }

    /// Bar length in whole minutes, if it has a fixed length that fits a `u32`
    pub fn minutes(&self) -> Option<u32> {
        self.duration_ms()
            .and_then(|ms| u32::try_from(ms / 60_000).ok())
    }
}

impl std::str::FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, unit) = if let Some(d) = s.strip_suffix("mo") {
            (d, IntervalUnit::Month)
        } else if let Some(d) = s.strip_suffix("wk") {
            (d, IntervalUnit::Week)
        } else {
            let unknown = || format!("Unknown interval: '{}'. Use e.g. 1m, 1h, 1d, 1w, 1M", s);
            let last = s.chars().last().ok_or_else(unknown)?;
            let unit = match last {
                'm' => IntervalUnit::Minute,
                'h' => IntervalUnit::Hour,
                'd' => IntervalUnit::Day,
                'w' => IntervalUnit::Week,
                'M' => IntervalUnit::Month,
                _ => return Err(unknown()),
            };
            (&s[..s.len() - last.len_utf8()], unit)
        };

        let count: u32 = digits
            .parse()
            .map_err(|_| format!("Invalid interval count in '{}'", s))?;
        if count == 0 {
            return Err(format!("Interval count must be positive: '{}'", s));
        }

        if unit == IntervalUnit::Minute && count % 60 == 0 {
            return Ok(Interval::new(count / 60, IntervalUnit::Hour));
        }
        Ok(Interval::new(count, unit))
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suffix = match self.unit {
            IntervalUnit::Minute => "m",
            IntervalUnit::Hour => "h",
            IntervalUnit::Day => "d",
            IntervalUnit::Week => "w",
            IntervalUnit::Month => "M",
        };
        write!(f, "{}{}", self.count, suffix)
    }
}
