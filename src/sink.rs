//! CSV persistence for normalized candles
//!
//! Files are written as `Date,Open,High,Low,Close,Volume` with UTC dates in
//! `%Y-%m-%d %H:%M:%S` format, one row per candle, ascending by date. An
//! existing file at the destination is overwritten.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Error;
use crate::types::Candle;

pub const CSV_HEADER: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Destination for one (provider, symbol, interval) combination:
/// `<data_dir>/<provider>_<symbol>_<interval>.csv`
pub fn output_path(
    data_dir: impl AsRef<Path>,
    provider: &str,
    symbol: &str,
    interval: &str,
) -> PathBuf {
    let filename = format!("{}_{}_{}.csv", provider, safe_symbol(symbol), interval);
    data_dir.as_ref().join(filename)
}

/// Strip characters that would break a file name (`BTC/USDT` -> `BTCUSDT`)
pub fn safe_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '=' | '^'))
        .collect()
}

/// Write candles to `path`, creating parent directories as needed.
///
/// Rows go to a hidden sibling file that is renamed over `path` once complete,
/// so a failed write leaves any previous file untouched.
pub fn write_csv(candles: &[Candle], path: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut sorted: Vec<&Candle> = candles.iter().collect();
    sorted.sort_by_key(|c| c.datetime);

    let staging = staging_path(path);
    let written = write_rows(&sorted, &staging).and_then(|()| {
        fs::rename(&staging, path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    });
    if let Err(e) = written {
        if staging.is_file() {
            let _ = fs::remove_file(&staging);
        }
        return Err(e);
    }

    info!("Saved {} rows to {}", candles.len(), path.display());
    Ok(path.to_path_buf())
}

/// `<dir>/.<file name>.tmp`
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "candles.csv".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

fn write_rows(candles: &[&Candle], path: &Path) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;

    for candle in candles {
        writer.write_record([
            candle.datetime.format(DATE_FORMAT).to_string(),
            candle.open.to_string(),
            candle.high.to_string(),
            candle.low.to_string(),
            candle.close.to_string(),
            candle.volume.to_string(),
        ])?;
    }

    writer.flush().map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a file produced by [`write_csv`]
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>, Error> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let mut candles = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let malformed = |idx: usize, field: &'static str| Error::MalformedRecord {
            index: row_idx,
            field,
            value: record.get(idx).unwrap_or_default().to_string(),
        };

        let datetime = record
            .get(0)
            .and_then(|date| NaiveDateTime::parse_from_str(date, DATE_FORMAT).ok())
            .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            .ok_or_else(|| malformed(0, "date"))?;

        let number = |idx: usize, field: &'static str| -> Result<f64, Error> {
            record
                .get(idx)
                .and_then(|v| v.trim().parse().ok())
                .ok_or_else(|| malformed(idx, field))
        };

        candles.push(Candle {
            datetime,
            open: number(1, "open")?,
            high: number(2, "high")?,
            low: number(3, "low")?,
            close: number(4, "close")?,
            volume: number(5, "volume")?,
        });
    }

    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("candle_fetch_sink_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn candle(hour: u32, close: f64) -> Candle {
        Candle {
            datetime: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close,
            volume: 1234.5,
        }
    }

    #[test]
    fn test_output_path() {
        let path = output_path("data", "binance", "BTC/USDT", "1h");
        assert_eq!(path, PathBuf::from("data/binance_BTCUSDT_1h.csv"));

        let path = output_path("data", "yahoo", "BTC-USD", "1d");
        assert_eq!(path, PathBuf::from("data/yahoo_BTC-USD_1d.csv"));
    }

    #[test]
    fn test_safe_symbol() {
        assert_eq!(safe_symbol("ETH/USD"), "ETHUSD");
        assert_eq!(safe_symbol("../../etc"), "....etc");
        assert_eq!(safe_symbol("^GSPC"), "^GSPC");
        assert_eq!(safe_symbol("EURUSD=X"), "EURUSD=X");
    }

    #[test]
    fn test_write_creates_directory_and_sorts() {
        let dir = temp_dir("sorts");
        let path = dir.join("nested").join("out.csv");

        write_csv(&[candle(2, 3.0), candle(0, 1.0), candle(1, 2.0)], &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Date,Open,High,Low,Close,Volume");
        assert_eq!(lines[1], "2024-01-01 00:00:00,100,110,90,1,1234.5");
        assert_eq!(lines[3], "2024-01-01 02:00:00,100,110,90,3,1234.5");
        assert_eq!(lines.len(), 4);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_existing_file_is_overwritten() {
        let dir = temp_dir("overwrite");
        let path = dir.join("out.csv");

        write_csv(&[candle(0, 1.0), candle(1, 2.0)], &path).unwrap();
        write_csv(&[candle(5, 9.0)], &path).unwrap();

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded, vec![candle(5, 9.0)]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_no_staging_file_left_behind() {
        let dir = temp_dir("staging");
        let path = dir.join("out.csv");

        write_csv(&[candle(0, 1.0)], &path).unwrap();

        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out.csv".to_string()]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = temp_dir("failed");
        let path = dir.join("out.csv");
        write_csv(&[candle(0, 1.0), candle(1, 2.0)], &path).unwrap();

        // A directory squatting on the staging name makes the next write fail
        fs::create_dir_all(staging_path(&path)).unwrap();
        assert!(write_csv(&[candle(5, 9.0)], &path).is_err());

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded, vec![candle(0, 1.0), candle(1, 2.0)]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        assert_eq!(
            staging_path(Path::new("data/binance_BTCUSDT_1h.csv")),
            PathBuf::from("data/.binance_BTCUSDT_1h.csv.tmp")
        );
    }

    #[test]
    fn test_existing_directory_is_fine() {
        let dir = temp_dir("existing");
        fs::create_dir_all(&dir).unwrap();

        assert!(write_csv(&[candle(0, 1.0)], dir.join("a.csv")).is_ok());
        assert!(write_csv(&[candle(0, 1.0)], dir.join("b.csv")).is_ok());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_rejects_bad_date() {
        let dir = temp_dir("baddate");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.csv");
        fs::write(&path, "Date,Open,High,Low,Close,Volume\nyesterday,1,1,1,1,1\n").unwrap();

        let err = load_csv(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { index: 0, field: "date", .. }));

        fs::remove_dir_all(&dir).unwrap();
    }
}
