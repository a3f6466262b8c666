//! Provider registry and the download pipeline
//!
//! `DataSource` names a provider, `SourceClient` is the connected client, and
//! [`download`] runs fetch -> normalize -> write for one symbol.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::binance::{self, BinanceClient};
use crate::config::{Config, ProviderConfig};
use crate::error::{Error, FetchError};
use crate::exchange::{ExchangeId, UnifiedExchange};
use crate::fetcher::{
    fetch_series, CandleSource, FetchObserver, FetchOptions, Page, PageRequest, SeriesRequest,
};
use crate::kraken;
use crate::normalize::normalize;
use crate::sink::{output_path, write_csv};
use crate::types::{Candle, Interval};
use crate::yahoo::{self, YahooClient};

// =============================================================================
// Provider registry
// =============================================================================

/// Upstream a download is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// Binance klines REST API, native or unified symbols
    Binance,
    /// Unified exchange layer
    Exchange(ExchangeId),
    /// Yahoo Finance chart API
    Yahoo,
}

impl DataSource {
    pub const ALL: [DataSource; 4] = [
        DataSource::Binance,
        DataSource::Exchange(ExchangeId::Binance),
        DataSource::Exchange(ExchangeId::Kraken),
        DataSource::Yahoo,
    ];

    /// Provider part of the output file name
    pub fn file_prefix(&self) -> &'static str {
        match self {
            DataSource::Binance => "binance",
            DataSource::Exchange(id) => id.id(),
            DataSource::Yahoo => "yahoo",
        }
    }

    /// Records per request the upstream serves at most (`None` if uncapped)
    pub fn page_cap(&self) -> Option<usize> {
        match self {
            DataSource::Binance | DataSource::Exchange(ExchangeId::Binance) => {
                Some(binance::MAX_KLINES_PER_REQUEST)
            }
            DataSource::Exchange(ExchangeId::Kraken) => Some(kraken::MAX_OHLC_PER_REQUEST),
            DataSource::Yahoo => None,
        }
    }

    /// Throttle applied when the configuration sets none
    pub fn default_request_interval(&self) -> Duration {
        match self {
            DataSource::Binance => Duration::from_millis(binance::RATE_LIMIT_DELAY_MS),
            DataSource::Exchange(id) => id.rate_limit(),
            DataSource::Yahoo => Duration::from_millis(yahoo::RATE_LIMIT_DELAY_MS),
        }
    }

    /// HTTP settings section of `config` this provider reads
    pub fn provider_config<'a>(&self, config: &'a Config) -> &'a ProviderConfig {
        match self {
            DataSource::Binance | DataSource::Exchange(ExchangeId::Binance) => {
                &config.providers.binance
            }
            DataSource::Exchange(ExchangeId::Kraken) => &config.providers.kraken,
            DataSource::Yahoo => &config.providers.yahoo.http,
        }
    }

    pub fn connect(&self, config: &Config) -> Result<SourceClient, Error> {
        let client = match self {
            DataSource::Binance => {
                SourceClient::Binance(BinanceClient::with_config(&config.providers.binance)?)
            }
            DataSource::Exchange(id) => {
                SourceClient::Exchange(UnifiedExchange::connect(*id, config)?)
            }
            DataSource::Yahoo => {
                SourceClient::Yahoo(YahooClient::with_config(&config.providers.yahoo)?)
            }
        };
        Ok(client)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Binance => f.write_str("binance"),
            DataSource::Exchange(id) => write!(f, "exchange:{}", id),
            DataSource::Yahoo => f.write_str("yahoo"),
        }
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if let Some(id) = s.strip_prefix("exchange:") {
            return id.parse().map(DataSource::Exchange);
        }

        match s.as_str() {
            "binance" => Ok(DataSource::Binance),
            "kraken" => Ok(DataSource::Exchange(ExchangeId::Kraken)),
            "yahoo" => Ok(DataSource::Yahoo),
            other => Err(format!(
                "Unknown provider: '{}'. Supported: binance, exchange:binance, exchange:kraken, yahoo",
                other
            )),
        }
    }
}

/// Connected client for a [`DataSource`]
#[derive(Debug, Clone)]
pub enum SourceClient {
    Binance(BinanceClient),
    Exchange(UnifiedExchange),
    Yahoo(YahooClient),
}

impl SourceClient {
    fn inner(&self) -> &dyn CandleSource {
        match self {
            SourceClient::Binance(client) => client,
            SourceClient::Exchange(client) => client,
            SourceClient::Yahoo(client) => client,
        }
    }
}

#[async_trait]
impl CandleSource for SourceClient {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn cursor_step_ms(&self) -> i64 {
        self.inner().cursor_step_ms()
    }

    fn max_page_limit(&self) -> usize {
        self.inner().max_page_limit()
    }

    fn min_request_interval(&self) -> Duration {
        self.inner().min_request_interval()
    }

    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<Page, FetchError> {
        match self {
            SourceClient::Binance(client) => client.fetch_page(request).await,
            SourceClient::Exchange(client) => client.fetch_page(request).await,
            SourceClient::Yahoo(client) => client.fetch_page(request).await,
        }
    }
}

// =============================================================================
// Download pipeline
// =============================================================================

/// One symbol to download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub source: DataSource,
    pub symbol: String,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    /// Exclusive; `None` downloads up to the latest bar
    pub end: Option<DateTime<Utc>>,
    /// Overrides [`Config::page_limit`]
    pub page_limit: Option<usize>,
}

impl DownloadRequest {
    pub fn new(
        source: DataSource,
        symbol: impl Into<String>,
        interval: Interval,
        start: DateTime<Utc>,
    ) -> Self {
        DownloadRequest {
            source,
            symbol: symbol.into(),
            interval,
            start,
            end: None,
            page_limit: None,
        }
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = Some(page_limit);
        self
    }

    /// Fetcher request, taking the page limit from `config` unless overridden
    pub fn series_request(&self, config: &Config) -> SeriesRequest {
        let mut request = SeriesRequest::new(
            self.symbol.trim(),
            self.interval,
            self.start.timestamp_millis(),
        )
        .with_page_limit(self.page_limit.unwrap_or(config.page_limit));
        if let Some(end) = self.end {
            request = request.with_end(end.timestamp_millis());
        }
        request
    }
}

/// Result of a completed download
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub candles: Vec<Candle>,
    pub path: PathBuf,
    /// Page requests that returned data
    pub requests: u32,
}

/// Download `request` with the clients and settings from `config`
pub async fn download<O>(
    request: &DownloadRequest,
    config: &Config,
    observer: &mut O,
) -> Result<Download, Error>
where
    O: FetchObserver + ?Sized,
{
    let series_request = request.series_request(config);
    series_request.validate()?;

    let mut client = request.source.connect(config)?;
    let options = config.fetch_options(request.source.provider_config(config));

    download_from(
        &mut client,
        request.source.file_prefix(),
        &series_request,
        &options,
        &config.data_dir,
        observer,
    )
    .await
}

/// Blocking wrapper around [`download`] for synchronous callers
pub fn download_blocking<O>(
    request: &DownloadRequest,
    config: &Config,
    observer: &mut O,
) -> Result<Download, Error>
where
    O: FetchObserver + ?Sized,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;
    runtime.block_on(download(request, config, observer))
}

/// Fetch, normalize and write one series from an already connected source.
///
/// Nothing is written unless every stage succeeds.
pub async fn download_from<S, O>(
    source: &mut S,
    file_prefix: &str,
    request: &SeriesRequest,
    options: &FetchOptions,
    data_dir: impl AsRef<Path>,
    observer: &mut O,
) -> Result<Download, Error>
where
    S: CandleSource + ?Sized,
    O: FetchObserver + ?Sized,
{
    request.validate()?;

    let interval = request.interval.to_string();
    let series = fetch_series(source, request, options, observer).await?;
    let candles = normalize(&series, &request.symbol, &interval)?;

    let path = output_path(data_dir, file_prefix, &request.symbol, &interval);
    let path = write_csv(&candles, path)?;

    info!(
        "Downloaded {} {} rows for {} into {}",
        candles.len(),
        interval,
        request.symbol,
        path.display()
    );

    Ok(Download {
        candles,
        path,
        requests: series.requests,
    })
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or RFC 3339 as a UTC instant
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, Error> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::from_naive_utc_and_offset(ndt, Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
        .ok_or_else(|| {
            Error::InvalidRequest(format!(
                "invalid date '{}': expected YYYY-MM-DD or RFC 3339",
                s
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_providers() {
        assert_eq!("binance".parse::<DataSource>().unwrap(), DataSource::Binance);
        assert_eq!("YAHOO".parse::<DataSource>().unwrap(), DataSource::Yahoo);
        assert_eq!(
            "exchange:kraken".parse::<DataSource>().unwrap(),
            DataSource::Exchange(ExchangeId::Kraken)
        );
        assert_eq!(
            "kraken".parse::<DataSource>().unwrap(),
            DataSource::Exchange(ExchangeId::Kraken)
        );
        assert!("exchange:ftx".parse::<DataSource>().is_err());
        assert!("coinbase".parse::<DataSource>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for source in DataSource::ALL {
            assert_eq!(source.to_string().parse::<DataSource>().unwrap(), source);
        }
    }

    #[test]
    fn test_file_prefix() {
        assert_eq!(DataSource::Binance.file_prefix(), "binance");
        assert_eq!(DataSource::Exchange(ExchangeId::Kraken).file_prefix(), "kraken");
        assert_eq!(DataSource::Yahoo.file_prefix(), "yahoo");
    }

    #[test]
    fn test_registry_caps_and_throttles() {
        assert_eq!(DataSource::Binance.page_cap(), Some(1000));
        assert_eq!(DataSource::Exchange(ExchangeId::Kraken).page_cap(), Some(720));
        assert_eq!(DataSource::Yahoo.page_cap(), None);
        assert_eq!(
            DataSource::Exchange(ExchangeId::Binance).default_request_interval(),
            Duration::from_millis(50)
        );
        assert_eq!(
            DataSource::Binance.default_request_interval(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_connect_every_provider() {
        let config = Config::default();
        for source in DataSource::ALL {
            let client = source.connect(&config).unwrap();
            assert_eq!(client.name(), source.file_prefix());
            assert_eq!(client.min_request_interval(), source.default_request_interval());
        }
    }

    #[test]
    fn test_series_request_from_download() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
        let mut config = Config::default();
        config.page_limit = 500;

        let request = DownloadRequest::new(DataSource::Binance, " BTCUSDT ", Interval::ONE_HOUR, start)
            .with_end(end);
        let series = request.series_request(&config);

        assert_eq!(series.symbol, "BTCUSDT");
        assert_eq!(series.start, 1_577_836_800_000);
        assert_eq!(series.end, Some(1_577_923_200_000));
        assert_eq!(series.page_limit, 500);
        assert_eq!(request.with_page_limit(10).series_request(&config).page_limit, 10);
    }

    #[test]
    fn test_invalid_request_fails_before_connecting() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let request =
            DownloadRequest::new(DataSource::Yahoo, "AAPL", Interval::ONE_DAY, start).with_page_limit(0);

        let err = download_blocking(&request, &Config::default(), &mut ()).unwrap_err();

        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_date() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2023-01-01").unwrap(), expected);
        assert_eq!(parse_date("2023-01-01 00:00:00").unwrap(), expected);
        assert_eq!(parse_date("2023-01-01T02:00:00+02:00").unwrap(), expected);
        assert!(matches!(parse_date("01/01/2023"), Err(Error::InvalidRequest(_))));
    }
}
