//! Binance API client for fetching historical kline (candlestick) data
//!
//! No API key required for public market data endpoints.
//!
//! # Example
//! ```no_run
//! use candle_fetch::binance::BinanceClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BinanceClient::new()?;
//!     let klines = client.get_klines("BTCUSDT", "1h", None, None, Some(100)).await?;
//!     println!("Fetched {} klines", klines.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::types::{interval_code, parse_klines, to_binance_pair};
use crate::common::http::get_json;
use crate::config::ProviderConfig;
use crate::error::{Error, FetchError};
use crate::fetcher::{CandleSource, Page, PageRequest};
use crate::types::RawRecord;

/// Base URL for Binance API
pub const BINANCE_API_BASE: &str = "https://api.binance.com";

/// Maximum klines per request (Binance limit)
pub const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Rate limit delay between requests (ms)
pub const RATE_LIMIT_DELAY_MS: u64 = 100;

const PROVIDER: &str = "binance";

/// Binance API client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    min_request_interval: Duration,
}

impl BinanceClient {
    /// Create a new Binance client with default settings
    pub fn new() -> Result<Self, Error> {
        Self::with_config(&ProviderConfig::default())
    }

    /// Create a client from provider settings
    pub fn with_config(config: &ProviderConfig) -> Result<Self, Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(BinanceClient {
            client,
            base_url: config.base_url_or(BINANCE_API_BASE),
            min_request_interval: config
                .min_request_interval()
                .unwrap_or(Duration::from_millis(RATE_LIMIT_DELAY_MS)),
        })
    }

    /// Fetch klines (candlestick data) from Binance
    ///
    /// # Arguments
    /// * `symbol` - Binance trading pair (e.g., "BTCUSDT")
    /// * `interval` - Timeframe (e.g., "1h", "4h", "1d")
    /// * `start_time` - Optional start time in milliseconds (inclusive)
    /// * `end_time` - Optional end time in milliseconds (inclusive)
    /// * `limit` - Optional number of klines to fetch (max 1000)
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let url = format!("{}/api/v3/klines", self.base_url);

        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
        ];

        if let Some(start) = start_time {
            params.push(("startTime", start.to_string()));
        }

        if let Some(end) = end_time {
            params.push(("endTime", end.to_string()));
        }

        let limit = limit
            .unwrap_or(MAX_KLINES_PER_REQUEST)
            .min(MAX_KLINES_PER_REQUEST);
        params.push(("limit", limit.to_string()));

        debug!(
            "Fetching klines: symbol={}, interval={}, startTime={:?}, limit={}",
            symbol, interval, start_time, limit
        );

        let rows: Vec<Vec<serde_json::Value>> =
            get_json(self.client.get(&url).query(&params), PROVIDER).await?;

        parse_klines(&rows).map_err(|reason| FetchError::rejected(PROVIDER, reason))
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn max_page_limit(&self) -> usize {
        MAX_KLINES_PER_REQUEST
    }

    fn min_request_interval(&self) -> Duration {
        self.min_request_interval
    }

    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<Page, FetchError> {
        let interval = interval_code(&request.interval).ok_or_else(|| {
            FetchError::rejected(
                PROVIDER,
                format!("unsupported interval {}", request.interval),
            )
        })?;

        let (start_time, end_time) = kline_range(request);

        self.get_klines(
            &to_binance_pair(request.symbol),
            &interval,
            Some(start_time),
            end_time,
            Some(request.limit),
        )
        .await
    }
}

/// `startTime` and `endTime` for a page. Both are inclusive on Binance, so the
/// exclusive `until` moves back one millisecond.
fn kline_range(request: &PageRequest<'_>) -> (i64, Option<i64>) {
    (request.since, request.until.map(|until| until - 1))
}
