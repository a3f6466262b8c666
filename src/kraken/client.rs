//! Kraken public OHLC client
//!
//! Kraken has no end-time parameter and returns at most 720 bars per call,
//! starting after `since` (seconds).

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::types::{interval_minutes, parse_ohlc, OhlcResponse};
use crate::common::http::get_json;
use crate::config::ProviderConfig;
use crate::error::{Error, FetchError};
use crate::fetcher::{CandleSource, Page, PageRequest};
use crate::types::RawRecord;

pub const KRAKEN_API_BASE: &str = "https://api.kraken.com";

/// Bars returned by one OHLC call
pub const MAX_OHLC_PER_REQUEST: usize = 720;

/// Public endpoint budget, one call every 3 seconds
pub const RATE_LIMIT_DELAY_MS: u64 = 3000;

const PROVIDER: &str = "kraken";

#[derive(Debug, Clone)]
pub struct KrakenClient {
    client: Client,
    base_url: String,
    min_request_interval: Duration,
}

impl KrakenClient {
    pub fn new() -> Result<Self, Error> {
        Self::with_config(&ProviderConfig::default())
    }

    pub fn with_config(config: &ProviderConfig) -> Result<Self, Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(KrakenClient {
            client,
            base_url: config.base_url_or(KRAKEN_API_BASE),
            min_request_interval: config
                .min_request_interval()
                .unwrap_or(Duration::from_millis(RATE_LIMIT_DELAY_MS)),
        })
    }

    /// Fetch OHLC bars for a Kraken pair (e.g. `XBTUSD`)
    ///
    /// `since` is in seconds; Kraken returns bars after it.
    pub async fn get_ohlc(
        &self,
        pair: &str,
        interval_minutes: u32,
        since: Option<i64>,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let url = format!("{}/0/public/OHLC", self.base_url);

        let mut params = vec![
            ("pair", pair.to_string()),
            ("interval", interval_minutes.to_string()),
        ];
        if let Some(since) = since {
            params.push(("since", since.to_string()));
        }

        debug!(
            "Fetching OHLC: pair={}, interval={}m, since={:?}",
            pair, interval_minutes, since
        );

        let response: OhlcResponse =
            get_json(self.client.get(&url).query(&params), PROVIDER).await?;

        parse_ohlc(response, PROVIDER)
    }
}

#[async_trait]
impl CandleSource for KrakenClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn cursor_step_ms(&self) -> i64 {
        1000
    }

    fn max_page_limit(&self) -> usize {
        MAX_OHLC_PER_REQUEST
    }

    fn min_request_interval(&self) -> Duration {
        self.min_request_interval
    }

    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<Page, FetchError> {
        let minutes = interval_minutes(&request.interval).ok_or_else(|| {
            FetchError::rejected(
                PROVIDER,
                format!("unsupported interval {}", request.interval),
            )
        })?;

        let mut records = self
            .get_ohlc(request.symbol.trim(), minutes, Some(ohlc_since(request.since)))
            .await?;

        request.clip(&mut records);
        Ok(records)
    }
}

/// Kraken's `since` (seconds, exclusive) for an inclusive millisecond cursor.
/// A bar opening exactly on the cursor's second is still returned.
fn ohlc_since(since_ms: i64) -> i64 {
    since_ms.div_euclid(1000) - 1
}
