//! Yahoo Finance chart client (equities, FX, indices and crypto)
//!
//! The chart endpoint serves a whole date range in one response; there is no
//! page cap, so pages are cut down to the requested limit here.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::types::{interval_code, parse_chart, ChartResponse};
use crate::common::http::get_json;
use crate::config::YahooConfig;
use crate::error::{Error, FetchError};
use crate::fetcher::{CandleSource, Page, PageRequest};
use crate::types::RawRecord;

pub const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";

pub const RATE_LIMIT_DELAY_MS: u64 = 250;

/// Yahoo answers requests without a browser User-Agent with 429s
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const PROVIDER: &str = "yahoo";

#[derive(Debug, Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    min_request_interval: Duration,
    auto_adjust: bool,
}

impl YahooClient {
    pub fn new() -> Result<Self, Error> {
        Self::with_config(&YahooConfig::default())
    }

    pub fn with_config(config: &YahooConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.http.timeout())
            .build()?;

        Ok(YahooClient {
            client,
            base_url: config.http.base_url_or(YAHOO_API_BASE),
            min_request_interval: config
                .http
                .min_request_interval()
                .unwrap_or(Duration::from_millis(RATE_LIMIT_DELAY_MS)),
            auto_adjust: config.auto_adjust,
        })
    }

    /// Fetch bars for `ticker` between `period1` and `period2` (seconds)
    pub async fn get_chart(
        &self,
        ticker: &str,
        interval: &str,
        period1: i64,
        period2: i64,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);

        let params = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", interval.to_string()),
            ("events", "div,split".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];

        debug!(
            "Fetching chart: ticker={}, interval={}, period1={}, period2={}",
            ticker, interval, period1, period2
        );

        let response: ChartResponse =
            get_json(self.client.get(&url).query(&params), PROVIDER).await?;

        parse_chart(response, self.auto_adjust, PROVIDER)
    }
}

#[async_trait]
impl CandleSource for YahooClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn cursor_step_ms(&self) -> i64 {
        1000
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

        let (period1, period2) = chart_periods(request, Utc::now().timestamp());

        let mut records = self
            .get_chart(request.symbol.trim(), interval, period1, period2)
            .await?;

        request.clip(&mut records);
        Ok(records)
    }
}

/// `period1`/`period2` in seconds for a page. `period1` rounds down and
/// `period2` rounds up so no bar inside `[since, until)` falls outside the
/// window; `now` stands in for a missing `until`.
fn chart_periods(request: &PageRequest<'_>, now: i64) -> (i64, i64) {
    let period1 = request.since.div_euclid(1000);
    let period2 = match request.until {
        Some(until) => until.div_euclid(1000) + i64::from(until.rem_euclid(1000) != 0),
        None => now,
    };
    (period1, period2)
}
