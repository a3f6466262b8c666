//! Unified exchange layer
//!
//! A closed registry of supported exchanges addressed by id, with markets
//! written as unified `BASE/QUOTE` symbols. Each entry knows its declared
//! rate limit and how to map a unified symbol onto its native pair.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::binance::BinanceClient;
use crate::config::Config;
use crate::error::{Error, FetchError};
use crate::fetcher::{CandleSource, Page, PageRequest};
use crate::kraken::KrakenClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeId {
    Binance,
    Kraken,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 2] = [ExchangeId::Binance, ExchangeId::Kraken];

    pub fn id(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Kraken => "kraken",
        }
    }

    /// Declared minimum delay between requests
    pub fn rate_limit(&self) -> Duration {
        match self {
            ExchangeId::Binance => Duration::from_millis(50),
            ExchangeId::Kraken => Duration::from_millis(3000),
        }
    }

    /// Native pair for a unified symbol (`BTC/USD` -> `XBTUSD` on Kraken).
    /// Symbols without a slash are taken to be native already.
    pub fn market_id(&self, symbol: &str) -> String {
        let symbol = symbol.trim().to_uppercase();
        let Some((base, quote)) = symbol.split_once('/') else {
            return symbol;
        };

        match self {
            ExchangeId::Binance => format!("{}{}", base, quote),
            ExchangeId::Kraken => format!("{}{}", kraken_asset(base), kraken_asset(quote)),
        }
    }
}

fn kraken_asset(code: &str) -> &str {
    match code {
        "BTC" => "XBT",
        "DOGE" => "XDG",
        other => other,
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExchangeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(ExchangeId::Binance),
            "kraken" => Ok(ExchangeId::Kraken),
            other => Err(format!(
                "Unknown exchange: '{}'. Supported: binance, kraken",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
enum Venue {
    Binance(BinanceClient),
    Kraken(KrakenClient),
}

/// Candle source for a registry exchange, taking unified symbols
#[derive(Debug, Clone)]
pub struct UnifiedExchange {
    id: ExchangeId,
    venue: Venue,
    min_request_interval: Duration,
}

impl UnifiedExchange {
    pub fn connect(id: ExchangeId, config: &Config) -> Result<Self, Error> {
        let (venue, provider) = match id {
            ExchangeId::Binance => (
                Venue::Binance(BinanceClient::with_config(&config.providers.binance)?),
                &config.providers.binance,
            ),
            ExchangeId::Kraken => (
                Venue::Kraken(KrakenClient::with_config(&config.providers.kraken)?),
                &config.providers.kraken,
            ),
        };

        Ok(UnifiedExchange {
            id,
            venue,
            min_request_interval: provider
                .min_request_interval()
                .unwrap_or_else(|| id.rate_limit()),
        })
    }

    fn inner(&self) -> &dyn CandleSource {
        match &self.venue {
            Venue::Binance(client) => client,
            Venue::Kraken(client) => client,
        }
    }
}

#[async_trait]
impl CandleSource for UnifiedExchange {
    fn name(&self) -> &str {
        self.id.id()
    }

    fn cursor_step_ms(&self) -> i64 {
        self.inner().cursor_step_ms()
    }

    fn max_page_limit(&self) -> usize {
        self.inner().max_page_limit()
    }

    fn min_request_interval(&self) -> Duration {
        self.min_request_interval
    }

    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<Page, FetchError> {
        let market = self.id.market_id(request.symbol);
        let native = PageRequest {
            symbol: &market,
            interval: request.interval,
            since: request.since,
            until: request.until,
            limit: request.limit,
        };

        match &mut self.venue {
            Venue::Binance(client) => client.fetch_page(&native).await,
            Venue::Kraken(client) => client.fetch_page(&native).await,
        }
    }
}
