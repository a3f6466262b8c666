//! Kraken public market data (OHLC endpoint)

mod client;
mod types;

pub use client::{KrakenClient, KRAKEN_API_BASE, MAX_OHLC_PER_REQUEST, RATE_LIMIT_DELAY_MS};
pub use types::*;
