//! Binance REST client for historical klines (candlesticks)
//! No API key needed for public market data endpoints.

mod client;
mod types;

pub use client::{BinanceClient, BINANCE_API_BASE, MAX_KLINES_PER_REQUEST, RATE_LIMIT_DELAY_MS};
pub use types::*;
