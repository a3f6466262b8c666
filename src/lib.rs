//! Historical candle downloader
//!
//! Fetches OHLCV candles from Binance, a small registry of exchanges
//! (Binance, Kraken) addressed with unified symbols, and Yahoo Finance,
//! paginating through each upstream's page cap and rate limit, and writes the
//! result as CSV.
//!
//! The pipeline is fetch ([`fetcher`]) -> normalize ([`normalize`]) -> write
//! ([`sink`]); [`data::download`] runs all three for one symbol.

pub mod binance;
pub mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod exchange;
pub mod fetcher;
pub mod kraken;
pub mod normalize;
pub mod sink;
pub mod types;
pub mod yahoo;

pub use config::Config;
pub use data::{download, download_blocking, DataSource, Download, DownloadRequest};
pub use error::{Error, FetchError, FetchFailure, Result};
pub use fetcher::{fetch_series, CandleSource, FetchObserver, FetchOptions, Series, SeriesRequest};
pub use types::*;
