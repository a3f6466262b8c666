//! Error taxonomy for fetching, normalizing and writing candle data

use std::path::PathBuf;
use thiserror::Error;

use crate::fetcher::Series;

/// Failure of a single page request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network-level failure or upstream throttling; the same request may succeed later
    #[error("transient network error from {provider}: {message}")]
    TransientNetwork { provider: String, message: String },

    /// The upstream refused the request (unknown symbol, bad interval, malformed reply)
    #[error("{provider} rejected the request: {reason}")]
    UpstreamRejection { provider: String, reason: String },
}

impl FetchError {
    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        FetchError::TransientNetwork {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn rejected(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        FetchError::UpstreamRejection {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::TransientNetwork { .. })
    }
}

/// An aborted fetch, carrying whatever was accumulated before the failure
#[derive(Debug, Error)]
#[error("fetch aborted after {} records: {}", .partial.records.len(), .error)]
pub struct FetchFailure {
    pub partial: Series,
    #[source]
    pub error: FetchError,
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    #[error("malformed record at index {index}: {field} = {value}")]
    MalformedRecord {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("no data found for {symbol} ({interval}) in the requested range")]
    EmptyResult { symbol: String, interval: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
