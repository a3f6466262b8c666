//! Configuration management
//!
//! Settings come from an optional JSON file; every field has a default so an
//! empty object (or no file at all) is a valid configuration. The data
//! directory can be overridden with `CANDLE_FETCH_DATA_DIR`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::RetryPolicy;
use crate::error::Error;
use crate::fetcher::{FetchOptions, DEFAULT_PAGE_LIMIT};

/// Environment variable overriding [`Config::data_dir`]
pub const DATA_DIR_ENV: &str = "CANDLE_FETCH_DATA_DIR";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory CSV files are written to
    pub data_dir: PathBuf,
    /// Records requested per page
    pub page_limit: usize,
    /// Retry schedule for transient failures
    pub retry: RetryPolicy,
    pub providers: ProvidersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            page_limit: DEFAULT_PAGE_LIMIT,
            retry: RetryPolicy::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Load from `path` if given (defaults otherwise), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        Ok(config)
    }

    /// Fetch options for a provider, combining the retry policy with its throttle override
    pub fn fetch_options(&self, provider: &ProviderConfig) -> FetchOptions {
        FetchOptions {
            retry: self.retry.clone(),
            min_request_interval: provider.min_request_interval(),
        }
    }
}

/// Per-provider settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub binance: ProviderConfig,
    pub kraken: ProviderConfig,
    pub yahoo: YahooConfig,
}

/// HTTP settings for one upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Overrides the provider's public API host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Overrides the provider's declared minimum request interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_request_interval_ms: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: None,
            timeout_secs: 30,
            min_request_interval_ms: None,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_request_interval(&self) -> Option<Duration> {
        self.min_request_interval_ms.map(Duration::from_millis)
    }

    /// Configured base URL or the given default, without a trailing slash
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

/// Yahoo settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    #[serde(flatten)]
    pub http: ProviderConfig,
    /// Scale OHLC by the adjusted close (dividends and splits)
    pub auto_adjust: bool,
}

impl Default for YahooConfig {
    fn default() -> Self {
        YahooConfig {
            http: ProviderConfig::default(),
            auto_adjust: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.page_limit, 1000);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.providers.yahoo.auto_adjust);
        assert_eq!(config.providers.binance.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_empty_object_is_valid() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_provider_config() {
        let json = r#"{
            "page_limit": 500,
            "retry": { "max_retries": 5, "initial_backoff_ms": 5000, "backoff_multiplier": 1.0 },
            "providers": {
                "kraken": { "min_request_interval_ms": 1500 },
                "yahoo": { "auto_adjust": false, "timeout_secs": 10 }
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.page_limit, 500);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.delay_for(3), Duration::from_secs(5));
        assert_eq!(
            config.providers.kraken.min_request_interval(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(config.providers.kraken.timeout_secs, 30);
        assert!(!config.providers.yahoo.auto_adjust);
        assert_eq!(config.providers.yahoo.http.timeout_secs, 10);
    }

    #[test]
    fn test_fetch_options_carry_throttle_override() {
        let mut config = Config::default();
        config.providers.binance.min_request_interval_ms = Some(250);

        let options = config.fetch_options(&config.providers.binance);

        assert_eq!(options.min_request_interval, Some(Duration::from_millis(250)));
        assert_eq!(options.retry, config.retry);
    }

    #[test]
    fn test_base_url_override() {
        let provider = ProviderConfig {
            base_url: Some("http://localhost:8080/".to_string()),
            ..ProviderConfig::default()
        };
        assert_eq!(provider.base_url_or("https://api.binance.com"), "http://localhost:8080");
        assert_eq!(
            ProviderConfig::default().base_url_or("https://api.binance.com"),
            "https://api.binance.com"
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_file("does/not/exist.json").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
