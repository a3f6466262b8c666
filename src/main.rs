//! candle-fetch - main entry point
//!
//! Subcommands:
//! - download: Download historical candles for one symbol into a CSV file
//! - providers: List the supported providers

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "candle-fetch")]
#[command(about = "Download historical OHLCV candles from Binance, Kraken and Yahoo Finance", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download historical candles into <output>/<provider>_<symbol>_<interval>.csv
    Download {
        /// Provider id: binance, exchange:binance, exchange:kraken (or kraken), yahoo
        #[arg(short, long, default_value = "binance")]
        provider: String,

        /// Symbol. E.g., "BTCUSDT", "BTC/USDT", "AAPL", "BTC-USD"
        #[arg(short, long)]
        symbol: String,

        /// Timeframe interval. E.g., "1m", "1h", "4h", "1d"
        #[arg(short, long, default_value = "1d")]
        interval: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD, exclusive). Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Records per request (capped by the provider)
        #[arg(long)]
        page_limit: Option<usize>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List supported providers with their page caps and throttles
    Providers,
}

/// Default filter when `RUST_LOG` is unset; HTTP internals stay at `warn`
fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    )
}

/// Console plus `logs/<command>_<timestamp>.log`
fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::never("logs", &log_filename))
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Download { .. } => "download",
        Commands::Providers => "providers",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Download {
            provider,
            symbol,
            interval,
            start,
            end,
            page_limit,
            output,
            config,
        } => commands::download::run(commands::download::Args {
            provider,
            symbol,
            interval,
            start,
            end,
            page_limit,
            output,
            config,
        }),

        Commands::Providers => commands::providers::run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_download() {
        let cli = Cli::try_parse_from([
            "candle-fetch",
            "download",
            "--provider",
            "exchange:kraken",
            "--symbol",
            "ETH/USD",
            "--interval",
            "1d",
            "--start",
            "2023-01-01",
            "--page-limit",
            "500",
        ])
        .unwrap();

        match cli.command {
            Commands::Download {
                provider,
                symbol,
                page_limit,
                end,
                ..
            } => {
                assert_eq!(provider, "exchange:kraken");
                assert_eq!(symbol, "ETH/USD");
                assert_eq!(page_limit, Some(500));
                assert_eq!(end, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_download_requires_symbol() {
        assert!(Cli::try_parse_from(["candle-fetch", "download", "--start", "2023-01-01"]).is_err());
    }

    #[test]
    fn test_default_filter() {
        assert!(default_filter(true).starts_with("debug,"));
        assert!(default_filter(false).contains("reqwest=warn"));
    }
}
