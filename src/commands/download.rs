//! Download command implementation

use anyhow::{Context, Result};
use candle_fetch::data::parse_date;
use candle_fetch::fetcher::{format_timestamp, PageProgress, RetryNotice};
use candle_fetch::sink::load_csv;
use candle_fetch::{download_blocking, Config, DataSource, DownloadRequest, FetchObserver, Interval};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub provider: String,
    pub symbol: String,
    pub interval: String,
    pub start: String,
    pub end: Option<String>,
    pub page_limit: Option<usize>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Spinner showing how far the fetch has got
struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Spinner { pb }
    }
}

impl FetchObserver for Spinner {
    fn page_fetched(&mut self, progress: &PageProgress<'_>) {
        self.pb.set_message(format!(
            "{} {}: {} records, fetched up to {}",
            progress.provider,
            progress.symbol,
            progress.total_records,
            format_timestamp(progress.last_timestamp)
        ));
    }

    fn retrying(&mut self, notice: &RetryNotice<'_>) {
        self.pb.set_message(format!(
            "{} {}: retry {}/{} in {}ms ({})",
            notice.provider,
            notice.symbol,
            notice.attempt,
            notice.max_retries,
            notice.delay.as_millis(),
            notice.error
        ));
    }
}

pub fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = args.output {
        info!("Overriding output directory to: {}", dir.display());
        config.data_dir = dir;
    }

    let source: DataSource = args.provider.parse().map_err(anyhow::Error::msg)?;
    let interval: Interval = args.interval.parse().map_err(anyhow::Error::msg)?;
    let start = parse_date(&args.start)?;

    let mut request = DownloadRequest::new(source, args.symbol.as_str(), interval, start);
    if let Some(end) = args.end.as_deref() {
        request = request.with_end(parse_date(end)?);
    }
    if let Some(limit) = args.page_limit {
        request = request.with_page_limit(limit);
    }

    info!(
        "Downloading {} {} from {} starting {}",
        request.symbol,
        interval,
        source,
        start.format("%Y-%m-%d")
    );

    let mut spinner = Spinner::new();
    let result = download_blocking(&request, &config, &mut spinner);
    spinner.pb.finish_and_clear();

    let download = result.with_context(|| {
        format!(
            "Failed to download {} {} from {}",
            request.symbol, interval, source
        )
    })?;

    let saved = load_csv(&download.path)
        .with_context(|| format!("Failed to read back {}", download.path.display()))?;

    println!("\n{}", "=".repeat(60));
    println!("DOWNLOAD COMPLETE");
    println!("{}", "=".repeat(60));
    println!("Provider:  {}", source);
    println!("Symbol:    {}", request.symbol);
    println!("Interval:  {}", interval);
    println!("Requests:  {}", download.requests);
    println!("Rows:      {}", saved.len());
    if let (Some(first), Some(last)) = (saved.first(), saved.last()) {
        println!(
            "Range:     {} -> {}",
            first.datetime.format("%Y-%m-%d %H:%M:%S"),
            last.datetime.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("File:      {}", download.path.display());
    println!("{}", "=".repeat(60));

    Ok(())
}
