//! Paginated series fetcher
//!
//! Assembles an unbounded time series from an upstream that only serves
//! bounded pages. The loop requests a page starting at the cursor, appends
//! it, moves the cursor one source step past the last record and repeats
//! until the upstream runs dry or the requested end is reached.
//!
//! Every upstream implements [`CandleSource`]; the loop itself knows nothing
//! about transports.

use async_trait::async_trait;
use chrono::DateTime;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::common::{RetryPolicy, Throttle};
use crate::error::{Error, FetchError, FetchFailure};
use crate::types::{Interval, RawRecord};

/// Default records per request (Binance and most REST candle APIs cap at 1000)
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// One upstream response, in upstream order
pub type Page = Vec<RawRecord>;

/// Parameters of a single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub symbol: &'a str,
    pub interval: Interval,
    /// First timestamp wanted (ms, inclusive)
    pub since: i64,
    /// End of the range (ms, exclusive). `None` means up to now.
    pub until: Option<i64>,
    pub limit: usize,
}

impl PageRequest<'_> {
    /// Drop records before `since` and keep at most `limit`. For upstreams
    /// whose own start bound is coarser than a millisecond.
    pub fn clip(&self, page: &mut Page) {
        page.retain(|r| r.timestamp >= self.since);
        page.truncate(self.limit);
    }
}

/// Capability every upstream provides to the fetcher
#[async_trait]
pub trait CandleSource: Send {
    /// Provider identifier used in logs and errors
    fn name(&self) -> &str;

    /// Smallest addressable timestamp unit of this upstream, in ms.
    /// Sources with second-resolution timestamps return 1000.
    fn cursor_step_ms(&self) -> i64 {
        1
    }

    /// Hard cap on records per page imposed by the upstream
    fn max_page_limit(&self) -> usize {
        usize::MAX
    }

    /// Minimum delay between two requests to stay inside the upstream quota
    fn min_request_interval(&self) -> Duration {
        Duration::ZERO
    }

    async fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<Page, FetchError>;
}

/// Everything fetched for one request, in receipt order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub records: Vec<RawRecord>,
    /// Number of page requests that returned data
    pub requests: u32,
}

impl Series {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub symbol: String,
    pub interval: Interval,
    /// Range start (ms, inclusive)
    pub start: i64,
    /// Range end (ms, exclusive). `None` catches up to the latest available bar.
    pub end: Option<i64>,
    pub page_limit: usize,
}

impl SeriesRequest {
    pub fn new(symbol: impl Into<String>, interval: Interval, start: i64) -> Self {
        SeriesRequest {
            symbol: symbol.into(),
            interval,
            start,
            end: None,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn with_end(mut self, end: i64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.symbol.trim().is_empty() {
            return Err(Error::InvalidRequest("symbol must not be empty".to_string()));
        }
        if self.page_limit == 0 {
            return Err(Error::InvalidRequest("page limit must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Retry and throttle settings for a fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    pub retry: RetryPolicy,
    /// Overrides the source's declared minimum request interval
    pub min_request_interval: Option<Duration>,
}

/// Emitted after every page that returned data
#[derive(Debug, Clone)]
pub struct PageProgress<'a> {
    pub provider: &'a str,
    pub symbol: &'a str,
    pub page: u32,
    pub page_len: usize,
    pub total_records: usize,
    pub last_timestamp: i64,
}

/// Emitted before sleeping for a retry
#[derive(Debug, Clone)]
pub struct RetryNotice<'a> {
    pub provider: &'a str,
    pub symbol: &'a str,
    pub cursor: i64,
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub error: &'a FetchError,
}

/// Progress callbacks; both methods default to doing nothing
pub trait FetchObserver {
    fn page_fetched(&mut self, _progress: &PageProgress<'_>) {}

    fn retrying(&mut self, _notice: &RetryNotice<'_>) {}
}

impl FetchObserver for () {}

/// Fetch the full series described by `request`.
///
/// Bounded requests (`end` set) stop once the cursor passes the end, the
/// upstream returns a short page, or the next bar would open at or after the
/// end. Unbounded requests stop on the first short page. Both stop on an
/// empty page.
///
/// In bounded mode each page is clipped to `[cursor, end)` before it is
/// appended, whatever the upstream did with `since`.
///
/// Transient failures are retried at the same cursor according to
/// `options.retry`. A rejection, or a transient failure that outlives its
/// retries, aborts with the records fetched so far in
/// [`FetchFailure::partial`].
pub async fn fetch_series<S, O>(
    source: &mut S,
    request: &SeriesRequest,
    options: &FetchOptions,
    observer: &mut O,
) -> Result<Series, FetchFailure>
where
    S: CandleSource + ?Sized,
    O: FetchObserver + ?Sized,
{
    let provider = source.name().to_string();
    let step = source.cursor_step_ms().max(1);
    let limit = request.page_limit.clamp(1, source.max_page_limit().max(1));
    let mut throttle = Throttle::new(
        options
            .min_request_interval
            .unwrap_or_else(|| source.min_request_interval()),
    );

    info!(
        "Fetching {} {} from {} (start={}, end={}, page limit={}, throttle={}ms)",
        request.symbol,
        request.interval,
        provider,
        format_timestamp(request.start),
        request
            .end
            .map(format_timestamp)
            .unwrap_or_else(|| "now".to_string()),
        limit,
        throttle.min_interval().as_millis()
    );

    let mut series = Series::default();
    let mut cursor = request.start;

    loop {
        if let Some(end) = request.end {
            if cursor >= end {
                debug!("Cursor {} reached end {}", cursor, end);
                break;
            }
        }

        let page_request = PageRequest {
            symbol: &request.symbol,
            interval: request.interval,
            since: cursor,
            until: request.end,
            limit,
        };

        let mut page = match fetch_with_retry(
            source,
            &page_request,
            &options.retry,
            &mut throttle,
            observer,
        )
        .await
        {
            Ok(page) => page,
            Err(error) => {
                warn!(
                    "Aborting {} {} after {} records: {}",
                    request.symbol,
                    request.interval,
                    series.len(),
                    error
                );
                return Err(FetchFailure {
                    partial: series,
                    error,
                });
            }
        };

        let received = page.len();
        if received == 0 {
            debug!("Empty page at cursor {}, no more data", cursor);
            break;
        }

        let mut reached_end = false;
        if let Some(end) = request.end {
            page.retain(|r| r.timestamp < end);
            reached_end = page.len() < received;

            let in_range = page.len();
            page.retain(|r| r.timestamp >= cursor);
            if page.len() < in_range {
                warn!(
                    "{} returned {} records before cursor {}; dropping them",
                    provider,
                    in_range - page.len(),
                    format_timestamp(cursor)
                );
            }
        }

        let Some(last_timestamp) = page.last().map(|r| r.timestamp) else {
            debug!("Page at cursor {} held nothing inside the range", cursor);
            break;
        };
        series.requests += 1;

        let advanced = last_timestamp.saturating_add(step);
        let forced = cursor.saturating_add(step);
        if advanced < forced {
            warn!(
                "{} returned a page ending at {} which does not pass cursor {}; forcing cursor forward",
                provider, last_timestamp, cursor
            );
        }
        cursor = advanced.max(forced);

        series.records.extend(page);

        debug!(
            "Page {}: {} records, fetched up to {}",
            series.requests,
            received,
            format_timestamp(last_timestamp)
        );
        observer.page_fetched(&PageProgress {
            provider: &provider,
            symbol: &request.symbol,
            page: series.requests,
            page_len: received,
            total_records: series.len(),
            last_timestamp,
        });

        let short_page = received < limit;
        let done = match request.end {
            Some(end) => {
                let next_bar_past_end = request
                    .interval
                    .duration_ms()
                    .is_some_and(|d| last_timestamp.saturating_add(d) >= end);
                reached_end || short_page || cursor >= end || next_bar_past_end
            }
            None => short_page,
        };
        if done {
            break;
        }
    }

    info!(
        "Fetched {} records for {} {} from {} in {} requests",
        series.len(),
        request.symbol,
        request.interval,
        provider,
        series.requests
    );

    Ok(series)
}

async fn fetch_with_retry<S, O>(
    source: &mut S,
    request: &PageRequest<'_>,
    policy: &RetryPolicy,
    throttle: &mut Throttle,
    observer: &mut O,
) -> Result<Page, FetchError>
where
    S: CandleSource + ?Sized,
    O: FetchObserver + ?Sized,
{
    let mut attempt = 0;

    loop {
        throttle.wait().await;

        match source.fetch_page(request).await {
            Ok(page) => return Ok(page),
            Err(error) if error.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    "Request failed (retry {}/{} in {}ms): {}",
                    attempt,
                    policy.max_retries,
                    delay.as_millis(),
                    error
                );
                observer.retrying(&RetryNotice {
                    provider: source.name(),
                    symbol: request.symbol,
                    cursor: request.since,
                    attempt,
                    max_retries: policy.max_retries,
                    delay,
                    error: &error,
                });
                sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM:SS` UTC
pub fn format_timestamp(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}
