//! Request throttle enforcing a minimum interval between consecutive requests
//!
//! Upstreams publish their quota either as a fixed delay (Binance weight
//! limits) or as a declared rate limit (exchange `rateLimit`). Both reduce to
//! "no two requests closer than `min_interval`".

use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Minimum-interval throttle
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use candle_fetch::common::Throttle;
///
/// #[tokio::main]
/// async fn main() {
///     let mut throttle = Throttle::new(Duration::from_millis(10));
///
///     // First request goes out immediately
///     throttle.wait().await;
///     // Second request waits until 10ms have passed
///     throttle.wait().await;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time left before the next request may be sent
    pub fn remaining(&self) -> Duration {
        match self.last_request {
            Some(last) => self.min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Wait until a request may be sent, then mark it as sent
    pub async fn wait(&mut self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            tracing::trace!("Throttling for {}ms", remaining.as_millis());
            sleep(remaining).await;
        }
        self.last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_not_delayed() {
        let mut throttle = Throttle::new(Duration::from_secs(60));
        assert_eq!(throttle.remaining(), Duration::ZERO);

        let started = Instant::now();
        throttle.wait().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_second_request_waits_for_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(50));
        throttle.wait().await;
        assert!(throttle.remaining() > Duration::ZERO);

        let started = Instant::now();
        throttle.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_no_wait_after_interval_elapsed() {
        let mut throttle = Throttle::new(Duration::from_millis(20));
        throttle.wait().await;

        sleep(Duration::from_millis(30)).await;
        assert_eq!(throttle.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let mut throttle = Throttle::new(Duration::ZERO);
        throttle.wait().await;
        assert_eq!(throttle.min_interval(), Duration::ZERO);
        assert_eq!(throttle.remaining(), Duration::ZERO);
    }
}
