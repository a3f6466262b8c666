//! Bounded retry policy with exponential backoff
//!
//! The policy only describes the schedule; the fetcher decides which failures
//! are retried (transient ones) and sleeps for [`RetryPolicy::delay_for`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry schedule for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry (ms)
    pub initial_backoff_ms: u64,
    /// Growth factor applied for each further retry (1.0 = fixed delay)
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay (ms)
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Same delay before every retry
    pub fn fixed(max_retries: u32, backoff: Duration) -> Self {
        let ms = backoff.as_millis() as u64;
        Self {
            max_retries,
            initial_backoff_ms: ms,
            backoff_multiplier: 1.0,
            max_backoff_ms: ms,
        }
    }

    /// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, 8s... capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let ms = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_fixed_policy() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(5));
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
    }

    #[test]
    fn test_custom_multiplier() {
        let policy = RetryPolicy {
            max_retries: 2,
            initial_backoff_ms: 250,
            backoff_multiplier: 3.0,
            max_backoff_ms: 30_000,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(750));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries": 7}"#).unwrap();
        assert_eq!(policy.max_retries, 7);
        assert_eq!(policy.initial_backoff_ms, 1_000);
    }
}
