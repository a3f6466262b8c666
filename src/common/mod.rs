//! Common utilities shared across the upstream clients
//!
//! - Retry policy with bounded attempts and exponential backoff
//! - Request throttle enforcing a minimum interval between requests
//! - HTTP response classification into transient and permanent failures

pub mod http;
pub mod retry;
pub mod throttle;

pub use retry::RetryPolicy;
pub use throttle::Throttle;
