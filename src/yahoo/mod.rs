//! Yahoo Finance chart API
//! No API key needed; requests carry a browser User-Agent.

mod client;
mod types;

pub use client::{YahooClient, RATE_LIMIT_DELAY_MS, YAHOO_API_BASE};
pub use types::*;
