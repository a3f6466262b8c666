//! HTTP helpers shared by the upstream clients
//!
//! Every client funnels its requests through [`get_json`], which decides
//! whether a failure is worth retrying.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::FetchError;

/// Longest body excerpt carried in an error message
const MAX_ERROR_BODY: usize = 200;

/// Send a GET request and decode the JSON body
pub async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    provider: &str,
) -> Result<T, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport_error(provider, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FetchError::transient(provider, format!("failed to read response: {}", e)))?;

    if !status.is_success() {
        debug!("{} responded {}: {}", provider, status, excerpt(&body));
        return Err(classify_status(provider, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        FetchError::rejected(
            provider,
            format!("malformed response ({}): {}", e, excerpt(&body)),
        )
    })
}

/// Map a reqwest transport error onto the fetch taxonomy
pub fn classify_transport_error(provider: &str, err: reqwest::Error) -> FetchError {
    if err.is_builder() || err.is_decode() {
        FetchError::rejected(provider, err.to_string())
    } else {
        FetchError::transient(provider, err.to_string())
    }
}

/// Throttling (429, Binance's 418 ban) and server errors are transient;
/// every other non-success status is a rejection.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> FetchError {
    let message = format!("HTTP {}: {}", status, error_summary(body));
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::IM_A_TEAPOT
        || status.is_server_error()
    {
        FetchError::transient(provider, message)
    } else {
        FetchError::rejected(provider, message)
    }
}

/// Pull a human-readable message out of an error body
///
/// Understands Binance (`{"code":..,"msg":..}`), Kraken (`{"error":[..]}`)
/// and Yahoo (`{"chart":{"error":{"description":..}}}`) bodies and falls back
/// to a raw excerpt.
pub fn error_summary(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return excerpt(body).to_string();
    };

    if let Some(msg) = json.get("msg").and_then(|v| v.as_str()) {
        return msg.to_string();
    }
    if let Some(errors) = json.get("error").and_then(|v| v.as_array()) {
        let joined: Vec<&str> = errors.iter().filter_map(|e| e.as_str()).collect();
        if !joined.is_empty() {
            return joined.join("; ");
        }
    }
    if let Some(desc) = json
        .pointer("/chart/error/description")
        .and_then(|v| v.as_str())
    {
        return desc.to_string();
    }
    excerpt(body).to_string()
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
