//! Outbound HTTP fetch against upstream media origins.
//!
//! One attempt per invocation, no retry loop: the media player owns retry
//! policy and will re-request failed segments per its own buffering rules.
//! A non-success upstream status is surfaced as [`RelayError::Upstream`] so
//! handlers can forward it verbatim.

use crate::error::{RelayError, Result};
use axum::http::StatusCode;
use reqwest::{Client, Response};
use tracing::warn;

/// User-Agent sent on every upstream request (set on the shared client).
pub const USER_AGENT: &str = concat!("hls-relay/", env!("CARGO_PKG_VERSION"));

/// Fetch a URL via HTTP GET and require a 2xx status.
pub async fn fetch_upstream(client: &Client, url: &str) -> Result<Response> {
    let response = client.get(url).send().await.map_err(|e| {
        warn!("upstream fetch failed for {url}: {e}");
        RelayError::from(e)
    })?;

    let status = response.status();
    if !status.is_success() {
        warn!("upstream returned {status} for {url}");
        return Err(RelayError::Upstream {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            url: url.to_string(),
        });
    }

    Ok(response)
}
