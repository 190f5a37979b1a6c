use crate::{
    error::{RelayError, Result},
    fetch::fetch_upstream,
    hls::rewrite::resolve_reference,
    metrics,
    server::{state::AppState, url_validation::validate_upstream_url},
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::time::Instant;
use tracing::info;

/// Content type assumed when the upstream response omits one.
const DEFAULT_CONTENT_TYPE: &str = "video/MP2T";

#[derive(Debug, Deserialize)]
pub struct SegmentQuery {
    base: Option<String>,
    file: Option<String>,
}

/// Resolve and proxy an opaque media payload (segment, key, init map).
///
/// `GET /proxy-segment?base=<encoded base>&file=<encoded reference>`
///
/// The response body is never reinterpreted as a playlist; bytes go back to
/// the player verbatim, fully buffered.
pub async fn proxy_segment(
    Query(params): Query<SegmentQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();

    let base = params
        .base
        .as_deref()
        .ok_or_else(|| RelayError::InvalidInput("missing base parameter".to_string()))?;
    let file = params
        .file
        .as_deref()
        .ok_or_else(|| RelayError::InvalidInput("missing file parameter".to_string()))?;

    // Absolute references are used verbatim, relative ones resolve against
    // the base the rewriter embedded.
    let target = resolve_reference(base, file).ok_or_else(|| {
        RelayError::InvalidInput(format!("cannot resolve '{file}' against '{base}'"))
    })?;

    // Resolved target is attacker-influenced, check against SSRF vectors.
    validate_upstream_url(target.as_str(), state.config.is_dev)?;

    info!("proxying segment from {target}");

    let response = fetch_upstream(&state.http_client, target.as_str())
        .await
        .inspect_err(|_| metrics::record_upstream_error())?;

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let bytes = response.bytes().await?;
    let content_length = bytes.len().to_string();

    metrics::record_request("segment", 200);
    metrics::record_duration("segment", start);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.as_str()),
            (header::CONTENT_LENGTH, content_length.as_str()),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from(bytes.to_vec()),
    )
        .into_response())
}
