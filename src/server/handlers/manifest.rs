use crate::{
    error::{RelayError, Result},
    fetch::fetch_upstream,
    hls::rewrite::{RewriteContext, rewrite_manifest},
    metrics,
    server::{state::AppState, url_validation::validate_upstream_url},
};
use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ManifestQuery {
    url: Option<String>,
}

/// Fetch an upstream HLS playlist and rewrite every embedded URI into a
/// same-origin proxy URL.
///
/// `GET /proxy-manifest?url=<upstream manifest URL>`
pub async fn proxy_manifest(
    Query(params): Query<ManifestQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();

    let url = params
        .url
        .as_deref()
        .ok_or_else(|| RelayError::InvalidInput("missing url parameter".to_string()))?;

    if !url.contains(".m3u8") {
        return Err(RelayError::InvalidInput(format!(
            "url does not reference an HLS manifest: {url}"
        )));
    }

    // User-supplied upstream URL, check against SSRF attack vectors.
    validate_upstream_url(url, state.config.is_dev)?;

    info!("proxying manifest from {url}");

    let response = fetch_upstream(&state.http_client, url)
        .await
        .inspect_err(|_| metrics::record_upstream_error())?;
    let content = response.text().await?;

    let ctx = RewriteContext {
        manifest_url: url,
        public_base: &state.config.base_url,
    };
    let rewritten = rewrite_manifest(&content, &ctx);

    metrics::record_request("manifest", 200);
    metrics::record_duration("manifest", start);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/vnd.apple.mpegurl"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        rewritten,
    )
        .into_response())
}
