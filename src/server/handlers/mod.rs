pub mod health;
pub mod manifest;
pub mod segment;

use axum::http::StatusCode;

/// Shared `OPTIONS` handler for both proxy endpoints.
///
/// The CORS layer attaches the permissive headers; this only supplies the
/// empty 200 so non-preflight `OPTIONS` probes don't 405.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
