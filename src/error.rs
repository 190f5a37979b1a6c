use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Error surface of the proxy.
///
/// Every variant maps to exactly one HTTP outcome in [`IntoResponse`]:
/// bad client input is a 400, an unsuccessful upstream fetch forwards the
/// upstream's own status, everything else is a 500 with a generic body.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("upstream returned {status} for {url}")]
    Upstream { status: StatusCode, url: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        let url = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        match e.status() {
            Some(status) => RelayError::Upstream {
                status: StatusCode::from_u16(status.as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                url,
            },
            None => RelayError::Internal(format!("fetch failed for {url}: {e}")),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        error!("request failed: {self}");

        let (status, message) = match &self {
            RelayError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RelayError::Upstream { status, url } => {
                (*status, format!("upstream returned {status} for {url}"))
            }
            RelayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
