use crate::server::state::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

/// Liveness probe with build version
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus exposition text for scraping
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
