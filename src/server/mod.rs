pub mod handlers;
pub mod state;
pub mod url_validation;

use crate::config::Config;
use axum::{
    Router,
    http::{Method, header},
    routing::get,
};
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Build the router with all routes and the permissive CORS layer.
///
/// Media players fetch the rewritten playlist and its segments cross-origin,
/// so both proxy endpoints allow any origin with `GET` and a `Content-Type`
/// request header; `OPTIONS` answers 200 with no body.
pub fn build_router(config: Config) -> Router {
    let state = AppState::new(config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        .route(
            "/proxy-manifest",
            get(handlers::manifest::proxy_manifest).options(handlers::preflight),
        )
        .route(
            "/proxy-segment",
            get(handlers::segment::proxy_segment).options(handlers::preflight),
        )
        .layer(cors)
        .with_state(state)
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let app = build_router(config);

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("🚀 Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
