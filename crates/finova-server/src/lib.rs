//! HTTP service for finova-rs
//!
//! Exposes the financial analysis agent behind `POST {api_prefix}/analyze`
//! plus the root, probe and health endpoints. Every response body is an
//! [`Envelope`].

pub mod envelope;
pub mod routes;
pub mod state;

pub use envelope::Envelope;
pub use state::AppState;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let prefix = state.api_prefix.trim_end_matches('/').to_string();
    let api: Router<AppState> = Router::new().route("/analyze", post(routes::analyze));

    let router: Router<AppState> = Router::new()
        .route("/", get(routes::root))
        .route("/probe", get(routes::probe))
        .route("/health", get(routes::health));
    // axum refuses to nest at the root
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&prefix, api)
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
