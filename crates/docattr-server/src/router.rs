use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with every docattr endpoint.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handler::health_handler))
        .route("/attribute/:docid", post(handler::attribute_handler))
        .route("/attributions/:docid", get(handler::attributions_handler))
        .route("/version/:docid", post(handler::version_handler))
        .route("/version-deltas/:docid", get(handler::version_deltas_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
