//! Route definitions.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{deployments, health, hooks, status};
use crate::middleware::request_id;
use crate::state::AppState;

/// Create the hook server router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(hooks::push))
        .route("/hooks/push", post(hooks::push))
        .route("/health", get(health::health))
        .route("/status", get(status::status))
        .route(
            "/deployments/{name}",
            post(deployments::deploy).get(deployments::status),
        )
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
