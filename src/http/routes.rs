use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Service banner
        .route("/", get(handlers::root))
        // Health check
        .route("/health", get(handlers::health_check))
        // Relay WebSocket endpoint
        .route("/api/custom-transcriber", get(handlers::transcriber_ws))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
