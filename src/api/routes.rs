use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{request_id_middleware, request_span};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Taste profile
        .route("/profile", get(handlers::get_profile))
        // Discovery
        .route("/recommendations", post(handlers::recommend))
        .route("/discovery/chains", post(handlers::explore_chains))
        .route("/discovery/genres", post(handlers::explore_genres))
        .route("/discovery/countries", post(handlers::explore_countries))
        // Cleanup
        .route("/cleanup/inactive", get(handlers::inactive_artists))
        // Analytics & backup
        .route("/analytics/report", get(handlers::analytics_report))
        .route("/backup", post(handlers::create_backup))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
