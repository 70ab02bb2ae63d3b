//! Claim API - HTTP interface to claim verification search
//!
//! Provides REST endpoints for:
//! - Claim search with stance labels
//! - Passage lookup
//! - Health and corpus metadata

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    // The front-end is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Claim search
        .route("/search", post(handlers::search))
        // Passage lookup
        .route("/passages/:id", get(handlers::get_passage))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
