//! API layer - HTTP handlers and routing
//!
//! This module contains the HTTP surface of the post service:
//! - Post form and view endpoints
//! - Acting-user resolution
//! - Static file serving from the public directory

pub mod middleware;
pub mod posts;

use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Room for the non-file form fields on top of the upload limit
pub const BODY_LIMIT_HEADROOM: usize = 256 * 1024;

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.upload_config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_HEADROOM);
    let public_dir = state.server_config.public_dir.clone();

    Router::new()
        .merge(posts::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_user,
        ))
        // Placeholder image and other assets, no acting user needed
        .fallback_service(ServeDir::new(public_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================
