//! API route modules.
//!
//! Organizes routes by resource type.

pub mod health;
pub mod video_qc;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/video-qc", video_qc::router(state.clone()))
        .nest("/health", health::router())
        .with_state(state)
}
