use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Largest accepted upload body
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let recordings = ServeDir::new(state.store.root());

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Chunk uploads from recorders
        .route("/upload", post(handlers::upload_recording))
        // Stored recordings
        .nest_service("/recordings", recordings)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        // Recorder pages may live on another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
