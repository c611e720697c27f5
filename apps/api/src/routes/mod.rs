pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::documents::MAX_PDF_BYTES;
use crate::errors::AppError;
use crate::state::AppState;

/// Headroom over the PDF ceiling for the other form fields and multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_PDF_BYTES + 1024 * 1024;

async fn not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/analyze/upload",
            post(handlers::handle_analyze_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/history", get(handlers::handle_history))
        .fallback(not_found)
        .with_state(state)
}
