//! HTTP API module - image upload/retrieval and health

mod error;
mod images;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::images::ImageStore;
pub use error::ApiError;
pub use images::{RetrievalQuery, UploadResponse};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ImageStore>,
}

impl AppState {
    /// Build state over the configured storage root
    pub fn new(config: Arc<Config>) -> Self {
        let store = Arc::new(ImageStore::new(config.image_root()));
        Self { config, store }
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route(
            "/",
            get(images::retrieve)
                .post(images::upload)
                .fallback(method_not_found),
        )
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Unsupported methods on `/` get an empty 404
async fn method_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.store.is_available().await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                storage: "ok",
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                storage: "error",
            }),
        )
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    storage: &'static str,
}
