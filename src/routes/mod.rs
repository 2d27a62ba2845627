use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    db::BookStore,
    services::{recommendations::Recommender, scanner::Scanner},
};

pub mod recommend;
pub mod scan;

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookStore>,
    pub scanner: Arc<Scanner>,
    pub recommender: Arc<Recommender>,
    pub max_scan_candidates: usize,
    pub max_upload_bytes: usize,
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes(state))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// API routes under /api/v1
fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/scan", post(scan::scan_shelf))
        .route("/recommendations", post(recommend::generate))
        .route("/recommendations/:session_id", get(recommend::list))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
