use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{Candidate, Recommendation},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub session_id: Uuid,
    #[serde(default)]
    pub scan_id: Option<String>,
    /// Candidates from a previous shelf scan; may be empty
    #[serde(default)]
    pub recognized_books: Vec<Candidate>,
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
}

fn default_max_recommendations() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    20
}

/// Handler for recommendation generation
pub async fn generate(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<Vec<Recommendation>>> {
    if !state.store.is_session_valid(request.session_id).await? {
        return Err(AppError::NotFound("Session not found or expired".to_string()));
    }

    let preferences = state
        .store
        .get_preferences(request.session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Preferences not set for session".to_string()))?;

    tracing::info!(
        request_id = %request_id,
        session_id = %request.session_id,
        shelf_books = request.recognized_books.len(),
        requested = request.max_recommendations,
        "Processing recommendation request"
    );

    let recommendations = state
        .recommender
        .recommend(
            request.session_id,
            &preferences,
            &request.recognized_books,
            request.scan_id,
            request.max_recommendations,
        )
        .await?;

    Ok(Json(recommendations))
}

/// Handler for listing previously generated recommendations
pub async fn list(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    if !state.store.is_session_valid(session_id).await? {
        return Err(AppError::NotFound("Session not found or expired".to_string()));
    }

    let recommendations = state
        .store
        .list_recommendations(session_id, params.limit.clamp(1, 100))
        .await?;

    Ok(Json(recommendations))
}
