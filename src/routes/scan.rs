use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::ScanResult,
    routes::AppState,
};

const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Handler for the shelf scan endpoint.
///
/// Accepts a multipart upload with a `session_id` field, the shelf `image`,
/// and optional `use_fallback` / `max_books` knobs. Provider failures come
/// back inside the scan envelope; only an invalid upload or an invalid
/// session is an HTTP error.
pub async fn scan_shelf(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> AppResult<Json<ScanResult>> {
    let mut session_id: Option<Uuid> = None;
    let mut allow_fallback = true;
    let mut max_books: Option<usize> = None;
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("session_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?;
                session_id = Some(Uuid::parse_str(text.trim()).map_err(|_| {
                    AppError::InvalidInput("session_id must be a UUID".to_string())
                })?);
            }
            Some("use_fallback") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?;
                allow_fallback = text.trim().parse().map_err(|_| {
                    AppError::InvalidInput("use_fallback must be true or false".to_string())
                })?;
            }
            Some("max_books") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?;
                max_books = Some(text.trim().parse().map_err(|_| {
                    AppError::InvalidInput("max_books must be a positive integer".to_string())
                })?);
            }
            Some("image") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
                    return Err(AppError::InvalidInput(format!(
                        "Invalid image type '{}'. Must be one of: {}",
                        content_type,
                        ALLOWED_IMAGE_TYPES.join(", ")
                    )));
                }

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Unreadable image: {}", e)))?;

                if bytes.len() > state.max_upload_bytes {
                    return Err(AppError::InvalidInput(format!(
                        "Image exceeds maximum size of {} bytes",
                        state.max_upload_bytes
                    )));
                }

                image = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let session_id =
        session_id.ok_or_else(|| AppError::InvalidInput("session_id is required".to_string()))?;
    let image = image.ok_or_else(|| AppError::InvalidInput("image is required".to_string()))?;

    if image.is_empty() {
        return Err(AppError::InvalidInput("image is empty".to_string()));
    }

    if !state.store.is_session_valid(session_id).await? {
        return Err(AppError::NotFound("Session not found or expired".to_string()));
    }

    let max_candidates = max_books
        .unwrap_or(state.max_scan_candidates)
        .clamp(1, state.max_scan_candidates);

    tracing::info!(
        request_id = %request_id,
        session_id = %session_id,
        image_bytes = image.len(),
        allow_fallback,
        "Processing shelf scan"
    );

    let result = state
        .scanner
        .scan(&image, max_candidates, allow_fallback)
        .await;

    Ok(Json(result))
}
