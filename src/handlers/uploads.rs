//! Image upload handlers.
//!
//! Clients upload directly to blob storage: they ask for a presigned URL,
//! `PUT` the file there, then confirm the upload so the image is recorded.
//!
//! - POST /api/v1/businesses/{id}/uploads - Presign
//! - POST /api/v1/businesses/{id}/images - Confirm upload
//! - DELETE /api/v1/images/{id}

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::image::{CompleteUploadRequest, PresignUploadRequest, PresignUploadResponse},
    services::upload_service,
    state::AppState,
};

/// Presign an upload.
///
/// # Request Body
///
/// ```json
/// {
///   "kind": "product",
///   "product_id": "550e8400-e29b-41d4-a716-446655440000",
///   "file_name": "bread.jpg",
///   "content_type": "image/jpeg",
///   "size_bytes": 204800
/// }
/// ```
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "upload_url": "https://...X-Amz-Signature=...",
///   "object_key": "businesses/<id>/product/<uuid>.jpg",
///   "public_url": "https://.../businesses/<id>/product/<uuid>.jpg",
///   "expires_in": 900
/// }
/// ```
pub async fn presign_upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<PresignUploadRequest>,
) -> Result<Json<PresignUploadResponse>, AppError> {
    Ok(Json(
        upload_service::presign_upload(&state.pool, &state.storage, &auth, business_id, request)
            .await?,
    ))
}

pub async fn complete_upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<CompleteUploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let image =
        upload_service::complete_upload(&state.pool, &state.storage, &auth, business_id, request)
            .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(image_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    upload_service::delete_image(&state.pool, &auth, image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
