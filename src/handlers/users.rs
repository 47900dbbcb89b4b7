//! User registration and account self-service.
//!
//! - POST /api/v1/users - Register (public)
//! - GET /api/v1/me - Current user
//! - GET|PATCH /api/v1/me/profile - Profile
//! - POST /api/v1/me/api-key - Rotate API key

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::user::{IssuedKeyResponse, Profile, RegisterUserRequest, UpdateProfileRequest, User},
    services::user_service,
};

/// Register a new user.
///
/// # Request Body
///
/// ```json
/// { "email": "ana@example.com", "display_name": "Ana" }
/// ```
///
/// # Response (201 Created)
///
/// The `api_key` is shown only in this response.
///
/// ```json
/// {
///   "user": { "id": "...", "email": "ana@example.com", "role": "user", "created_at": "..." },
///   "api_key": "lm_5f0c..."
/// }
/// ```
pub async fn register(
    State(pool): State<DbPool>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let issued = user_service::register_user(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn me(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<User>, AppError> {
    Ok(Json(user_service::get_user(&pool, auth.user_id).await?))
}

pub async fn get_profile(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(user_service::get_profile(&pool, auth.user_id).await?))
}

/// Partial update; an empty string clears `phone` or `avatar_url`.
pub async fn update_profile(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(
        user_service::update_profile(&pool, auth.user_id, request).await?,
    ))
}

/// Issue a new API key. Every previous key stops working immediately.
pub async fn rotate_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<IssuedKeyResponse>, AppError> {
    Ok(Json(user_service::rotate_api_key(&pool, auth.user_id).await?))
}
