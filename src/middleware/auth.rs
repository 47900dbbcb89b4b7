//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and verify it exists in the database
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{
    db::DbPool,
    error::AppError,
    models::{api_key::hash_key, user::UserRole},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Route handlers extract it with `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user; ownership filters use this id
    pub user_id: Uuid,

    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(sqlx::FromRow)]
struct KeyOwner {
    user_id: Uuid,
    role: String,
}

/// Pull the bearer token out of an `Authorization` header value.
fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(AppError::Unauthorized)
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Look up an active key with that hash and load its owner's role
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = bearer_token(
        request
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok()),
    )?;

    let key_hash = hash_key(api_key);

    let owner = sqlx::query_as::<_, KeyOwner>(
        "SELECT u.id AS user_id, u.role
         FROM api_keys k
         JOIN users u ON u.id = k.user_id
         WHERE k.key_hash = $1 AND k.is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let role = owner.role.parse().map_err(|_| AppError::Unauthorized)?;

    request.extensions_mut().insert(AuthContext {
        user_id: owner.user_id,
        role,
    });

    Ok(next.run(request).await)
}

/// Admin gate. Must run after [`auth_middleware`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let auth = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(AppError::Unauthorized)?;

    if !auth.is_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer   ")).is_err());
    }
}
