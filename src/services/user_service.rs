//! User registration, profiles and API key lifecycle.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        api_key::{generate_key, hash_key},
        user::{IssuedKeyResponse, Profile, RegisterUserRequest, UpdateProfileRequest, User, UserRole},
    },
};

/// Register a user with an empty profile and a fresh API key.
///
/// # Errors
///
/// - `InvalidRequest`: malformed email or blank display name
/// - `Conflict`: email already registered
pub async fn register_user(
    pool: &DbPool,
    request: RegisterUserRequest,
) -> Result<IssuedKeyResponse, AppError> {
    let request = request.validate().map_err(AppError::InvalidRequest)?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, role)
        VALUES ($1, 'user')
        ON CONFLICT (email) DO NOTHING
        RETURNING id, email, role, created_at
        "#,
    )
    .bind(&request.email)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("Email is already registered".to_string()))?;

    sqlx::query("INSERT INTO profiles (user_id, display_name) VALUES ($1, $2)")
        .bind(user.id)
        .bind(&request.display_name)
        .execute(&mut *tx)
        .await?;

    let api_key = generate_key();
    sqlx::query("INSERT INTO api_keys (user_id, key_hash) VALUES ($1, $2)")
        .bind(user.id)
        .bind(hash_key(&api_key))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok(IssuedKeyResponse { user, api_key })
}

pub async fn get_user(pool: &DbPool, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT id, email, role, created_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("user"))
}

pub async fn get_profile(pool: &DbPool, user_id: Uuid) -> Result<Profile, AppError> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("profile"))
}

/// Partial profile update. Blank optional fields are cleared.
pub async fn update_profile(
    pool: &DbPool,
    user_id: Uuid,
    request: UpdateProfileRequest,
) -> Result<Profile, AppError> {
    let display_name = match request.display_name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::InvalidRequest(
                "display_name must not be empty".to_string(),
            ));
        }
        other => other.map(|n| n.trim().to_string()),
    };

    sqlx::query_as::<_, Profile>(
        r#"
        UPDATE profiles
        SET display_name = COALESCE($2, display_name),
            phone = CASE WHEN $3::TEXT IS NULL THEN phone ELSE NULLIF(TRIM($3), '') END,
            avatar_url = CASE WHEN $4::TEXT IS NULL THEN avatar_url ELSE NULLIF(TRIM($4), '') END,
            updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(display_name)
    .bind(request.phone)
    .bind(request.avatar_url)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("profile"))
}

/// Deactivate every key of the user and issue a new one.
pub async fn rotate_api_key(pool: &DbPool, user_id: Uuid) -> Result<IssuedKeyResponse, AppError> {
    let user = get_user(pool, user_id).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE api_keys SET is_active = false WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let api_key = generate_key();
    sqlx::query("INSERT INTO api_keys (user_id, key_hash) VALUES ($1, $2)")
        .bind(user_id)
        .bind(hash_key(&api_key))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, "api key rotated");

    Ok(IssuedKeyResponse { user, api_key })
}

/// Make sure an admin owning `plaintext_key` exists.
///
/// Idempotent: an existing key is left alone.
pub async fn ensure_bootstrap_admin(pool: &DbPool, plaintext_key: &str) -> Result<(), AppError> {
    let key_hash = hash_key(plaintext_key);

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM api_keys WHERE key_hash = $1)")
        .bind(&key_hash)
        .fetch_one(pool)
        .await?;
    if exists {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    let admin_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (email, role)
        VALUES ('admin@localhost', $1)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(UserRole::Admin.as_str())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO profiles (user_id, display_name) VALUES ($1, 'Administrator') ON CONFLICT DO NOTHING",
    )
    .bind(admin_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO api_keys (user_id, key_hash) VALUES ($1, $2)")
        .bind(admin_id)
        .bind(&key_hash)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %admin_id, "bootstrap admin key installed");
    Ok(())
}
