//! User, role and profile models.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a user. Admins can moderate every tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Row from the `profiles` table (one per user).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/users`.
///
/// ```json
/// { "email": "ana@example.com", "display_name": "Ana" }
/// ```
#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    pub display_name: String,
}

impl RegisterUserRequest {
    /// Normalize and validate the request. Emails are lowercased.
    pub fn validate(mut self) -> Result<Self, String> {
        self.email = self.email.trim().to_lowercase();
        self.display_name = self.display_name.trim().to_string();

        let (local, domain) = self
            .email
            .split_once('@')
            .ok_or_else(|| "email must contain '@'".to_string())?;
        if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
            return Err("email is not valid".to_string());
        }
        if self.display_name.is_empty() {
            return Err("display_name must not be empty".to_string());
        }
        Ok(self)
    }
}

/// Response returned once at registration (or key rotation). The plaintext
/// key is never shown again.
#[derive(Debug, Serialize)]
pub struct IssuedKeyResponse {
    pub user: User,
    pub api_key: String,
}

/// Partial profile update.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}
