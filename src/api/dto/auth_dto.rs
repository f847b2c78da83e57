//! Auth DTOs: registration, login, and token rotation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::models::User;
use crate::auth::TokenPair;
use crate::domain::UserId;

/// Request body for `POST /api/auth/register`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Desired username (at least 3 characters).
    pub username: String,
    /// Password (at least 8 characters).
    pub password: String,
}

/// Request body for `POST /api/auth/login`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Optional request body for `POST /api/auth/refresh`; the refresh token
/// may also arrive as a cookie.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Public view of a user account.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserDto {
    pub id: UserId,
    pub username: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Response body for all three auth endpoints. Tokens are also set as
/// `HttpOnly` cookies.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub user: UserDto,
    /// Bearer token for `Authorization` headers.
    pub access_token: String,
    /// Single-use rotation token.
    pub refresh_token: String,
}

impl SessionResponse {
    /// Builds the response from an issued session.
    #[must_use]
    pub fn new(user: &User, tokens: &TokenPair) -> Self {
        Self {
            user: UserDto::from(user),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
        }
    }
}
