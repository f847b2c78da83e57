//! User and session types, and the storage interface the auth service
//! talks to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::error::ApiError;

/// A registered user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2id hash in PHC format.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A stored refresh token. Single-use: consumed on rotation.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: uuid::Uuid,
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// The identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
}

/// Claims carried in an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID.
    pub sub: String,
    /// Username, echoed for logging and display.
    pub username: String,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

/// Claims carried in a refresh token.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User ID.
    pub sub: String,
    /// Token identity, making every issued refresh token distinct.
    pub jti: String,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

/// Storage interface for accounts and refresh tokens.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new account.
    ///
    /// Returns [`ApiError::UsernameTaken`] when the username exists.
    async fn create_user(&self, user: &User) -> Result<(), ApiError>;

    /// Looks an account up by username.
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;

    /// Looks an account up by ID.
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, ApiError>;

    /// Stores a freshly issued refresh token.
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), ApiError>;

    /// Atomically marks the given refresh token used. Returns `false` when
    /// the token is unknown, already used, or expired.
    async fn consume_refresh_token(&self, user_id: UserId, token: &str) -> Result<bool, ApiError>;
}
