//! Session management: registration, login, token issuance and rotation.

use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::models::{AccessClaims, AuthenticatedUser, RefreshClaims, RefreshToken, User, UserStore};
use crate::domain::UserId;
use crate::error::ApiError;

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Refresh token lifetime.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

/// An issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Short-lived bearer token for API requests.
    pub access_token: String,
    /// Single-use rotation token.
    pub refresh_token: String,
}

/// Authentication service over a [`UserStore`].
pub struct AuthService {
    store: Arc<dyn UserStore>,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

impl AuthService {
    /// Creates a service signing with the given HMAC secrets.
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            store,
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Registers a new account and issues its first session.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidRequest`] on too-short username/password,
    /// [`ApiError::UsernameTaken`] on conflict.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, TokenPair), ApiError> {
        if username.len() < MIN_USERNAME_LEN {
            return Err(ApiError::InvalidRequest(format!(
                "username must be at least {MIN_USERNAME_LEN} characters long"
            )));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ApiError::InvalidRequest(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        self.store.create_user(&user).await?;
        tracing::info!(user = %user.id, "user registered");

        let tokens = self.issue_tokens(&user).await?;
        Ok((user, tokens))
    }

    /// Verifies credentials and issues a session.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidCredentials`] on unknown username or wrong
    /// password; the two cases are indistinguishable to the caller.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, TokenPair), ApiError> {
        let user = self
            .store
            .user_by_username(username)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(ApiError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&user).await?;
        Ok((user, tokens))
    }

    /// Rotates a refresh token: validates the JWT, consumes the stored
    /// single-use record, and issues a fresh pair.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] when the token is invalid, expired,
    /// unknown, or already used.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, TokenPair), ApiError> {
        let claims = decode::<RefreshClaims>(refresh_token, &self.refresh_decoding, &self.validation)
            .map_err(|_| ApiError::Unauthorized("invalid refresh token".to_string()))?
            .claims;

        let user_id = parse_user_id(&claims.sub)?;
        let consumed = self.store.consume_refresh_token(user_id, refresh_token).await?;
        if !consumed {
            return Err(ApiError::Unauthorized(
                "refresh token expired or already used".to_string(),
            ));
        }

        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("unknown user".to_string()))?;

        let tokens = self.issue_tokens(&user).await?;
        Ok((user, tokens))
    }

    /// Validates an access token and returns the identity it carries.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] on a malformed, mis-signed, or expired
    /// token.
    pub fn verify_access(&self, token: &str) -> Result<AuthenticatedUser, ApiError> {
        let claims = decode::<AccessClaims>(token, &self.access_decoding, &self.validation)
            .map_err(|_| ApiError::Unauthorized("invalid access token".to_string()))?
            .claims;

        Ok(AuthenticatedUser {
            id: parse_user_id(&claims.sub)?,
            username: claims.username,
        })
    }

    /// Signs a new access/refresh pair and stores the refresh record.
    async fn issue_tokens(&self, user: &User) -> Result<TokenPair, ApiError> {
        let now = Utc::now();
        let access_exp = now + to_delta(ACCESS_TOKEN_TTL);
        let refresh_exp = now + to_delta(REFRESH_TOKEN_TTL);

        let access_claims = AccessClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            exp: access_exp.timestamp(),
        };
        let access_token = encode(&Header::default(), &access_claims, &self.access_encoding)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let refresh_claims = RefreshClaims {
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: refresh_exp.timestamp(),
        };
        let refresh_token = encode(&Header::default(), &refresh_claims, &self.refresh_encoding)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        self.store
            .insert_refresh_token(&RefreshToken {
                id: Uuid::new_v4(),
                user_id: user.id,
                token: refresh_token.clone(),
                expires_at: refresh_exp,
                used: false,
            })
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

/// Hashes a password with Argon2id, returning the PHC-format string.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Verifies a password against a stored PHC-format hash.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn parse_user_id(sub: &str) -> Result<UserId, ApiError> {
    sub.parse::<Uuid>()
        .map(UserId::from_uuid)
        .map_err(|_| ApiError::Unauthorized("malformed subject claim".to_string()))
}

#[allow(clippy::cast_possible_wrap)]
fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::seconds(duration.as_secs() as i64)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryUserStore {
        users: Mutex<Vec<User>>,
        tokens: Mutex<HashMap<String, RefreshToken>>,
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn create_user(&self, user: &User) -> Result<(), ApiError> {
            let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
            if users.iter().any(|u| u.username == user.username) {
                return Err(ApiError::UsernameTaken);
            }
            users.push(user.clone());
            Ok(())
        }

        async fn user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
            let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
            Ok(users.iter().find(|u| u.username == username).cloned())
        }

        async fn user_by_id(&self, id: UserId) -> Result<Option<User>, ApiError> {
            let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
            Ok(users.iter().find(|u| u.id == id).cloned())
        }

        async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), ApiError> {
            let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
            tokens.insert(token.token.clone(), token.clone());
            Ok(())
        }

        async fn consume_refresh_token(
            &self,
            user_id: UserId,
            token: &str,
        ) -> Result<bool, ApiError> {
            let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
            match tokens.get_mut(token) {
                Some(stored)
                    if stored.user_id == user_id && !stored.used && stored.expires_at > Utc::now() =>
                {
                    stored.used = true;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryUserStore::default()),
            b"access-secret-for-tests",
            b"refresh-secret-for-tests",
        )
    }

    #[test]
    fn password_hash_round_trip() {
        let Ok(hash) = hash_password("hunter2hunter2") else {
            panic!("hashing failed");
        };
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[tokio::test]
    async fn register_then_login() {
        let auth = service();
        let result = auth.register("alice", "password123").await;
        assert!(result.is_ok());

        let login = auth.login("alice", "password123").await;
        let Ok((user, tokens)) = login else {
            panic!("login failed");
        };
        assert_eq!(user.username, "alice");

        let verified = auth.verify_access(&tokens.access_token);
        let Ok(identity) = verified else {
            panic!("access token did not verify");
        };
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let auth = service();
        let _ = auth.register("bob", "password123").await;
        let result = auth.login("bob", "password124").await;
        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn short_credentials_are_rejected() {
        let auth = service();
        assert!(matches!(
            auth.register("ab", "password123").await,
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            auth.register("carol", "short").await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let auth = service();
        let _ = auth.register("dave", "password123").await;
        let result = auth.register("dave", "password456").await;
        assert!(matches!(result, Err(ApiError::UsernameTaken)));
    }

    #[tokio::test]
    async fn refresh_token_is_single_use() {
        let auth = service();
        let Ok((_, tokens)) = auth.register("erin", "password123").await else {
            panic!("registration failed");
        };

        let rotated = auth.refresh(&tokens.refresh_token).await;
        assert!(rotated.is_ok());

        // The same token a second time must be rejected.
        let replayed = auth.refresh(&tokens.refresh_token).await;
        assert!(matches!(replayed, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn garbage_tokens_are_rejected() {
        let auth = service();
        assert!(auth.verify_access("not-a-jwt").is_err());
        assert!(auth.refresh("not-a-jwt").await.is_err());
    }
}
