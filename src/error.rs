//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the central error type for the management surface. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: project key must be alphanumeric",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`ApiError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 4000–4999 | Authentication  | 401 Unauthorized             |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A provider configuration block is missing or incomplete.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// Project with the given key was not found.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Project key is already taken.
    #[error("project key already exists: {0}")]
    DuplicateKey(String),

    /// Username is already taken.
    #[error("username already exists")]
    UsernameTaken,

    /// Login failed: unknown user or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Request lacked a valid session token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidConfig(_) => 1002,
            Self::ProjectNotFound(_) => 2001,
            Self::DuplicateKey(_) => 2002,
            Self::UsernameTaken => 2003,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
            Self::InvalidCredentials => 4001,
            Self::Unauthorized(_) => 4000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Self::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateKey(_) | Self::UsernameTaken => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
