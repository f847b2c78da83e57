//! Auth handlers: register, login, and refresh-token rotation.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{LoginRequest, RefreshRequest, RegisterRequest, SessionResponse};
use crate::app_state::AppState;
use crate::auth::middleware::{cookie_value, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::auth::service::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
use crate::auth::TokenPair;
use crate::error::{ApiError, ErrorResponse};

/// `POST /auth/register` — Create an account and open a session.
///
/// # Errors
///
/// Returns [`ApiError`] on short credentials or a taken username.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    summary = "Register a new user",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, session opened", body = SessionResponse),
        (status = 400, description = "Username or password too short", body = ErrorResponse),
        (status = 409, description = "Username already exists", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = state
        .auth_service
        .register(&req.username, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        token_cookies(&tokens),
        Json(SessionResponse::new(&user, &tokens)),
    ))
}

/// `POST /auth/login` — Verify credentials and open a session.
///
/// # Errors
///
/// Returns [`ApiError::InvalidCredentials`] on unknown user or wrong
/// password.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = state
        .auth_service
        .login(&req.username, &req.password)
        .await?;

    Ok((
        StatusCode::OK,
        token_cookies(&tokens),
        Json(SessionResponse::new(&user, &tokens)),
    ))
}

/// `POST /auth/refresh` — Rotate the refresh token.
///
/// The refresh token is read from the `refresh_token` cookie, falling back
/// to the JSON body.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] on a missing, invalid, expired, or
/// already-used token.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    summary = "Rotate session tokens",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Fresh token pair issued", body = SessionResponse),
        (status = 401, description = "Invalid refresh token", body = ErrorResponse),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let token = cookie_value(&headers, REFRESH_TOKEN_COOKIE)
        .or_else(|| body.and_then(|Json(req)| req.refresh_token))
        .ok_or_else(|| ApiError::Unauthorized("missing refresh token".to_string()))?;

    let (user, tokens) = state.auth_service.refresh(&token).await?;

    Ok((
        StatusCode::OK,
        token_cookies(&tokens),
        Json(SessionResponse::new(&user, &tokens)),
    ))
}

/// Builds the `Set-Cookie` headers for an issued session. Both cookies are
/// `HttpOnly`; the refresh cookie is scoped to the refresh route only.
fn token_cookies(tokens: &TokenPair) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            format!(
                "{ACCESS_TOKEN_COOKIE}={}; HttpOnly; Secure; SameSite=Strict; Path=/api; Max-Age={}",
                tokens.access_token,
                ACCESS_TOKEN_TTL.as_secs()
            ),
        ),
        (
            SET_COOKIE,
            format!(
                "{REFRESH_TOKEN_COOKIE}={}; HttpOnly; Secure; SameSite=Strict; \
                 Path=/api/auth/refresh; Max-Age={}",
                tokens.refresh_token,
                REFRESH_TOKEN_TTL.as_secs()
            ),
        ),
    ])
}

/// Auth routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}
