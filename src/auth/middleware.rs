//! Axum extractor for authenticated requests.
//!
//! The access token is accepted from the `Authorization: Bearer` header or
//! from the `access_token` cookie the login handlers set.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::models::AuthenticatedUser;
use crate::app_state::AppState;
use crate::error::ApiError;

/// Cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Extracts and verifies the caller's identity; rejects with 401 when the
/// token is missing or invalid.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_value(&parts.headers, ACCESS_TOKEN_COOKIE))
            .ok_or_else(|| ApiError::Unauthorized("missing access token".to_string()))?;

        let user = state.auth_service.verify_access(&token)?;
        Ok(Self(user))
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Pulls a named cookie out of the `Cookie` header.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            if let (Ok(name), Ok(value)) = (
                name.parse::<axum::http::HeaderName>(),
                HeaderValue::from_str(value),
            ) {
                map.append(name, value);
            }
        }
        map
    }

    #[test]
    fn bearer_header_is_extracted() {
        let map = headers(&[("authorization", "Bearer abc.def.ghi")]);
        assert_eq!(bearer_token(&map).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let map = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(bearer_token(&map), None);
    }

    #[test]
    fn named_cookie_is_extracted() {
        let map = headers(&[("cookie", "theme=dark; access_token=tok123; lang=en")]);
        assert_eq!(
            cookie_value(&map, ACCESS_TOKEN_COOKIE).as_deref(),
            Some("tok123")
        );
    }

    #[test]
    fn missing_cookie_yields_none() {
        let map = headers(&[("cookie", "theme=dark")]);
        assert_eq!(cookie_value(&map, ACCESS_TOKEN_COOKIE), None);
    }

    #[test]
    fn empty_cookie_value_yields_none() {
        let map = headers(&[("cookie", "access_token=")]);
        assert_eq!(cookie_value(&map, ACCESS_TOKEN_COOKIE), None);
    }
}
