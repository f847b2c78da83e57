//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::AuthService;
use crate::service::ProjectService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Project management logic.
    pub project_service: Arc<ProjectService>,
    /// Session issuance and verification.
    pub auth_service: Arc<AuthService>,
}
