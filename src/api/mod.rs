//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Management endpoints are mounted under `/api`; the health probe lives
//! at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI documentation for the insight-aggregator REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "insight-aggregator",
        version = "0.1.0",
        description = "Multi-tenant aggregator polling third-party analytics providers and \
                       serving the latest per-project metric snapshots.",
        license(name = "MIT"),
    ),
    tags(
        (name = "System", description = "Health check"),
        (name = "Auth", description = "Registration, login, and token rotation"),
        (name = "Projects", description = "Project CRUD and snapshot reads"),
    ),
    paths(
        handlers::system::health_handler,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::project::create_project,
        handlers::project::list_projects,
        handlers::project::get_project,
        handlers::project::update_project,
        handlers::project::project_metrics,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::domain::Project,
        crate::domain::ProjectId,
        crate::domain::ProviderKind,
        crate::domain::CollectorMeta,
        crate::domain::CollectorStatus,
        crate::domain::Platform,
        crate::domain::SentryConfig,
        crate::domain::ClarityConfig,
        crate::domain::EmbraceConfig,
        crate::domain::AppMetricConfig,
        crate::domain::CreateProjectInput,
        crate::domain::UpdateProjectInput,
        crate::domain::SentryConfigInput,
        crate::domain::ClarityConfigInput,
        crate::domain::EmbraceConfigInput,
        crate::domain::AppMetricConfigInput,
        crate::domain::Snapshot,
        crate::domain::SnapshotId,
        crate::domain::MetricValue,
        dto::RegisterRequest,
        dto::LoginRequest,
        dto::RefreshRequest,
        dto::UserDto,
        dto::SessionResponse,
        dto::ProjectMetricsResponse,
    ))
)]
#[derive(Debug)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api", handlers::routes())
        .merge(handlers::system::routes())
}
