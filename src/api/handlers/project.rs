//! Project CRUD handlers: create, list, get, update, metrics.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::ProjectMetricsResponse;
use crate::app_state::AppState;
use crate::auth::CurrentUser;
use crate::domain::{CreateProjectInput, Project, UpdateProjectInput};
use crate::error::{ApiError, ErrorResponse};

/// `POST /projects` — Create a project.
///
/// # Errors
///
/// Returns [`ApiError`] on invalid profile fields, a missing or incomplete
/// configuration block for an enabled provider, or a taken key.
#[utoipa::path(
    post,
    path = "/api/projects",
    tag = "Projects",
    summary = "Create a project",
    description = "Creates a project owned by the caller. Every tag in `providers` must come \
                   with its configuration block.",
    request_body = CreateProjectInput,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid request or provider configuration", body = ErrorResponse),
        (status = 409, description = "Project key already exists", body = ErrorResponse),
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateProjectInput>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.project_service.create_project(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `GET /projects` — List the caller's projects.
///
/// # Errors
///
/// Returns [`ApiError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "Projects",
    summary = "List projects",
    responses(
        (status = 200, description = "The caller's projects", body = Vec<Project>),
    )
)]
pub async fn list_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let projects = state.project_service.list_projects(user.id).await?;
    Ok(Json(projects))
}

/// `GET /projects/{key}` — Fetch one project.
///
/// # Errors
///
/// Returns [`ApiError::ProjectNotFound`] when absent or owned by another
/// user.
#[utoipa::path(
    get,
    path = "/api/projects/{key}",
    tag = "Projects",
    summary = "Get a project",
    params(("key" = String, Path, description = "Project key")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 404, description = "Project not found", body = ErrorResponse),
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.project_service.get_project(user.id, &key).await?;
    Ok(Json(project))
}

/// `PUT /projects/{key}` — Partially update a project.
///
/// # Errors
///
/// Returns [`ApiError`] when the project is absent or the patched project
/// fails validation.
#[utoipa::path(
    put,
    path = "/api/projects/{key}",
    tag = "Projects",
    summary = "Update a project",
    params(("key" = String, Path, description = "Project key")),
    request_body = UpdateProjectInput,
    responses(
        (status = 200, description = "Updated project", body = Project),
        (status = 400, description = "Invalid request or provider configuration", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
    )
)]
pub async fn update_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(key): Path<String>,
    Json(input): Json<UpdateProjectInput>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state
        .project_service
        .update_project(user.id, &key, input)
        .await?;
    Ok(Json(project))
}

/// `GET /projects/{key}/metrics` — Latest snapshots for the project.
///
/// # Errors
///
/// Returns [`ApiError::ProjectNotFound`] when absent or owned by another
/// user.
#[utoipa::path(
    get,
    path = "/api/projects/{key}/metrics",
    tag = "Projects",
    summary = "Latest snapshots per enabled provider",
    params(("key" = String, Path, description = "Project key")),
    responses(
        (status = 200, description = "Latest snapshot per provider", body = ProjectMetricsResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
    )
)]
pub async fn project_metrics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshots = state.project_service.project_metrics(user.id, &key).await?;
    Ok(Json(ProjectMetricsResponse { key, snapshots }))
}

/// Project management routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project).get(list_projects))
        .route("/projects/{key}", get(get_project).put(update_project))
        .route("/projects/{key}/metrics", get(project_metrics))
}
