//! Request/response DTOs for the REST API.

pub mod auth_dto;
pub mod project_dto;

pub use auth_dto::{LoginRequest, RefreshRequest, RegisterRequest, SessionResponse, UserDto};
pub use project_dto::ProjectMetricsResponse;
