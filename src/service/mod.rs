//! Service layer: orchestrates project CRUD and snapshot reads.

pub mod project_service;

pub use project_service::ProjectService;
