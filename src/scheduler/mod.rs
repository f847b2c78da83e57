//! Periodic collection scheduler and the interfaces it consumes.
//!
//! The scheduler ticks on a fixed interval, enumerates all projects from
//! the [`ProjectCatalog`], and fans out one collection job per
//! project × enabled provider under a bounded worker budget. Jobs read and
//! write snapshots through the [`SnapshotStore`]; both interfaces are
//! implemented by the persistence layer and by in-memory doubles in tests.

pub mod driver;

use async_trait::async_trait;

use crate::domain::{Project, ProjectId, ProviderKind, Snapshot};

pub use driver::{PassSummary, Scheduler, SchedulerConfig, SchedulerError, SchedulerState};

/// Failure to enumerate the project catalog. Aborts the current pass; the
/// next tick retries.
#[derive(Debug, thiserror::Error)]
#[error("failed to enumerate projects: {0}")]
pub struct CatalogError(pub String);

/// Errors observable on the snapshot store contract.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The project row (or its per-provider snapshot slot) is absent.
    #[error("snapshot not found")]
    NotFound,

    /// The persistence backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Read-only view of the project catalog consumed by the scheduler.
///
/// Concurrent CRUD on the catalog is allowed: projects added mid-pass are
/// picked up on the next tick, projects deleted mid-pass may still see one
/// final job end in [`StoreError::NotFound`].
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    /// Enumerates every project with its enabled providers and credentials.
    async fn list_all_projects(&self) -> Result<Vec<Project>, CatalogError>;
}

/// Persists the latest snapshot per (project, provider) pair.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Upserts the snapshot into the provider's slot on the project record.
    ///
    /// Never creates a project: returns [`StoreError::NotFound`] when no
    /// project with the given ID exists. Idempotent on repeat with
    /// identical input; concurrent stores for different providers on the
    /// same project must not lose updates.
    async fn store_snapshot(
        &self,
        project_id: ProjectId,
        kind: ProviderKind,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError>;

    /// Reads the provider's snapshot slot for the project.
    ///
    /// Returns [`StoreError::NotFound`] when the project or the slot is
    /// absent.
    async fn last_snapshot(
        &self,
        project_id: ProjectId,
        kind: ProviderKind,
    ) -> Result<Snapshot, StoreError>;
}
