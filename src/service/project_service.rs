//! Project service: validation and orchestration for the management API.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    CreateProjectInput, Project, ProjectId, ProviderKind, Snapshot, UpdateProjectInput, UserId,
};
use crate::error::ApiError;
use crate::persistence::PostgresStore;
use crate::scheduler::{SnapshotStore, StoreError};

/// Orchestration layer for project management.
///
/// Stateless coordinator over the persistence layer. Every mutation
/// validates the profile fields and the enabled-provider invariant before
/// touching storage; ownership is enforced on every read and write, with
/// foreign projects indistinguishable from absent ones.
#[derive(Debug, Clone)]
pub struct ProjectService {
    store: Arc<PostgresStore>,
}

impl ProjectService {
    /// Creates a new `ProjectService`.
    #[must_use]
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }

    /// Creates a project owned by `owner`.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidRequest`] on profile problems,
    /// [`ApiError::InvalidConfig`] when an enabled provider's block is
    /// missing or incomplete, [`ApiError::DuplicateKey`] when the key is
    /// taken.
    pub async fn create_project(
        &self,
        owner: UserId,
        input: CreateProjectInput,
    ) -> Result<Project, ApiError> {
        let now = Utc::now();
        let project = Project {
            id: ProjectId::new(),
            name: input.name,
            key: input.key,
            created_by: owner,
            active: true,
            created_at: now,
            updated_at: now,
            providers: input.providers,
            sentry_config: input.sentry_config.map(|c| c.into_config()),
            clarity_config: input.clarity_config.map(|c| c.into_config()),
            embrace_config: input.embrace_config.map(|c| c.into_config()),
            app_metric_config: input.app_metric_config.map(|c| c.into_config()),
        };

        project.validate_profile().map_err(ApiError::InvalidRequest)?;
        project
            .validate_provider_configs()
            .map_err(ApiError::InvalidConfig)?;

        self.store.create_project(&project).await?;
        tracing::info!(project = %project.id, key = %project.key, "project created");
        Ok(project)
    }

    /// Applies a partial update to the caller's project.
    ///
    /// # Errors
    ///
    /// [`ApiError::ProjectNotFound`] when the key does not resolve to a
    /// project owned by `owner`; validation errors as on create.
    pub async fn update_project(
        &self,
        owner: UserId,
        key: &str,
        input: UpdateProjectInput,
    ) -> Result<Project, ApiError> {
        let mut project = self.owned_project(owner, key).await?;

        if let Some(name) = input.name {
            project.name = name;
        }
        if let Some(active) = input.active {
            project.active = active;
        }
        if let Some(providers) = input.providers {
            project.providers = providers;
        }
        if let Some(config) = input.sentry_config {
            project.sentry_config = Some(config.into_config());
        }
        if let Some(config) = input.clarity_config {
            project.clarity_config = Some(config.into_config());
        }
        if let Some(config) = input.embrace_config {
            project.embrace_config = Some(config.into_config());
        }
        if let Some(config) = input.app_metric_config {
            project.app_metric_config = Some(config.into_config());
        }
        project.updated_at = Utc::now();

        project.validate_profile().map_err(ApiError::InvalidRequest)?;
        project
            .validate_provider_configs()
            .map_err(ApiError::InvalidConfig)?;

        self.store.update_project(&project).await?;
        tracing::info!(project = %project.id, key = %project.key, "project updated");
        Ok(project)
    }

    /// Fetches one of the caller's projects by key.
    ///
    /// # Errors
    ///
    /// [`ApiError::ProjectNotFound`] when absent or owned by someone else.
    pub async fn get_project(&self, owner: UserId, key: &str) -> Result<Project, ApiError> {
        self.owned_project(owner, key).await
    }

    /// Lists the caller's projects.
    ///
    /// # Errors
    ///
    /// [`ApiError::Persistence`] on database failure.
    pub async fn list_projects(&self, owner: UserId) -> Result<Vec<Project>, ApiError> {
        self.store.projects_by_owner(owner).await
    }

    /// Returns the latest snapshot per enabled provider for the caller's
    /// project. Providers that have never collected are absent from the
    /// map.
    ///
    /// # Errors
    ///
    /// [`ApiError::ProjectNotFound`] when the project is absent,
    /// [`ApiError::Persistence`] on database failure.
    pub async fn project_metrics(
        &self,
        owner: UserId,
        key: &str,
    ) -> Result<BTreeMap<ProviderKind, Snapshot>, ApiError> {
        let project = self.owned_project(owner, key).await?;

        let mut snapshots = BTreeMap::new();
        for kind in &project.providers {
            match self.store.last_snapshot(project.id, *kind).await {
                Ok(snapshot) => {
                    snapshots.insert(*kind, snapshot);
                }
                Err(StoreError::NotFound) => {}
                Err(StoreError::Backend(message)) => {
                    return Err(ApiError::Persistence(message));
                }
            }
        }
        Ok(snapshots)
    }

    async fn owned_project(&self, owner: UserId, key: &str) -> Result<Project, ApiError> {
        let project = self.store.project_by_key(key).await?;
        if project.created_by != owner {
            return Err(ApiError::ProjectNotFound(key.to_string()));
        }
        Ok(project)
    }
}
