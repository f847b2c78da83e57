//! PostgreSQL implementation of the persistence layer.
//!
//! One store struct backs three consumers: project CRUD for the management
//! API, the scheduler's [`ProjectCatalog`] / [`SnapshotStore`] interfaces,
//! and the auth [`UserStore`]. Each provider's latest snapshot lives in its
//! own JSONB column on the project row, so concurrent stores for different
//! providers update disjoint columns and never lose writes.

use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{ProjectRow, UserRow};
use crate::auth::models::{RefreshToken, User, UserStore};
use crate::domain::{Project, ProjectId, ProviderKind, Snapshot, UserId};
use crate::error::ApiError;
use crate::scheduler::{CatalogError, ProjectCatalog, SnapshotStore, StoreError};

const PROJECT_COLUMNS: &str = "id, name, key, created_by, active, created_at, updated_at, \
     providers, sentry_config, clarity_config, embrace_config, app_metric_config";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables and indexes this store relies on.
    ///
    /// Idempotent; run once at startup. The unique index on `key` and the
    /// owner index on `created_by` are required by the record layout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Persistence`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), ApiError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users (username)",
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                token TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                used BOOLEAN NOT NULL DEFAULT FALSE
            )",
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens (user_id)",
            "CREATE TABLE IF NOT EXISTS projects (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                key TEXT NOT NULL,
                created_by UUID NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                providers JSONB NOT NULL DEFAULT '[]',
                sentry_config JSONB,
                clarity_config JSONB,
                embrace_config JSONB,
                app_metric_config JSONB,
                sentry_stats JSONB,
                clarity_stats JSONB,
                embrace_stats JSONB,
                app_metric_stats JSONB
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_key ON projects (key)",
            "CREATE INDEX IF NOT EXISTS idx_projects_created_by ON projects (created_by)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| ApiError::Persistence(e.to_string()))?;
        }
        Ok(())
    }

    /// Inserts a new project row.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::DuplicateKey`] when the key is taken,
    /// [`ApiError::Persistence`] on other database failures.
    pub async fn create_project(&self, project: &Project) -> Result<(), ApiError> {
        let result = sqlx::query(
            "INSERT INTO projects (id, name, key, created_by, active, created_at, updated_at, \
             providers, sentry_config, clarity_config, embrace_config, app_metric_config) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(project.id.as_uuid())
        .bind(&project.name)
        .bind(&project.key)
        .bind(project.created_by.as_uuid())
        .bind(project.active)
        .bind(project.created_at)
        .bind(project.updated_at)
        .bind(json_value(&project.providers)?)
        .bind(optional_json(&project.sentry_config)?)
        .bind(optional_json(&project.clarity_config)?)
        .bind(optional_json(&project.embrace_config)?)
        .bind(optional_json(&project.app_metric_config)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ApiError::DuplicateKey(project.key.clone())),
            Err(e) => Err(ApiError::Persistence(e.to_string())),
        }
    }

    /// Fetches a project by its key.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ProjectNotFound`] when no row matches,
    /// [`ApiError::Persistence`] on database failure.
    pub async fn project_by_key(&self, key: &str) -> Result<Project, ApiError> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE key = $1");
        let row = sqlx::query_as::<_, ProjectRow>(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::Persistence(e.to_string()))?;

        let row = row.ok_or_else(|| ApiError::ProjectNotFound(key.to_string()))?;
        Project::try_from(row).map_err(|e| ApiError::Persistence(e.to_string()))
    }

    /// Overwrites a project's profile fields and configuration blocks.
    /// Snapshot columns are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ProjectNotFound`] when no row matches,
    /// [`ApiError::Persistence`] on database failure.
    pub async fn update_project(&self, project: &Project) -> Result<(), ApiError> {
        let result = sqlx::query(
            "UPDATE projects SET name = $2, active = $3, updated_at = $4, providers = $5, \
             sentry_config = $6, clarity_config = $7, embrace_config = $8, \
             app_metric_config = $9 WHERE id = $1",
        )
        .bind(project.id.as_uuid())
        .bind(&project.name)
        .bind(project.active)
        .bind(project.updated_at)
        .bind(json_value(&project.providers)?)
        .bind(optional_json(&project.sentry_config)?)
        .bind(optional_json(&project.clarity_config)?)
        .bind(optional_json(&project.embrace_config)?)
        .bind(optional_json(&project.app_metric_config)?)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(ApiError::ProjectNotFound(project.key.clone()));
        }
        Ok(())
    }

    /// Lists the projects owned by the given user.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Persistence`] on database failure.
    pub async fn projects_by_owner(&self, owner: UserId) -> Result<Vec<Project>, ApiError> {
        let query = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE created_by = $1 ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, ProjectRow>(&query)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ApiError::Persistence(e.to_string()))?;

        rows.into_iter()
            .map(|row| Project::try_from(row).map_err(|e| ApiError::Persistence(e.to_string())))
            .collect()
    }
}

#[async_trait]
impl ProjectCatalog for PostgresStore {
    async fn list_all_projects(&self) -> Result<Vec<Project>, CatalogError> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at");
        let rows = sqlx::query_as::<_, ProjectRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError(e.to_string()))?;

        rows.into_iter()
            .map(|row| Project::try_from(row).map_err(|e| CatalogError(e.to_string())))
            .collect()
    }
}

#[async_trait]
impl SnapshotStore for PostgresStore {
    async fn store_snapshot(
        &self,
        project_id: ProjectId,
        kind: ProviderKind,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        // The column name comes from the closed provider enum, never from
        // request input.
        let query = format!(
            "UPDATE projects SET {column} = $2 WHERE id = $1",
            column = kind.stats_column()
        );
        let payload =
            serde_json::to_value(snapshot).map_err(|e| StoreError::Backend(e.to_string()))?;

        let result = sqlx::query(&query)
            .bind(project_id.as_uuid())
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn last_snapshot(
        &self,
        project_id: ProjectId,
        kind: ProviderKind,
    ) -> Result<Snapshot, StoreError> {
        let query = format!(
            "SELECT {column} FROM projects WHERE id = $1",
            column = kind.stats_column()
        );
        let row: Option<(Option<serde_json::Value>,)> = sqlx::query_as(&query)
            .bind(project_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None | Some((None,)) => Err(StoreError::NotFound),
            Some((Some(value),)) => {
                serde_json::from_value(value).map_err(|e| StoreError::Backend(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create_user(&self, user: &User) -> Result<(), ApiError> {
        let result = sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ApiError::UsernameTaken),
            Err(e) => Err(ApiError::Persistence(e.to_string())),
        }
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

        Ok(row.map(User::from))
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, ApiError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

        Ok(row.map(User::from))
    }

    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at, used) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(token.id)
        .bind(token.user_id.as_uuid())
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.used)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn consume_refresh_token(&self, user_id: UserId, token: &str) -> Result<bool, ApiError> {
        // Single-use rotation: flipping `used` and checking the row count
        // in one statement keeps concurrent refreshes from both winning.
        let result = sqlx::query(
            "UPDATE refresh_tokens SET used = TRUE \
             WHERE user_id = $1 AND token = $2 AND used = FALSE AND expires_at > now()",
        )
        .bind(user_id.as_uuid())
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::Persistence(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

fn json_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

fn optional_json<T: serde::Serialize>(
    value: &Option<T>,
) -> Result<Option<serde_json::Value>, ApiError> {
    value.as_ref().map(json_value).transpose()
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
