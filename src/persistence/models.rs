//! Database row types and their conversions into domain types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::models::User;
use crate::domain::{
    AppMetricConfig, ClarityConfig, EmbraceConfig, Project, ProjectId, ProviderKind, SentryConfig,
    UserId,
};

/// A project row from the `projects` table. Provider configuration blocks
/// and the enabled-provider list are stored as JSONB.
#[derive(Debug, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub name: String,
    pub key: String,
    pub created_by: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub providers: serde_json::Value,
    pub sentry_config: Option<serde_json::Value>,
    pub clarity_config: Option<serde_json::Value>,
    pub embrace_config: Option<serde_json::Value>,
    pub app_metric_config: Option<serde_json::Value>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = serde_json::Error;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let providers: Vec<ProviderKind> = serde_json::from_value(row.providers)?;
        let sentry_config: Option<SentryConfig> =
            row.sentry_config.map(serde_json::from_value).transpose()?;
        let clarity_config: Option<ClarityConfig> =
            row.clarity_config.map(serde_json::from_value).transpose()?;
        let embrace_config: Option<EmbraceConfig> =
            row.embrace_config.map(serde_json::from_value).transpose()?;
        let app_metric_config: Option<AppMetricConfig> = row
            .app_metric_config
            .map(serde_json::from_value)
            .transpose()?;

        Ok(Self {
            id: ProjectId::from_uuid(row.id),
            name: row.name,
            key: row.key,
            created_by: UserId::from_uuid(row.created_by),
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            providers,
            sentry_config,
            clarity_config,
            embrace_config,
            app_metric_config,
        })
    }
}

/// A user row from the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}
