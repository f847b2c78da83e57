//! Projects and their per-provider configuration blocks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ProviderKind;

/// Type-safe project identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProjectId(uuid::Uuid);

impl ProjectId {
    /// Creates a new random `ProjectId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `ProjectId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe user identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(uuid::Uuid);

impl UserId {
    /// Creates a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `UserId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a configured collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CollectorStatus {
    /// Collector is configured and collecting.
    Active,
    /// Collector is configured but disabled.
    Inactive,
    /// The last collection attempt failed.
    Error,
}

/// Bookkeeping shared by every provider configuration block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CollectorMeta {
    /// Collector identity, assigned when the block is first configured.
    pub id: uuid::Uuid,
    /// Current collector status.
    pub status: CollectorStatus,
    /// When the collector last ran, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    /// Error message from the last run, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectorMeta {
    /// Fresh metadata for a newly configured block.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            status: CollectorStatus::Active,
            last_run: None,
            error: None,
        }
    }
}

impl Default for CollectorMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Mobile platform a crash-monitoring app is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

/// Credentials for the error-tracking provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SentryConfig {
    #[serde(flatten)]
    pub meta: CollectorMeta,
    /// Organization slug the stats endpoint is scoped to.
    pub organization_slug: String,
    /// Project slug within the organization.
    pub project_slug: String,
    /// API auth token.
    pub auth_token: String,
    /// Base URL override for self-hosted installations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl SentryConfig {
    /// Checks that all required credential fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.organization_slug.is_empty() {
            return Err("organization slug is required".to_string());
        }
        if self.project_slug.is_empty() {
            return Err("project slug is required".to_string());
        }
        if self.auth_token.is_empty() {
            return Err("auth token is required".to_string());
        }
        Ok(())
    }
}

/// Credentials for the session-replay provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClarityConfig {
    #[serde(flatten)]
    pub meta: CollectorMeta,
    /// Provider-side project identifier.
    pub project_id: String,
    /// Export API key.
    pub api_key: String,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ClarityConfig {
    /// Checks that all required credential fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.is_empty() {
            return Err("project ID is required".to_string());
        }
        if self.api_key.is_empty() {
            return Err("API key is required".to_string());
        }
        Ok(())
    }
}

/// Credentials for the mobile crash-monitoring provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmbraceConfig {
    #[serde(flatten)]
    pub meta: CollectorMeta,
    /// Provider-side application identifier.
    pub app_id: String,
    /// API key.
    pub api_key: String,
    /// Which mobile platform the app targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl EmbraceConfig {
    /// Checks that all required credential fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.app_id.is_empty() {
            return Err("app ID is required".to_string());
        }
        if self.api_key.is_empty() {
            return Err("API key is required".to_string());
        }
        Ok(())
    }
}

/// Credentials for the mobile app-analytics provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppMetricConfig {
    #[serde(flatten)]
    pub meta: CollectorMeta,
    /// Provider-side application identifier.
    pub application_id: String,
    /// API key.
    pub api_key: String,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Restricts which metric keys are emitted; `None` emits all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
}

impl AppMetricConfig {
    /// Checks that all required credential fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.application_id.is_empty() {
            return Err("application ID is required".to_string());
        }
        if self.api_key.is_empty() {
            return Err("API key is required".to_string());
        }
        Ok(())
    }
}

/// A user-defined project with its enabled providers and credentials.
///
/// Created and mutated only by the management API; the scheduler reads
/// projects but never writes back to them (snapshots live in separate
/// columns on the same record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Project {
    /// Stable project identity.
    pub id: ProjectId,
    /// Display name.
    pub name: String,
    /// Human-assigned key, unique across projects.
    pub key: String,
    /// Owning user.
    pub created_by: UserId,
    /// Whether the scheduler should collect for this project.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Ordered list of enabled provider tags.
    pub providers: Vec<ProviderKind>,

    /// Sentry credentials; required when `providers` contains `sentry`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentry_config: Option<SentryConfig>,
    /// Clarity credentials; required when `providers` contains `clarity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarity_config: Option<ClarityConfig>,
    /// Embrace credentials; required when `providers` contains `embrace`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embrace_config: Option<EmbraceConfig>,
    /// AppMetric credentials; required when `providers` contains `appmetric`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_metric_config: Option<AppMetricConfig>,
}

impl Project {
    /// Returns `true` if the given provider tag is in the enabled list.
    #[must_use]
    pub fn provider_enabled(&self, kind: ProviderKind) -> bool {
        self.providers.contains(&kind)
    }

    /// Validates the profile fields: non-empty name, alphanumeric key.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate_profile(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("project name must not be empty".to_string());
        }
        if self.key.is_empty() || !self.key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("project key must be non-empty and alphanumeric".to_string());
        }
        Ok(())
    }

    /// Validates the enabled-provider invariant: every enabled tag must
    /// carry a complete configuration block. A block present without its
    /// tag is allowed (it is simply ignored).
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate_provider_configs(&self) -> Result<(), String> {
        for kind in &self.providers {
            match kind {
                ProviderKind::Sentry => match &self.sentry_config {
                    Some(config) => config.validate().map_err(|e| format!("sentry: {e}"))?,
                    None => return Err("sentry is enabled but sentry_config is missing".to_string()),
                },
                ProviderKind::Clarity => match &self.clarity_config {
                    Some(config) => config.validate().map_err(|e| format!("clarity: {e}"))?,
                    None => {
                        return Err("clarity is enabled but clarity_config is missing".to_string());
                    }
                },
                ProviderKind::Embrace => match &self.embrace_config {
                    Some(config) => config.validate().map_err(|e| format!("embrace: {e}"))?,
                    None => {
                        return Err("embrace is enabled but embrace_config is missing".to_string());
                    }
                },
                ProviderKind::AppMetric => match &self.app_metric_config {
                    Some(config) => config.validate().map_err(|e| format!("appmetric: {e}"))?,
                    None => {
                        return Err(
                            "appmetric is enabled but app_metric_config is missing".to_string()
                        );
                    }
                },
            }
        }
        Ok(())
    }

    /// Validates profile fields and provider configuration blocks together.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        self.validate_profile()?;
        self.validate_provider_configs()
    }
}

// ── Management API Inputs ───────────────────────────────────────────────

/// Sentry credentials as supplied by the management API. The bookkeeping
/// record is stamped server-side when the block is applied.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SentryConfigInput {
    pub organization_slug: String,
    pub project_slug: String,
    pub auth_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl SentryConfigInput {
    /// Converts into a stored block with fresh bookkeeping.
    #[must_use]
    pub fn into_config(self) -> SentryConfig {
        SentryConfig {
            meta: CollectorMeta::new(),
            organization_slug: self.organization_slug,
            project_slug: self.project_slug,
            auth_token: self.auth_token,
            host: self.host,
        }
    }
}

/// Clarity credentials as supplied by the management API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClarityConfigInput {
    pub project_id: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ClarityConfigInput {
    /// Converts into a stored block with fresh bookkeeping.
    #[must_use]
    pub fn into_config(self) -> ClarityConfig {
        ClarityConfig {
            meta: CollectorMeta::new(),
            project_id: self.project_id,
            api_key: self.api_key,
            host: self.host,
        }
    }
}

/// Embrace credentials as supplied by the management API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmbraceConfigInput {
    pub app_id: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl EmbraceConfigInput {
    /// Converts into a stored block with fresh bookkeeping.
    #[must_use]
    pub fn into_config(self) -> EmbraceConfig {
        EmbraceConfig {
            meta: CollectorMeta::new(),
            app_id: self.app_id,
            api_key: self.api_key,
            platform: self.platform,
            host: self.host,
        }
    }
}

/// AppMetric credentials as supplied by the management API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppMetricConfigInput {
    pub application_id: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
}

impl AppMetricConfigInput {
    /// Converts into a stored block with fresh bookkeeping.
    #[must_use]
    pub fn into_config(self) -> AppMetricConfig {
        AppMetricConfig {
            meta: CollectorMeta::new(),
            application_id: self.application_id,
            api_key: self.api_key,
            host: self.host,
            metrics: self.metrics,
        }
    }
}

/// Body of `POST /api/projects`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProjectInput {
    /// Display name.
    pub name: String,
    /// Human-assigned key, unique across projects.
    pub key: String,
    /// Enabled provider tags; each must come with its configuration block.
    pub providers: Vec<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentry_config: Option<SentryConfigInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarity_config: Option<ClarityConfigInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embrace_config: Option<EmbraceConfigInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_metric_config: Option<AppMetricConfigInput>,
}

/// Body of `PUT /api/projects/{key}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProjectInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<ProviderKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentry_config: Option<SentryConfigInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarity_config: Option<ClarityConfigInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embrace_config: Option<EmbraceConfigInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_metric_config: Option<AppMetricConfigInput>,
}
