//! Domain layer: projects, provider tags, and metric snapshots.
//!
//! This module contains the core data model: project identity and provider
//! configuration blocks, the closed set of supported provider tags, and the
//! snapshot shape persisted per (project, provider) pair.

pub mod project;
pub mod provider;
pub mod snapshot;

pub use project::{
    AppMetricConfig, AppMetricConfigInput, ClarityConfig, ClarityConfigInput, CollectorMeta,
    CollectorStatus, CreateProjectInput, EmbraceConfig, EmbraceConfigInput, Platform, Project,
    ProjectId, SentryConfig, SentryConfigInput, UpdateProjectInput, UserId,
};
pub use provider::{ProviderKind, UnknownProvider};
pub use snapshot::{MetricMap, MetricValue, Snapshot, SnapshotId};
