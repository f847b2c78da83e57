//! Project DTOs.
//!
//! Create/update request bodies live in the domain layer
//! ([`crate::domain::CreateProjectInput`], [`crate::domain::UpdateProjectInput`])
//! and project responses serialize the domain [`crate::domain::Project`]
//! directly; only the metrics view needs its own shape.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ProviderKind, Snapshot};

/// Response body for `GET /api/projects/{key}/metrics`: the latest
/// snapshot per enabled provider. Providers that have never collected are
/// absent.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectMetricsResponse {
    /// Project key echoed from the request.
    pub key: String,
    /// Latest snapshot per provider tag.
    pub snapshots: BTreeMap<ProviderKind, Snapshot>,
}
