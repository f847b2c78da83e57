//! Metric snapshots: the latest normalized metric map per (project, provider).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ProviderKind;

/// A single normalized metric value.
///
/// Providers report a mix of integer counters, floating-point rates, and
/// stringly-typed counts; values are stored as delivered rather than coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum MetricValue {
    /// Integer counter (e.g. total crashes).
    Integer(i64),
    /// Floating-point rate or percentage.
    Float(f64),
    /// String-encoded value passed through from the provider.
    Text(String),
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Flat mapping from metric name to value.
pub type MetricMap = BTreeMap<String, MetricValue>;

/// Type-safe snapshot identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SnapshotId(uuid::Uuid);

impl SnapshotId {
    /// Creates a new random `SnapshotId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The latest metric map collected for one (project, provider) pair.
///
/// Created on the first successful collection and overwritten in place on
/// every subsequent one; `last_run` never moves backwards for a given pair
/// because same-pair writes are serialized by the scheduler's tick + drain
/// discipline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Snapshot {
    /// Snapshot identity, regenerated on every store.
    pub id: SnapshotId,
    /// Which provider produced the metrics.
    pub provider: ProviderKind,
    /// When the collection ran.
    pub last_run: DateTime<Utc>,
    /// Normalized metric name → value mapping.
    pub metrics: MetricMap,
}

impl Snapshot {
    /// Builds a snapshot stamped with the current time.
    #[must_use]
    pub fn now(provider: ProviderKind, metrics: MetricMap) -> Self {
        Self {
            id: SnapshotId::new(),
            provider,
            last_run: Utc::now(),
            metrics,
        }
    }

    /// Validates the snapshot before persistence.
    ///
    /// The provider tag is already constrained by the type; the metric map
    /// must be non-empty (an empty map means the collector never succeeded
    /// and there is nothing worth overwriting a previous snapshot with).
    ///
    /// # Errors
    ///
    /// Returns a description of the violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.metrics.is_empty() {
            return Err(format!("{} snapshot has an empty metric map", self.provider));
        }
        Ok(())
    }
}
