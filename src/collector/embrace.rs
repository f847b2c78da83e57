//! Collector for the mobile crash-monitoring provider.
//!
//! The per-app metrics endpoint returns a flat object; fields are renamed
//! with the provider prefix, plus a derived crashes-per-user rate.

use std::sync::RwLock;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{CollectorError, CollectorState, fetch_json, read_state, run_collection};
use crate::domain::{CollectorMeta, EmbraceConfig, MetricMap, MetricValue};

const DEFAULT_HOST: &str = "https://api.embrace.io/v1";

/// Decoded per-app metrics payload.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AppStats {
    #[serde(default)]
    crashes: i64,
    #[serde(default)]
    anrs: i64,
    #[serde(rename = "networkCalls", default)]
    network_calls: i64,
    #[serde(rename = "errorRate", default)]
    error_rate: f64,
    #[serde(rename = "sessionCount", default)]
    session_count: i64,
    #[serde(rename = "userCount", default)]
    user_count: i64,
}

/// Collector for one configured Embrace app.
#[derive(Debug)]
pub struct EmbraceCollector {
    config: EmbraceConfig,
    client: reqwest::Client,
    state: RwLock<CollectorState>,
}

impl EmbraceCollector {
    /// Creates a collector from the project's configuration block.
    #[must_use]
    pub fn new(config: EmbraceConfig, client: reqwest::Client) -> Self {
        let state = RwLock::new(CollectorState::new(config.meta.clone()));
        Self {
            config,
            client,
            state,
        }
    }

    /// Checks that all required credential fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Invalid`] naming the missing field.
    pub fn validate(&self) -> Result<(), CollectorError> {
        self.config.validate().map_err(CollectorError::Invalid)
    }

    /// Fetches the app's crash metrics and updates the metric map.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Cancelled`] when `cancel` fires first;
    /// network, status, and decode failures otherwise.
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<(), CollectorError> {
        let base = self.config.host.as_deref().unwrap_or(DEFAULT_HOST);
        let url = format!("{base}/apps/{}/metrics", self.config.app_id);
        let fetch = fetch_json::<AppStats>(&self.client, &url, &self.config.api_key, cancel);
        run_collection(&self.state, fetch, normalize).await
    }

    /// Returns a copy of the last successful metric map.
    #[must_use]
    pub fn metrics(&self) -> MetricMap {
        read_state(&self.state).metrics.clone()
    }

    /// Returns the current bookkeeping record.
    #[must_use]
    pub fn meta(&self) -> CollectorMeta {
        read_state(&self.state).meta.clone()
    }
}

/// Renames the flat payload with the provider prefix. The derived
/// crashes-per-user key is omitted entirely when the user count is zero.
#[allow(clippy::cast_precision_loss)]
fn normalize(stats: &AppStats) -> MetricMap {
    let mut metrics = MetricMap::new();
    metrics.insert(
        "embrace_crashes_total".to_string(),
        MetricValue::Integer(stats.crashes),
    );
    metrics.insert(
        "embrace_anrs_total".to_string(),
        MetricValue::Integer(stats.anrs),
    );
    metrics.insert(
        "embrace_network_calls".to_string(),
        MetricValue::Integer(stats.network_calls),
    );
    metrics.insert(
        "embrace_error_rate".to_string(),
        MetricValue::Float(stats.error_rate),
    );
    metrics.insert(
        "embrace_sessions_total".to_string(),
        MetricValue::Integer(stats.session_count),
    );
    metrics.insert(
        "embrace_users_total".to_string(),
        MetricValue::Integer(stats.user_count),
    );
    if stats.user_count != 0 {
        metrics.insert(
            "embrace_crashes_per_user".to_string(),
            MetricValue::Float(stats.crashes as f64 / stats.user_count as f64),
        );
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_fields_are_renamed_with_prefix() {
        let stats = AppStats {
            crashes: 4,
            anrs: 2,
            network_calls: 100,
            error_rate: 0.1,
            session_count: 50,
            user_count: 8,
        };
        let metrics = normalize(&stats);
        assert_eq!(
            metrics.get("embrace_crashes_total"),
            Some(&MetricValue::Integer(4))
        );
        assert_eq!(
            metrics.get("embrace_error_rate"),
            Some(&MetricValue::Float(0.1))
        );
        assert_eq!(
            metrics.get("embrace_crashes_per_user"),
            Some(&MetricValue::Float(0.5))
        );
    }

    #[test]
    fn zero_users_omits_crashes_per_user() {
        let stats = AppStats {
            crashes: 4,
            user_count: 0,
            ..AppStats::default()
        };
        let metrics = normalize(&stats);
        assert!(!metrics.contains_key("embrace_crashes_per_user"));
        assert_eq!(
            metrics.get("embrace_crashes_total"),
            Some(&MetricValue::Integer(4))
        );
    }
}
