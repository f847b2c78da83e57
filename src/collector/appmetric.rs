//! Collector for the mobile app-analytics provider.
//!
//! The per-application metrics endpoint returns a flat object; fields are
//! renamed with the provider prefix. An optional filter list on the
//! configuration block restricts which keys are emitted.

use std::sync::RwLock;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{CollectorError, CollectorState, fetch_json, read_state, run_collection};
use crate::domain::{AppMetricConfig, CollectorMeta, MetricMap, MetricValue};

const DEFAULT_HOST: &str = "https://api.appmetrics.io/v1";

/// Decoded per-application metrics payload.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AppMetricStats {
    #[serde(rename = "responseTime", default)]
    response_time: f64,
    #[serde(rename = "requestCount", default)]
    request_count: i64,
    #[serde(rename = "errorCount", default)]
    error_count: i64,
    #[serde(rename = "cpuUsage", default)]
    cpu_usage: f64,
    #[serde(rename = "memoryUsage", default)]
    memory_usage: f64,
    #[serde(rename = "activeUsers", default)]
    active_users: i64,
    #[serde(rename = "databaseCalls", default)]
    database_calls: i64,
}

/// Collector for one configured application.
#[derive(Debug)]
pub struct AppMetricCollector {
    config: AppMetricConfig,
    client: reqwest::Client,
    state: RwLock<CollectorState>,
}

impl AppMetricCollector {
    /// Creates a collector from the project's configuration block.
    #[must_use]
    pub fn new(config: AppMetricConfig, client: reqwest::Client) -> Self {
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

    /// Fetches the application's metrics and updates the metric map.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Cancelled`] when `cancel` fires first;
    /// network, status, and decode failures otherwise.
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<(), CollectorError> {
        let base = self.config.host.as_deref().unwrap_or(DEFAULT_HOST);
        let url = format!("{base}/applications/{}/metrics", self.config.application_id);
        let fetch = fetch_json::<AppMetricStats>(&self.client, &url, &self.config.api_key, cancel);
        run_collection(&self.state, fetch, |stats| {
            normalize(stats, self.config.metrics.as_deref())
        })
        .await
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

/// Renames the flat payload with the provider prefix, keeping only keys
/// allowed by the filter (`None` keeps everything). The derived error-rate
/// key is omitted entirely when the request count is zero.
#[allow(clippy::cast_precision_loss)]
fn normalize(stats: &AppMetricStats, filter: Option<&[String]>) -> MetricMap {
    let include = |key: &str| filter.is_none_or(|allowed| allowed.iter().any(|m| m == key));

    let mut metrics = MetricMap::new();
    let mut put = |key: &str, value: MetricValue| {
        if include(key) {
            metrics.insert(key.to_string(), value);
        }
    };

    put(
        "app_response_time_ms",
        MetricValue::Float(stats.response_time),
    );
    put("app_requests_total", MetricValue::Integer(stats.request_count));
    put("app_errors_total", MetricValue::Integer(stats.error_count));
    put("app_cpu_usage_percent", MetricValue::Float(stats.cpu_usage));
    put(
        "app_memory_usage_bytes",
        MetricValue::Float(stats.memory_usage),
    );
    put("app_active_users", MetricValue::Integer(stats.active_users));
    put(
        "app_database_calls",
        MetricValue::Integer(stats.database_calls),
    );
    if stats.request_count != 0 {
        put(
            "app_error_rate",
            MetricValue::Float(stats.error_count as f64 / stats.request_count as f64),
        );
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> AppMetricStats {
        AppMetricStats {
            response_time: 120.0,
            request_count: 200,
            error_count: 10,
            cpu_usage: 35.5,
            memory_usage: 1024.0,
            active_users: 40,
            database_calls: 300,
        }
    }

    #[test]
    fn unfiltered_normalization_emits_all_keys() {
        let metrics = normalize(&stats(), None);
        assert_eq!(metrics.len(), 8);
        assert_eq!(
            metrics.get("app_error_rate"),
            Some(&MetricValue::Float(0.05))
        );
    }

    #[test]
    fn zero_requests_omits_error_rate() {
        let stats = AppMetricStats {
            error_count: 10,
            request_count: 0,
            ..AppMetricStats::default()
        };
        let metrics = normalize(&stats, None);
        assert!(!metrics.contains_key("app_error_rate"));
        assert_eq!(
            metrics.get("app_errors_total"),
            Some(&MetricValue::Integer(10))
        );
    }

    #[test]
    fn filter_restricts_emitted_keys() {
        let filter = vec![
            "app_requests_total".to_string(),
            "app_error_rate".to_string(),
        ];
        let metrics = normalize(&stats(), Some(&filter));
        assert_eq!(metrics.len(), 2);
        assert!(metrics.contains_key("app_requests_total"));
        assert!(metrics.contains_key("app_error_rate"));
        assert!(!metrics.contains_key("app_cpu_usage_percent"));
    }

    #[test]
    fn empty_filter_emits_nothing() {
        let metrics = normalize(&stats(), Some(&[]));
        assert!(metrics.is_empty());
    }
}
