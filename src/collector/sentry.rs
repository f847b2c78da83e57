//! Collector for the error-tracking provider's `stats_v2` endpoint.
//!
//! The endpoint groups event counts by category; the response carries the
//! groups in a fixed order, so totals are projected positionally into
//! stable metric names.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{CollectorError, CollectorState, fetch_json, read_state, run_collection};
use crate::domain::{CollectorMeta, MetricMap, MetricValue, SentryConfig};

const DEFAULT_HOST: &str = "https://sentry.io";

/// Metric names by group position in the stats response.
const METRIC_NAMES: [&str; 7] = [
    "sentry_errors_total",
    "sentry_spans_total",
    "sentry_profiles_total",
    "sentry_transactions_total",
    "sentry_replays_total",
    "sentry_sessions_total",
    "sentry_sessions_indexed_total",
];

/// Decoded `stats_v2` response.
#[derive(Debug, Deserialize)]
pub(crate) struct StatsResponse {
    #[serde(default)]
    groups: Vec<Group>,
}

#[derive(Debug, Default, Deserialize)]
struct Group {
    #[serde(default)]
    totals: Totals,
}

#[derive(Debug, Default, Deserialize)]
struct Totals {
    #[serde(rename = "sum(quantity)")]
    sum_quantity: Option<i64>,
}

/// Collector for one configured Sentry project.
#[derive(Debug)]
pub struct SentryCollector {
    config: SentryConfig,
    client: reqwest::Client,
    state: RwLock<CollectorState>,
}

impl SentryCollector {
    /// Creates a collector from the project's configuration block.
    #[must_use]
    pub fn new(config: SentryConfig, client: reqwest::Client) -> Self {
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

    /// Fetches today's event counts and updates the metric map.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Cancelled`] when `cancel` fires first;
    /// network, status, and decode failures otherwise.
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<(), CollectorError> {
        let url = stats_url(&self.config, Utc::now());
        let fetch = fetch_json::<StatsResponse>(&self.client, &url, &self.config.auth_token, cancel);
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

/// Builds the stats query for the window from the start of the current UTC
/// day until now, scoped to the configured organization and project.
fn stats_url(config: &SentryConfig, now: DateTime<Utc>) -> String {
    let base = config.host.as_deref().unwrap_or(DEFAULT_HOST);
    let end = now.timestamp();
    let start = end - end.rem_euclid(86_400);
    format!(
        "{base}/api/0/organizations/{org}/stats_v2/?start={start}&end={end}\
         &field=sum(quantity)&project_id={project}&groupBy=category&interval=1d",
        org = config.organization_slug,
        project = config.project_slug,
    )
}

/// Projects group totals into metric names by position. Positions missing
/// from the response are omitted rather than zeroed.
fn normalize(stats: &StatsResponse) -> MetricMap {
    METRIC_NAMES
        .iter()
        .zip(&stats.groups)
        .filter_map(|(name, group)| {
            group
                .totals
                .sum_quantity
                .map(|value| ((*name).to_string(), MetricValue::Integer(value)))
        })
        .collect()
}
