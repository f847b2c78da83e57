//! Collector for the session-replay provider's live-insights export.
//!
//! The export is an array of named metrics, each carrying a list of
//! `information` records; only the first record of each metric is
//! meaningful for project-level totals.

use std::sync::RwLock;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{CollectorError, CollectorState, fetch_json, read_state, run_collection};
use crate::domain::{ClarityConfig, CollectorMeta, MetricMap, MetricValue};

const DEFAULT_HOST: &str = "https://www.clarity.ms";

/// One named metric in the live-insights export.
#[derive(Debug, Deserialize)]
pub(crate) struct MetricEntry {
    #[serde(rename = "metricName")]
    metric_name: String,
    #[serde(default)]
    information: Vec<Information>,
}

#[derive(Debug, Default, Deserialize)]
struct Information {
    #[serde(rename = "totalSessionCount")]
    total_session_count: Option<String>,
    #[serde(rename = "totalBotSessionCount")]
    total_bot_session_count: Option<String>,
    #[serde(rename = "distinctUserCount")]
    distinct_user_count: Option<String>,
    #[serde(rename = "pagesPerSessionPercentage")]
    pages_per_session: Option<f64>,
    #[serde(rename = "averageScrollDepth")]
    average_scroll_depth: Option<f64>,
    #[serde(rename = "totalTime")]
    total_time: Option<String>,
    #[serde(rename = "activeTime")]
    active_time: Option<String>,
    #[serde(rename = "subTotal")]
    sub_total: Option<String>,
}

/// Behavioral metrics extracted from `information[0].subTotal` of the
/// matching export entry.
const SUB_TOTAL_METRICS: [(&str, &str); 6] = [
    ("clarity_dead_clicks", "DeadClickCount"),
    ("clarity_rage_clicks", "RageClickCount"),
    ("clarity_excessive_scrolls", "ExcessiveScroll"),
    ("clarity_quickback_clicks", "QuickbackClick"),
    ("clarity_script_errors", "ScriptErrorCount"),
    ("clarity_error_clicks", "ErrorClickCount"),
];

/// Collector for one configured Clarity project.
#[derive(Debug)]
pub struct ClarityCollector {
    config: ClarityConfig,
    client: reqwest::Client,
    state: RwLock<CollectorState>,
}

impl ClarityCollector {
    /// Creates a collector from the project's configuration block.
    #[must_use]
    pub fn new(config: ClarityConfig, client: reqwest::Client) -> Self {
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

    /// Fetches the last day of live insights and updates the metric map.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Cancelled`] when `cancel` fires first;
    /// network, status, and decode failures otherwise.
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<(), CollectorError> {
        let base = self.config.host.as_deref().unwrap_or(DEFAULT_HOST);
        let url = format!("{base}/export-data/api/v1/project-live-insights?numOfDays=1");
        let fetch =
            fetch_json::<Vec<MetricEntry>>(&self.client, &url, &self.config.api_key, cancel);
        run_collection(&self.state, fetch, |entries| normalize(entries)).await
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

fn first_info<'a>(entries: &'a [MetricEntry], name: &str) -> Option<&'a Information> {
    entries
        .iter()
        .find(|entry| entry.metric_name == name)
        .and_then(|entry| entry.information.first())
}

fn insert_text(metrics: &mut MetricMap, key: &str, value: Option<&String>) {
    if let Some(value) = value {
        metrics.insert(key.to_string(), MetricValue::Text(value.clone()));
    }
}

fn insert_float(metrics: &mut MetricMap, key: &str, value: Option<f64>) {
    if let Some(value) = value {
        metrics.insert(key.to_string(), MetricValue::Float(value));
    }
}

/// Extracts the named (metric, field) pairs from the export. Metrics
/// missing from the export produce absent keys, never nulls.
fn normalize(entries: &[MetricEntry]) -> MetricMap {
    let mut metrics = MetricMap::new();

    if let Some(info) = first_info(entries, "Traffic") {
        insert_text(
            &mut metrics,
            "clarity_total_sessions",
            info.total_session_count.as_ref(),
        );
        insert_text(
            &mut metrics,
            "clarity_total_bot_sessions",
            info.total_bot_session_count.as_ref(),
        );
        insert_text(
            &mut metrics,
            "clarity_distinct_users",
            info.distinct_user_count.as_ref(),
        );
        insert_float(
            &mut metrics,
            "clarity_pages_per_session",
            info.pages_per_session,
        );
    }

    if let Some(info) = first_info(entries, "ScrollDepth") {
        insert_float(
            &mut metrics,
            "clarity_scroll_depth_avg",
            info.average_scroll_depth,
        );
    }

    if let Some(info) = first_info(entries, "EngagementTime") {
        insert_text(
            &mut metrics,
            "clarity_total_engagement_time",
            info.total_time.as_ref(),
        );
        insert_text(
            &mut metrics,
            "clarity_active_engagement_time",
            info.active_time.as_ref(),
        );
    }

    for (key, metric_name) in SUB_TOTAL_METRICS {
        if let Some(info) = first_info(entries, metric_name) {
            insert_text(&mut metrics, key, info.sub_total.as_ref());
        }
    }

    metrics
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::collector::write_state;

    fn decode(json: &str) -> Vec<MetricEntry> {
        match serde_json::from_str(json) {
            Ok(entries) => entries,
            Err(e) => panic!("decode failed: {e}"),
        }
    }

    #[test]
    fn traffic_fields_are_extracted() {
        let entries = decode(
            r#"[{"metricName":"Traffic","information":[{"totalSessionCount":"42","distinctUserCount":"7"}]}]"#,
        );
        let metrics = normalize(&entries);
        assert_eq!(
            metrics.get("clarity_total_sessions"),
            Some(&MetricValue::Text("42".to_string()))
        );
        assert_eq!(
            metrics.get("clarity_distinct_users"),
            Some(&MetricValue::Text("7".to_string()))
        );
        assert!(!metrics.contains_key("clarity_total_bot_sessions"));
    }

    #[test]
    fn behavioral_sub_totals_use_their_own_entries() {
        let entries = decode(
            r#"[
                {"metricName":"DeadClickCount","information":[{"subTotal":"3"}]},
                {"metricName":"RageClickCount","information":[{"subTotal":"1"}]},
                {"metricName":"ScrollDepth","information":[{"averageScrollDepth":61.5}]}
            ]"#,
        );
        let metrics = normalize(&entries);
        assert_eq!(
            metrics.get("clarity_dead_clicks"),
            Some(&MetricValue::Text("3".to_string()))
        );
        assert_eq!(
            metrics.get("clarity_rage_clicks"),
            Some(&MetricValue::Text("1".to_string()))
        );
        assert_eq!(
            metrics.get("clarity_scroll_depth_avg"),
            Some(&MetricValue::Float(61.5))
        );
    }

    #[test]
    fn missing_metrics_produce_absent_keys() {
        let metrics = normalize(&decode("[]"));
        assert!(metrics.is_empty());
    }

    #[test]
    fn entry_with_empty_information_is_skipped() {
        let entries = decode(r#"[{"metricName":"Traffic","information":[]}]"#);
        let metrics = normalize(&entries);
        assert!(metrics.is_empty());
    }

    #[test]
    fn metrics_returns_an_independent_copy() {
        let collector = ClarityCollector::new(
            ClarityConfig {
                meta: CollectorMeta::new(),
                project_id: "abc".to_string(),
                api_key: "k".to_string(),
                host: None,
            },
            reqwest::Client::new(),
        );

        let mut seeded = MetricMap::new();
        seeded.insert("clarity_total_sessions".to_string(), "42".into());
        write_state(&collector.state).record_success(seeded);

        let mut copy = collector.metrics();
        copy.insert("clarity_total_sessions".to_string(), "999".into());
        copy.insert("injected".to_string(), 1i64.into());

        let fresh = collector.metrics();
        assert_eq!(
            fresh.get("clarity_total_sessions"),
            Some(&MetricValue::Text("42".to_string()))
        );
        assert!(!fresh.contains_key("injected"));
    }

    #[test]
    fn metrics_is_empty_before_first_collection() {
        let collector = ClarityCollector::new(
            ClarityConfig {
                meta: CollectorMeta::new(),
                project_id: "abc".to_string(),
                api_key: "k".to_string(),
                host: None,
            },
            reqwest::Client::new(),
        );
        assert!(collector.metrics().is_empty());
    }

    #[test]
    fn successful_collection_marks_collector_active() {
        let collector = ClarityCollector::new(
            ClarityConfig {
                meta: CollectorMeta::new(),
                project_id: "abc".to_string(),
                api_key: "k".to_string(),
                host: None,
            },
            reqwest::Client::new(),
        );

        let mut metrics = MetricMap::new();
        metrics.insert("clarity_total_sessions".to_string(), "42".into());
        write_state(&collector.state).record_success(metrics);

        let meta = collector.meta();
        assert_eq!(meta.status, crate::domain::CollectorStatus::Active);
        assert!(meta.last_run.is_some());
        assert!(meta.error.is_none());
    }

    #[tokio::test]
    async fn failed_collection_records_error_status() {
        use tokio_util::sync::CancellationToken;

        // Nothing listens on the discard port, so the fetch fails fast.
        let collector = ClarityCollector::new(
            ClarityConfig {
                meta: CollectorMeta::new(),
                project_id: "abc".to_string(),
                api_key: "k".to_string(),
                host: Some("http://127.0.0.1:9".to_string()),
            },
            reqwest::Client::new(),
        );

        let result = collector.collect(&CancellationToken::new()).await;
        assert!(matches!(result, Err(CollectorError::Network(_))));

        let meta = collector.meta();
        assert_eq!(meta.status, crate::domain::CollectorStatus::Error);
        assert!(meta.error.is_some());
        assert!(collector.metrics().is_empty());
    }
}
