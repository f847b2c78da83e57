//! Constructs collectors from a project's provider configuration blocks.

use super::{
    AppMetricCollector, ClarityCollector, CollectorError, EmbraceCollector, ProviderCollector,
    SentryCollector, build_http_client,
};
use crate::domain::{Project, ProviderKind};

/// Pure collector constructor.
///
/// Holds the HTTP client shared by every collector it builds; per-request
/// timeouts live on the client, so sharing the connection pool does not
/// couple requests to one another. Construction performs no I/O.
#[derive(Debug, Clone)]
pub struct CollectorFactory {
    client: reqwest::Client,
}

impl CollectorFactory {
    /// Creates a factory with a freshly built HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Init`] if client construction fails.
    pub fn new() -> Result<Self, CollectorError> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    /// Builds the collector for the given provider tag from the project's
    /// configuration block.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::MissingConfig`] when the project has no
    /// block for that tag.
    pub fn build(
        &self,
        project: &Project,
        kind: ProviderKind,
    ) -> Result<ProviderCollector, CollectorError> {
        match kind {
            ProviderKind::Sentry => project
                .sentry_config
                .clone()
                .map(|config| {
                    ProviderCollector::Sentry(SentryCollector::new(config, self.client.clone()))
                })
                .ok_or(CollectorError::MissingConfig(kind)),
            ProviderKind::Clarity => project
                .clarity_config
                .clone()
                .map(|config| {
                    ProviderCollector::Clarity(ClarityCollector::new(config, self.client.clone()))
                })
                .ok_or(CollectorError::MissingConfig(kind)),
            ProviderKind::Embrace => project
                .embrace_config
                .clone()
                .map(|config| {
                    ProviderCollector::Embrace(EmbraceCollector::new(config, self.client.clone()))
                })
                .ok_or(CollectorError::MissingConfig(kind)),
            ProviderKind::AppMetric => project
                .app_metric_config
                .clone()
                .map(|config| {
                    ProviderCollector::AppMetric(AppMetricCollector::new(
                        config,
                        self.client.clone(),
                    ))
                })
                .ok_or(CollectorError::MissingConfig(kind)),
        }
    }
}
