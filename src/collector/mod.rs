//! Provider collectors: one implementation per supported analytics service.
//!
//! Every collector exposes the same three-operation contract:
//!
//! - `validate`: pure check that required credential fields are non-empty,
//! - `collect`: one HTTP GET against the provider API, normalized into a
//!   flat metric map held on the collector,
//! - `metrics`: a copy of the last successful metric map, never touching
//!   the network.
//!
//! The set of providers is closed, so [`ProviderCollector`] is a tagged
//! enum with one variant per service rather than a trait object.

pub mod appmetric;
pub mod clarity;
pub mod embrace;
pub mod factory;
pub mod sentry;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::domain::{CollectorMeta, CollectorStatus, MetricMap, ProviderKind};

pub use appmetric::AppMetricCollector;
pub use clarity::ClarityCollector;
pub use embrace::EmbraceCollector;
pub use factory::CollectorFactory;
pub use sentry::SentryCollector;

/// Per-request timeout, applied independently of caller cancellation.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum idle connections kept per host.
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// How long an idle connection is kept around.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors observable on the collector contract.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {0}")]
    Init(String),

    /// Required configuration fields are missing or empty.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The project has no configuration block for the requested provider.
    #[error("{0} configuration is missing")]
    MissingConfig(ProviderKind),

    /// Transport-level failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered outside the 200–299 range.
    #[error("unexpected status code: {0}")]
    RemoteStatus(u16),

    /// The response body was not the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The caller aborted the collection.
    #[error("collection cancelled")]
    Cancelled,
}

/// Builds the HTTP client shared by all collectors.
///
/// The 10-second request timeout lives on the client, so it applies to
/// every collection independently of the caller's cancellation signal.
///
/// # Errors
///
/// Returns [`CollectorError::Init`] if the TLS backend cannot be set up.
pub fn build_http_client() -> Result<reqwest::Client, CollectorError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .user_agent(concat!("insight-aggregator/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CollectorError::Init(e.to_string()))
}

/// Performs one authenticated GET and decodes the JSON body.
///
/// The body is read as text first so that transport failures
/// ([`CollectorError::Network`]) and malformed payloads
/// ([`CollectorError::Decode`]) stay distinguishable. Cancellation is
/// checked at both suspension points; a cancelled fetch drops the in-flight
/// request.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    bearer_token: &str,
    cancel: &CancellationToken,
) -> Result<T, CollectorError> {
    let request = client
        .get(url)
        .bearer_auth(bearer_token)
        .header(ACCEPT, "application/json");

    let response = tokio::select! {
        () = cancel.cancelled() => return Err(CollectorError::Cancelled),
        result = request.send() => result?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(CollectorError::RemoteStatus(status.as_u16()));
    }

    let body = tokio::select! {
        () = cancel.cancelled() => return Err(CollectorError::Cancelled),
        result = response.text() => result?,
    };

    Ok(serde_json::from_str(&body)?)
}

/// Mutable state shared by every collector: the latest metric map plus the
/// bookkeeping record carried over from the configuration block.
///
/// Read-mostly: `collect` is the sole writer and swaps the whole map, so
/// readers observe either the previous or the new map, never a partial one.
#[derive(Debug)]
pub(crate) struct CollectorState {
    metrics: MetricMap,
    meta: CollectorMeta,
}

impl CollectorState {
    pub(crate) fn new(meta: CollectorMeta) -> Self {
        Self {
            metrics: MetricMap::new(),
            meta,
        }
    }

    fn record_success(&mut self, metrics: MetricMap) {
        self.metrics = metrics;
        self.meta.status = CollectorStatus::Active;
        self.meta.last_run = Some(Utc::now());
        self.meta.error = None;
    }

    fn record_failure(&mut self, message: String) {
        self.meta.status = CollectorStatus::Error;
        self.meta.error = Some(message);
    }
}

/// Read lock that survives poisoning: the map is swapped whole, so a
/// panicking writer cannot leave it partially updated.
pub(crate) fn read_state(lock: &RwLock<CollectorState>) -> RwLockReadGuard<'_, CollectorState> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_state(lock: &RwLock<CollectorState>) -> RwLockWriteGuard<'_, CollectorState> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Shared collect flow: await the fetch, normalize on success, record the
/// failure message on the bookkeeping record otherwise.
///
/// Cancellation leaves the state untouched.
pub(crate) async fn run_collection<T>(
    state: &RwLock<CollectorState>,
    fetch: impl Future<Output = Result<T, CollectorError>>,
    normalize: impl FnOnce(&T) -> MetricMap,
) -> Result<(), CollectorError> {
    match fetch.await {
        Ok(decoded) => {
            let metrics = normalize(&decoded);
            write_state(state).record_success(metrics);
            Ok(())
        }
        Err(CollectorError::Cancelled) => Err(CollectorError::Cancelled),
        Err(err) => {
            write_state(state).record_failure(err.to_string());
            Err(err)
        }
    }
}

/// A configured collector for one (project, provider) pair.
///
/// Constructed by [`CollectorFactory::build`]; dispatches each contract
/// operation to the matching provider implementation.
#[derive(Debug)]
pub enum ProviderCollector {
    Sentry(SentryCollector),
    Clarity(ClarityCollector),
    Embrace(EmbraceCollector),
    AppMetric(AppMetricCollector),
}

impl ProviderCollector {
    /// The provider tag this collector polls.
    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Sentry(_) => ProviderKind::Sentry,
            Self::Clarity(_) => ProviderKind::Clarity,
            Self::Embrace(_) => ProviderKind::Embrace,
            Self::AppMetric(_) => ProviderKind::AppMetric,
        }
    }

    /// Checks that required credential fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Invalid`] naming the missing field.
    pub fn validate(&self) -> Result<(), CollectorError> {
        match self {
            Self::Sentry(c) => c.validate(),
            Self::Clarity(c) => c.validate(),
            Self::Embrace(c) => c.validate(),
            Self::AppMetric(c) => c.validate(),
        }
    }

    /// Performs one collection against the provider API.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Cancelled`] when `cancel` fires first;
    /// network, status, and decode failures otherwise.
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<(), CollectorError> {
        match self {
            Self::Sentry(c) => c.collect(cancel).await,
            Self::Clarity(c) => c.collect(cancel).await,
            Self::Embrace(c) => c.collect(cancel).await,
            Self::AppMetric(c) => c.collect(cancel).await,
        }
    }

    /// Returns a copy of the last successful metric map; empty if no
    /// collection has succeeded yet.
    #[must_use]
    pub fn metrics(&self) -> MetricMap {
        match self {
            Self::Sentry(c) => c.metrics(),
            Self::Clarity(c) => c.metrics(),
            Self::Embrace(c) => c.metrics(),
            Self::AppMetric(c) => c.metrics(),
        }
    }

    /// Returns the current bookkeeping record (status, last run, error).
    #[must_use]
    pub fn meta(&self) -> CollectorMeta {
        match self {
            Self::Sentry(c) => c.meta(),
            Self::Clarity(c) => c.meta(),
            Self::Embrace(c) => c.meta(),
            Self::AppMetric(c) => c.meta(),
        }
    }
}
