//! The collection driver: ticker loop, per-pass fan-out, and shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{CatalogError, ProjectCatalog, SnapshotStore, StoreError};
use crate::collector::{CollectorError, CollectorFactory};
use crate::domain::{Project, ProviderKind, Snapshot};

/// Snapshots younger than this are not re-collected (the staleness gate).
const SNAPSHOT_FRESH_HOURS: i64 = 2;

/// Scheduler knobs, read once at construction.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Ticker period between collection passes.
    pub collection_interval: Duration,
    /// Maximum number of collection jobs in flight at once.
    pub max_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collection_interval: Duration::from_secs(300),
            max_workers: 5,
        }
    }
}

/// Scheduler lifecycle, observable through [`Scheduler::subscribe_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, nothing running.
    Idle,
    /// Ticking; at most `max_workers` jobs active.
    Running,
    /// Stop signalled; the in-flight pass is draining, no new passes start.
    Stopping,
    /// Terminal: all work drained.
    Stopped,
}

/// Errors surfaced by the scheduler driver.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Catalog enumeration failed; the pass was aborted.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// One or more jobs in the pass failed. The pass itself completed.
    #[error("encountered {count} errors during collection")]
    Collection {
        /// Number of failed jobs.
        count: usize,
    },

    /// The driver's cancellation signal fired.
    #[error("scheduler cancelled")]
    Cancelled,
}

/// Counters for one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Jobs that fetched and stored a snapshot.
    pub collected: usize,
    /// Jobs skipped by the staleness gate.
    pub fresh: usize,
    /// Jobs that ended as no-ops (missing/invalid config, cancellation,
    /// project deleted mid-pass).
    pub skipped: usize,
    /// Jobs that failed.
    pub failed: usize,
}

impl PassSummary {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Collected => self.collected += 1,
            JobOutcome::Fresh => self.fresh += 1,
            JobOutcome::NoConfig
            | JobOutcome::InvalidConfig
            | JobOutcome::Cancelled
            | JobOutcome::ProjectGone => self.skipped += 1,
        }
    }
}

/// Terminal state of a single collection job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    /// A snapshot was collected and stored.
    Collected,
    /// The existing snapshot is younger than the staleness window.
    Fresh,
    /// The provider is enabled but its configuration block is null.
    NoConfig,
    /// The configuration block fails validation.
    InvalidConfig,
    /// Cancellation fired before or during the fetch.
    Cancelled,
    /// The project row disappeared before the store.
    ProjectGone,
}

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error("{provider} collection failed for project {project}: {source}")]
    Collector {
        project: String,
        provider: ProviderKind,
        source: CollectorError,
    },
    #[error("invalid {provider} snapshot for project {project}: {message}")]
    InvalidSnapshot {
        project: String,
        provider: ProviderKind,
        message: String,
    },
    #[error("failed to store {provider} snapshot for project {project}: {message}")]
    Store {
        project: String,
        provider: ProviderKind,
        message: String,
    },
}

/// Drives collection for every enabled (project, provider) pair at a fixed
/// cadence under a bounded concurrency budget.
pub struct Scheduler {
    config: SchedulerConfig,
    catalog: Arc<dyn ProjectCatalog>,
    store: Arc<dyn SnapshotStore>,
    factory: CollectorFactory,
    semaphore: Arc<Semaphore>,
    stop: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        catalog: Arc<dyn ProjectCatalog>,
        store: Arc<dyn SnapshotStore>,
        factory: CollectorFactory,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            config,
            catalog,
            store,
            factory,
            semaphore,
            stop: CancellationToken::new(),
            state,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Returns a receiver observing lifecycle transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Runs the collection loop: one immediate pass, then one pass per
    /// tick. Ticks that fire while a pass is still running are dropped,
    /// not queued.
    ///
    /// Returns when [`Scheduler::stop`] is called (after the in-flight
    /// pass drains) or when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Cancelled`] when `cancel` triggered the
    /// exit. Pass-level errors are logged, never returned: a failed pass
    /// is retried on the next tick.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SchedulerError> {
        self.state.send_replace(SchedulerState::Running);

        let mut ticker = tokio::time::interval(self.config.collection_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break Err(SchedulerError::Cancelled),
                () = self.stop.cancelled() => {
                    self.state.send_replace(SchedulerState::Stopping);
                    break Ok(());
                }
                _ = ticker.tick() => {}
            }

            // Run the pass to completion even if the stop signal fires
            // mid-pass: in-flight jobs drain, no new pass starts.
            let mut stopping = false;
            let pass = self.run_once(&cancel);
            tokio::pin!(pass);
            let outcome = loop {
                tokio::select! {
                    result = &mut pass => break result,
                    () = self.stop.cancelled(), if !stopping => {
                        stopping = true;
                        self.state.send_replace(SchedulerState::Stopping);
                    }
                }
            };

            match outcome {
                Ok(summary) => tracing::info!(
                    collected = summary.collected,
                    fresh = summary.fresh,
                    skipped = summary.skipped,
                    "collection pass complete"
                ),
                Err(ref err) => tracing::warn!(error = %err, "collection pass failed"),
            }

            if stopping {
                break Ok(());
            }
        };

        self.state.send_replace(SchedulerState::Stopped);
        result
    }

    /// Signals the scheduler to stop and blocks until the in-flight pass
    /// drains. Idempotent; returns immediately if the scheduler never ran.
    pub async fn stop(&self) {
        let mut rx = self.state.subscribe();
        if matches!(
            *rx.borrow_and_update(),
            SchedulerState::Idle | SchedulerState::Stopped
        ) {
            return;
        }

        self.stop.cancel();
        while *rx.borrow_and_update() != SchedulerState::Stopped {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Executes one collection pass: enumerate all projects and dispatch
    /// one job per project × enabled provider under the worker budget.
    ///
    /// Every job completes (or is skipped) before this returns. Job errors
    /// are independent: they are counted and aggregated, never aborting
    /// the pass.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Catalog`] when enumeration fails (nothing is
    /// dispatched), [`SchedulerError::Collection`] when one or more jobs
    /// failed.
    pub async fn run_once(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PassSummary, SchedulerError> {
        let projects = self.catalog.list_all_projects().await?;
        tracing::debug!(projects = projects.len(), "starting collection pass");

        let mut jobs: JoinSet<Result<JobOutcome, JobError>> = JoinSet::new();
        for project in projects {
            if !project.active {
                tracing::debug!(project = %project.key, "project inactive, skipping");
                continue;
            }
            for kind in project.providers.clone() {
                let store = Arc::clone(&self.store);
                let factory = self.factory.clone();
                let semaphore = Arc::clone(&self.semaphore);
                let cancel = cancel.clone();
                let project = project.clone();
                jobs.spawn(run_job(store, factory, semaphore, project, kind, cancel));
            }
        }

        let mut summary = PassSummary::default();
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(Ok(outcome)) => summary.record(outcome),
                Ok(Err(err)) => {
                    summary.failed += 1;
                    tracing::warn!(error = %err, "collection job failed");
                }
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(error = %err, "collection job aborted");
                }
            }
        }

        if summary.failed > 0 {
            Err(SchedulerError::Collection {
                count: summary.failed,
            })
        } else {
            Ok(summary)
        }
    }
}

/// `true` when a snapshot taken at `last_run` is still inside the
/// staleness window at `now` and the remote fetch should be skipped.
fn is_fresh(last_run: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_run < TimeDelta::hours(SNAPSHOT_FRESH_HOURS)
}

/// One collection job for a single (project, provider) pair.
///
/// The semaphore permit is held for the whole job and released on every
/// exit path when the guard drops.
async fn run_job(
    store: Arc<dyn SnapshotStore>,
    factory: CollectorFactory,
    semaphore: Arc<Semaphore>,
    project: Project,
    kind: ProviderKind,
    cancel: CancellationToken,
) -> Result<JobOutcome, JobError> {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return Ok(JobOutcome::Cancelled);
    };
    if cancel.is_cancelled() {
        return Ok(JobOutcome::Cancelled);
    }

    match store.last_snapshot(project.id, kind).await {
        Ok(snapshot) if is_fresh(snapshot.last_run, Utc::now()) => {
            tracing::debug!(
                project = %project.key,
                provider = %kind,
                last_run = %snapshot.last_run,
                "snapshot is fresh, skipping fetch"
            );
            return Ok(JobOutcome::Fresh);
        }
        Ok(_) | Err(StoreError::NotFound) => {}
        Err(StoreError::Backend(message)) => {
            // An unreadable slot is treated as absent; re-collecting is safe.
            tracing::warn!(
                project = %project.key,
                provider = %kind,
                error = %message,
                "failed to read last snapshot"
            );
        }
    }

    let collector = match factory.build(&project, kind) {
        Ok(collector) => collector,
        Err(CollectorError::MissingConfig(_)) => {
            tracing::warn!(
                project = %project.key,
                provider = %kind,
                "provider enabled without configuration, skipping"
            );
            return Ok(JobOutcome::NoConfig);
        }
        Err(source) => {
            return Err(JobError::Collector {
                project: project.key,
                provider: kind,
                source,
            });
        }
    };

    if let Err(err) = collector.validate() {
        tracing::warn!(
            project = %project.key,
            provider = %kind,
            error = %err,
            "collector configuration invalid, skipping"
        );
        return Ok(JobOutcome::InvalidConfig);
    }

    match collector.collect(&cancel).await {
        Ok(()) => {}
        Err(CollectorError::Cancelled) => return Ok(JobOutcome::Cancelled),
        Err(source) => {
            return Err(JobError::Collector {
                project: project.key,
                provider: kind,
                source,
            });
        }
    }

    let snapshot = Snapshot::now(kind, collector.metrics());
    snapshot
        .validate()
        .map_err(|message| JobError::InvalidSnapshot {
            project: project.key.clone(),
            provider: kind,
            message,
        })?;

    match store.store_snapshot(project.id, kind, &snapshot).await {
        Ok(()) => {
            tracing::info!(
                project = %project.key,
                provider = %kind,
                metrics = snapshot.metrics.len(),
                "snapshot stored"
            );
            Ok(JobOutcome::Collected)
        }
        Err(StoreError::NotFound) => {
            tracing::info!(
                project = %project.key,
                provider = %kind,
                "project deleted during pass, dropping snapshot"
            );
            Ok(JobOutcome::ProjectGone)
        }
        Err(StoreError::Backend(message)) => Err(JobError::Store {
            project: project.key,
            provider: kind,
            message,
        }),
    }
}
