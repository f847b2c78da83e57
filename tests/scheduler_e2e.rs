//! End-to-end scheduler scenarios against an in-process provider stub.
//!
//! The stub is a real HTTP server answering any path with a configurable
//! status, delay, and JSON body, and it records request counts plus peak
//! concurrency. The catalog and snapshot store are in-memory doubles of
//! the scheduler's interfaces.

#![allow(clippy::panic)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{TimeDelta, Utc};
use tokio_util::sync::CancellationToken;

use insight_aggregator::collector::CollectorFactory;
use insight_aggregator::domain::{
    ClarityConfig, CollectorMeta, MetricValue, Project, ProjectId, ProviderKind, Snapshot, UserId,
};
use insight_aggregator::scheduler::{
    CatalogError, ProjectCatalog, Scheduler, SchedulerConfig, SchedulerError, SchedulerState,
    SnapshotStore, StoreError,
};

// ── Provider Stub ───────────────────────────────────────────────────────

/// Configurable provider endpoint recording traffic statistics.
struct ProviderStub {
    hits: AtomicUsize,
    inflight: AtomicUsize,
    peak: AtomicUsize,
    status: AtomicU16,
    delay_ms: AtomicU64,
    body: Mutex<serde_json::Value>,
}

impl ProviderStub {
    fn new(body: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            hits: AtomicUsize::new(0),
            inflight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            status: AtomicU16::new(200),
            delay_ms: AtomicU64::new(0),
            body: Mutex::new(body),
        })
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

async fn stub_handler(State(stub): State<Arc<ProviderStub>>) -> impl IntoResponse {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    let current = stub.inflight.fetch_add(1, Ordering::SeqCst) + 1;
    stub.peak.fetch_max(current, Ordering::SeqCst);

    let delay = stub.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    stub.inflight.fetch_sub(1, Ordering::SeqCst);

    let status =
        StatusCode::from_u16(stub.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK);
    let body = stub
        .body
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    (status, axum::Json(body))
}

/// Serves the stub on an ephemeral local port, returning its base URL.
async fn serve_stub(stub: Arc<ProviderStub>) -> String {
    let app = Router::new().fallback(stub_handler).with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

// ── In-Memory Doubles ───────────────────────────────────────────────────

#[derive(Default)]
struct MemoryCatalog {
    projects: Mutex<Vec<Project>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MemoryCatalog {
    fn with_projects(projects: Vec<Project>) -> Arc<Self> {
        let catalog = Self::default();
        *catalog.projects.lock().unwrap_or_else(PoisonError::into_inner) = projects;
        Arc::new(catalog)
    }
}

#[async_trait]
impl ProjectCatalog for MemoryCatalog {
    async fn list_all_projects(&self) -> Result<Vec<Project>, CatalogError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError("catalog offline".to_string()));
        }
        Ok(self
            .projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[derive(Default)]
struct MemoryStore {
    known: Mutex<HashSet<ProjectId>>,
    snapshots: Mutex<HashMap<(ProjectId, ProviderKind), Snapshot>>,
}

impl MemoryStore {
    fn for_projects(projects: &[Project]) -> Arc<Self> {
        let store = Self::default();
        {
            let mut known = store.known.lock().unwrap_or_else(PoisonError::into_inner);
            for project in projects {
                known.insert(project.id);
            }
        }
        Arc::new(store)
    }

    fn seed(&self, project_id: ProjectId, snapshot: Snapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((project_id, snapshot.provider), snapshot);
    }

    fn get(&self, project_id: ProjectId, kind: ProviderKind) -> Option<Snapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(project_id, kind))
            .cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn store_snapshot(
        &self,
        project_id: ProjectId,
        kind: ProviderKind,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        if !self
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&project_id)
        {
            return Err(StoreError::NotFound);
        }
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((project_id, kind), snapshot.clone());
        Ok(())
    }

    async fn last_snapshot(
        &self,
        project_id: ProjectId,
        kind: ProviderKind,
    ) -> Result<Snapshot, StoreError> {
        self.get(project_id, kind).ok_or(StoreError::NotFound)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn clarity_project(key: &str, host: &str) -> Project {
    Project {
        id: ProjectId::new(),
        name: format!("Project {key}"),
        key: key.to_string(),
        created_by: UserId::new(),
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        providers: vec![ProviderKind::Clarity],
        sentry_config: None,
        clarity_config: Some(ClarityConfig {
            meta: CollectorMeta::new(),
            project_id: "abc".to_string(),
            api_key: "k".to_string(),
            host: Some(host.to_string()),
        }),
        embrace_config: None,
        app_metric_config: None,
    }
}

fn clarity_traffic_body() -> serde_json::Value {
    serde_json::json!([
        {
            "metricName": "Traffic",
            "information": [
                {"totalSessionCount": "42", "distinctUserCount": "7"}
            ]
        }
    ])
}

fn scheduler_for(
    catalog: Arc<MemoryCatalog>,
    store: Arc<MemoryStore>,
    config: SchedulerConfig,
) -> Scheduler {
    let factory = match CollectorFactory::new() {
        Ok(factory) => factory,
        Err(e) => panic!("factory construction failed: {e}"),
    };
    Scheduler::new(config, catalog, store, factory)
}

// ── Scenarios ───────────────────────────────────────────────────────────

/// Happy path: empty store, one clarity project, first pass collects and
/// persists the normalized snapshot.
#[tokio::test]
async fn first_pass_collects_and_stores_snapshot() {
    let stub = ProviderStub::new(clarity_traffic_body());
    let host = serve_stub(Arc::clone(&stub)).await;

    let project = clarity_project("p1", &host);
    let project_id = project.id;
    let catalog = MemoryCatalog::with_projects(vec![project.clone()]);
    let store = MemoryStore::for_projects(&[project]);
    let scheduler = scheduler_for(catalog, Arc::clone(&store), SchedulerConfig::default());

    let cancel = CancellationToken::new();
    let summary = scheduler.run_once(&cancel).await;
    let Ok(summary) = summary else {
        panic!("pass failed");
    };
    assert_eq!(summary.collected, 1);
    assert_eq!(stub.hits(), 1);

    let Some(snapshot) = store.get(project_id, ProviderKind::Clarity) else {
        panic!("snapshot missing");
    };
    assert_eq!(snapshot.provider, ProviderKind::Clarity);
    assert_eq!(
        snapshot.metrics.get("clarity_total_sessions"),
        Some(&MetricValue::Text("42".to_string()))
    );
    assert_eq!(
        snapshot.metrics.get("clarity_distinct_users"),
        Some(&MetricValue::Text("7".to_string()))
    );
    assert!(Utc::now() - snapshot.last_run < TimeDelta::seconds(30));
}

/// Staleness gate: a snapshot 30 minutes old suppresses the HTTP request
/// entirely and stays unchanged.
#[tokio::test]
async fn fresh_snapshot_suppresses_fetch() {
    let stub = ProviderStub::new(clarity_traffic_body());
    let host = serve_stub(Arc::clone(&stub)).await;

    let project = clarity_project("p1", &host);
    let project_id = project.id;
    let catalog = MemoryCatalog::with_projects(vec![project.clone()]);
    let store = MemoryStore::for_projects(&[project]);

    let mut seeded = Snapshot::now(ProviderKind::Clarity, Default::default());
    seeded
        .metrics
        .insert("clarity_total_sessions".to_string(), "42".into());
    seeded.last_run = Utc::now() - TimeDelta::minutes(30);
    let seeded_id = seeded.id;
    store.seed(project_id, seeded);

    let scheduler = scheduler_for(catalog, Arc::clone(&store), SchedulerConfig::default());
    let summary = scheduler.run_once(&CancellationToken::new()).await;
    let Ok(summary) = summary else {
        panic!("pass failed");
    };

    assert_eq!(summary.fresh, 1);
    assert_eq!(summary.collected, 0);
    assert_eq!(stub.hits(), 0, "no HTTP request may be issued");

    let Some(snapshot) = store.get(project_id, ProviderKind::Clarity) else {
        panic!("snapshot missing");
    };
    assert_eq!(snapshot.id, seeded_id, "snapshot must be unchanged");
}

/// Provider failure: a stale snapshot plus a 500 response yields one
/// counted error and leaves the old snapshot in place.
#[tokio::test]
async fn remote_failure_is_counted_and_snapshot_kept() {
    let stub = ProviderStub::new(clarity_traffic_body());
    stub.set_status(500);
    let host = serve_stub(Arc::clone(&stub)).await;

    let project = clarity_project("p1", &host);
    let project_id = project.id;
    let catalog = MemoryCatalog::with_projects(vec![project.clone()]);
    let store = MemoryStore::for_projects(&[project]);

    let mut seeded = Snapshot::now(ProviderKind::Clarity, Default::default());
    seeded
        .metrics
        .insert("clarity_total_sessions".to_string(), "42".into());
    seeded.last_run = Utc::now() - TimeDelta::hours(3);
    let seeded_id = seeded.id;
    store.seed(project_id, seeded);

    let scheduler = scheduler_for(catalog, Arc::clone(&store), SchedulerConfig::default());
    let result = scheduler.run_once(&CancellationToken::new()).await;
    let Err(err) = result else {
        panic!("expected pass-level error");
    };
    assert_eq!(err.to_string(), "encountered 1 errors during collection");
    assert_eq!(stub.hits(), 1);

    let Some(snapshot) = store.get(project_id, ProviderKind::Clarity) else {
        panic!("snapshot missing");
    };
    assert_eq!(snapshot.id, seeded_id, "failed job must not overwrite");
}

/// Concurrency cap: 20 projects against a slow provider never exceed
/// `max_workers` simultaneous requests.
#[tokio::test]
async fn concurrent_jobs_never_exceed_worker_budget() {
    let stub = ProviderStub::new(clarity_traffic_body());
    stub.set_delay(Duration::from_millis(50));
    let host = serve_stub(Arc::clone(&stub)).await;

    let projects: Vec<Project> = (0..20)
        .map(|i| clarity_project(&format!("p{i}"), &host))
        .collect();
    let catalog = MemoryCatalog::with_projects(projects.clone());
    let store = MemoryStore::for_projects(&projects);

    let scheduler = scheduler_for(
        catalog,
        Arc::clone(&store),
        SchedulerConfig {
            collection_interval: Duration::from_secs(300),
            max_workers: 3,
        },
    );

    let summary = scheduler.run_once(&CancellationToken::new()).await;
    let Ok(summary) = summary else {
        panic!("pass failed");
    };
    assert_eq!(summary.collected, 20);
    assert_eq!(stub.hits(), 20);
    assert!(
        stub.peak() <= 3,
        "peak concurrency {} exceeded the worker budget",
        stub.peak()
    );
}

/// Graceful shutdown: stop during the first pass drains the slow in-flight
/// job, and no further pass begins.
#[tokio::test]
async fn stop_drains_inflight_pass() {
    let stub = ProviderStub::new(clarity_traffic_body());
    stub.set_delay(Duration::from_secs(2));
    let host = serve_stub(Arc::clone(&stub)).await;

    let project = clarity_project("p1", &host);
    let project_id = project.id;
    let catalog = MemoryCatalog::with_projects(vec![project.clone()]);
    let store = MemoryStore::for_projects(&[project]);

    let scheduler = Arc::new(scheduler_for(
        catalog,
        Arc::clone(&store),
        SchedulerConfig {
            collection_interval: Duration::from_millis(100),
            max_workers: 5,
        },
    ));

    let cancel = CancellationToken::new();
    let driver = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    // Let the first pass get its slow job in flight, then stop.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let stop_started = Instant::now();
    scheduler.stop().await;
    let waited = stop_started.elapsed();

    assert!(
        waited >= Duration::from_millis(1200),
        "stop returned after {waited:?}, before the in-flight job drained"
    );
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(
        store.get(project_id, ProviderKind::Clarity).is_some(),
        "drained job must have stored its snapshot"
    );

    let run_result = driver.await;
    assert!(matches!(run_result, Ok(Ok(()))));

    // Well past the ticker period: no new pass may have started.
    let hits_after_stop = stub.hits();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stub.hits(), hits_after_stop);
    assert_eq!(stub.hits(), 1);
}

/// Missing config: an enabled provider without its block is a logged
/// no-op, not an error.
#[tokio::test]
async fn missing_config_is_silent_noop() {
    let stub = ProviderStub::new(serde_json::json!({}));
    let host = serve_stub(Arc::clone(&stub)).await;

    let mut project = clarity_project("p1", &host);
    project.providers = vec![ProviderKind::Embrace];
    project.embrace_config = None;
    let project_id = project.id;

    let catalog = MemoryCatalog::with_projects(vec![project.clone()]);
    let store = MemoryStore::for_projects(&[project]);
    let scheduler = scheduler_for(catalog, Arc::clone(&store), SchedulerConfig::default());

    let summary = scheduler.run_once(&CancellationToken::new()).await;
    let Ok(summary) = summary else {
        panic!("pass reported errors");
    };
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(stub.hits(), 0);
    assert!(store.get(project_id, ProviderKind::Embrace).is_none());
}

// ── Boundary Behaviors ──────────────────────────────────────────────────

/// A project with an empty enabled-provider list contributes zero jobs.
#[tokio::test]
async fn empty_provider_list_is_noop_job_set() {
    let mut project = clarity_project("p1", "http://127.0.0.1:9");
    project.providers = vec![];
    project.clarity_config = None;

    let catalog = MemoryCatalog::with_projects(vec![project.clone()]);
    let store = MemoryStore::for_projects(&[project]);
    let scheduler = scheduler_for(catalog, store, SchedulerConfig::default());

    let summary = scheduler.run_once(&CancellationToken::new()).await;
    let Ok(summary) = summary else {
        panic!("pass failed");
    };
    assert_eq!(summary, Default::default());
}

/// Inactive projects are skipped without touching the provider.
#[tokio::test]
async fn inactive_project_is_not_collected() {
    let stub = ProviderStub::new(clarity_traffic_body());
    let host = serve_stub(Arc::clone(&stub)).await;

    let mut project = clarity_project("p1", &host);
    project.active = false;

    let catalog = MemoryCatalog::with_projects(vec![project.clone()]);
    let store = MemoryStore::for_projects(&[project]);
    let scheduler = scheduler_for(catalog, store, SchedulerConfig::default());

    let summary = scheduler.run_once(&CancellationToken::new()).await;
    assert!(summary.is_ok());
    assert_eq!(stub.hits(), 0);
}

/// Catalog enumeration failure aborts the pass before any dispatch.
#[tokio::test]
async fn catalog_failure_aborts_pass() {
    let catalog = MemoryCatalog::default();
    catalog.fail.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::default());
    let scheduler = scheduler_for(catalog.into(), store, SchedulerConfig::default());

    let result = scheduler.run_once(&CancellationToken::new()).await;
    assert!(matches!(result, Err(SchedulerError::Catalog(_))));
}

/// A project deleted mid-pass sees its final job end quietly in not-found.
#[tokio::test]
async fn project_deleted_mid_pass_is_not_an_error() {
    let stub = ProviderStub::new(clarity_traffic_body());
    let host = serve_stub(Arc::clone(&stub)).await;

    // Catalog lists the project, but the store never knew it: the store
    // rejects the write exactly like a concurrently deleted row.
    let project = clarity_project("p1", &host);
    let project_id = project.id;
    let catalog = MemoryCatalog::with_projects(vec![project]);
    let store = Arc::new(MemoryStore::default());
    let scheduler = scheduler_for(catalog, Arc::clone(&store), SchedulerConfig::default());

    let summary = scheduler.run_once(&CancellationToken::new()).await;
    let Ok(summary) = summary else {
        panic!("pass reported errors");
    };
    assert_eq!(summary.skipped, 1);
    assert!(store.get(project_id, ProviderKind::Clarity).is_none());
}

/// Cancellation propagates into jobs: the run exits with the cancellation
/// cause and cancelled jobs store nothing.
#[tokio::test]
async fn cancellation_aborts_jobs_without_storing() {
    let stub = ProviderStub::new(clarity_traffic_body());
    stub.set_delay(Duration::from_secs(5));
    let host = serve_stub(Arc::clone(&stub)).await;

    let project = clarity_project("p1", &host);
    let project_id = project.id;
    let catalog = MemoryCatalog::with_projects(vec![project.clone()]);
    let store = MemoryStore::for_projects(&[project]);

    let scheduler = Arc::new(scheduler_for(
        catalog,
        Arc::clone(&store),
        SchedulerConfig::default(),
    ));

    let cancel = CancellationToken::new();
    let driver = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();

    let result = driver.await;
    assert!(matches!(result, Ok(Err(SchedulerError::Cancelled))));
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(
        store.get(project_id, ProviderKind::Clarity).is_none(),
        "cancelled job must not store a snapshot"
    );
}

/// Stopping an idle scheduler returns immediately.
#[tokio::test]
async fn stop_on_idle_scheduler_is_immediate() {
    let catalog = Arc::new(MemoryCatalog::default());
    let store = Arc::new(MemoryStore::default());
    let scheduler = scheduler_for(catalog, store, SchedulerConfig::default());

    assert_eq!(scheduler.state(), SchedulerState::Idle);
    scheduler.stop().await;
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

/// Store-then-read round-trip on the snapshot store contract.
#[tokio::test]
async fn snapshot_store_round_trips() {
    let project = clarity_project("p1", "http://127.0.0.1:9");
    let store = MemoryStore::for_projects(&[project.clone()]);

    let mut snapshot = Snapshot::now(ProviderKind::Clarity, Default::default());
    snapshot
        .metrics
        .insert("clarity_total_sessions".to_string(), "42".into());

    let stored = store
        .store_snapshot(project.id, ProviderKind::Clarity, &snapshot)
        .await;
    assert!(stored.is_ok());

    let read = store.last_snapshot(project.id, ProviderKind::Clarity).await;
    let Ok(read) = read else {
        panic!("read failed");
    };
    assert_eq!(read, snapshot);
}
