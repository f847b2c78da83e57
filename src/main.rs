//! insight-aggregator server entry point.
//!
//! Starts the Axum HTTP server for the management API and the background
//! collection scheduler, sharing one PostgreSQL pool.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use insight_aggregator::api;
use insight_aggregator::app_state::AppState;
use insight_aggregator::auth::AuthService;
use insight_aggregator::collector::CollectorFactory;
use insight_aggregator::config::AppConfig;
use insight_aggregator::persistence::PostgresStore;
use insight_aggregator::scheduler::{Scheduler, SchedulerConfig};
use insight_aggregator::service::ProjectService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting insight-aggregator");

    // Connect to PostgreSQL and ensure the schema
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PostgresStore::new(pool));
    store.ensure_schema().await?;

    // Build service layer
    let auth_service = Arc::new(AuthService::new(
        Arc::clone(&store) as Arc<dyn insight_aggregator::auth::UserStore>,
        config.access_token_secret.as_bytes(),
        config.refresh_token_secret.as_bytes(),
    ));
    let project_service = Arc::new(ProjectService::new(Arc::clone(&store)));

    // Build the collection scheduler
    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig {
            collection_interval: Duration::from_secs(config.collection_interval_secs),
            max_workers: config.max_workers,
        },
        Arc::clone(&store) as Arc<dyn insight_aggregator::scheduler::ProjectCatalog>,
        Arc::clone(&store) as Arc<dyn insight_aggregator::scheduler::SnapshotStore>,
        CollectorFactory::new()?,
    ));

    let cancel = CancellationToken::new();
    let scheduler_task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        async move {
            if let Err(err) = scheduler.run(cancel).await {
                tracing::error!(error = %err, "scheduler exited with error");
            }
        }
    });

    // Build application state and router
    let app_state = AppState {
        project_service,
        auth_service,
    };
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the scheduler before exiting
    scheduler.stop().await;
    cancel.cancel();
    let _ = scheduler_task.await;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
