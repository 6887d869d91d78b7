//! Reservation service HTTP server.
//!
//! Holds seats on the inventory service and records who holds them.

use boxoffice_core::ReservationStore;
use boxoffice_core::environment::SystemClock;
use boxoffice_postgres::{PostgresReservationStore, connect, migrate};
use boxoffice_reservation::{Config, HttpInventoryClient, ReservationOrchestrator, build_router};
use boxoffice_runtime::metrics::MetricsServer;
use boxoffice_runtime::{InMemoryReservationStore, WorkerPool};
use boxoffice_web::{StorageBackend, shutdown_signal};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice_reservation=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reservation Service");

    let config = Config::from_env()?;
    info!(
        address = %config.server.bind_address(),
        storage = ?config.storage.backend,
        inventory_url = %config.inventory.base_url,
        workflow = ?config.saga.workflow,
        compensation_retries = config.saga.compensation_max_retries,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port).parse()?;
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start()?;

    let store: Arc<dyn ReservationStore> = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; reservations are lost on restart");
            Arc::new(InMemoryReservationStore::new())
        }
        StorageBackend::Postgres => {
            let url = config.storage.database_url.as_deref().unwrap_or_default();
            info!("Connecting to PostgreSQL...");
            let pool = connect(url, config.storage.max_connections).await?;
            migrate(&pool).await?;
            info!("PostgreSQL connected and migrated");
            Arc::new(PostgresReservationStore::new(pool))
        }
    };

    let inventory = HttpInventoryClient::new(
        config.inventory.base_url.clone(),
        config.inventory.request_timeout(),
    )?;

    let orchestrator = ReservationOrchestrator::new(Arc::new(inventory), store, Arc::new(SystemClock))
        .with_workflow(config.saga.workflow)
        .with_compensation_policy(config.saga.compensation_policy())
        .with_workers(WorkerPool::new("reservations", config.saga.worker_pool_size));
    let app = build_router(orchestrator, metrics.handle().cloned());

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
