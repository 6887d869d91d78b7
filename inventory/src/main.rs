//! Inventory service HTTP server.
//!
//! Owns event seat counts; reservation services call its reserve/rollback endpoints.

use boxoffice_core::{InventoryStore, LockManager};
use boxoffice_inventory::{Config, InventoryAuthority, LockBackend, build_router};
use boxoffice_postgres::{PostgresInventoryStore, connect, migrate};
use boxoffice_redis::RedisLockManager;
use boxoffice_runtime::metrics::MetricsServer;
use boxoffice_runtime::{InMemoryInventoryStore, LocalLockManager};
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
                .unwrap_or_else(|_| "boxoffice_inventory=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Inventory Service");

    let config = Config::from_env()?;
    info!(
        address = %config.server.bind_address(),
        storage = ?config.storage.backend,
        lock_backend = ?config.lock.backend,
        lock_wait = ?config.lock.wait_timeout,
        lock_lease = ?config.lock.lease,
        "Configuration loaded"
    );

    // Metrics recorder; exposed on this service's /metrics route
    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port).parse()?;
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start()?;

    let store: Arc<dyn InventoryStore> = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; events are lost on restart");
            Arc::new(InMemoryInventoryStore::new())
        }
        StorageBackend::Postgres => {
            let url = config.storage.database_url.as_deref().unwrap_or_default();
            info!("Connecting to PostgreSQL...");
            let pool = connect(url, config.storage.max_connections).await?;
            migrate(&pool).await?;
            info!("PostgreSQL connected and migrated");
            Arc::new(PostgresInventoryStore::new(pool))
        }
    };

    let locks: Arc<dyn LockManager> = match config.lock.backend {
        LockBackend::Local => {
            warn!("Using in-process locks; run a single inventory instance");
            Arc::new(LocalLockManager::new())
        }
        LockBackend::Redis => {
            let url = config.lock.redis_url.as_deref().unwrap_or_default();
            info!("Connecting to Redis...");
            let manager = RedisLockManager::new(url).await?;
            info!("Redis connected");
            Arc::new(manager)
        }
    };

    let authority = Arc::new(
        InventoryAuthority::new(store, locks)
            .with_lock_timing(config.lock.wait_timeout, config.lock.lease),
    );
    let app = build_router(authority, metrics.handle().cloned());

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
