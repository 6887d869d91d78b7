//! `PostgreSQL` stores for the box office services.
//!
//! Implements [`InventoryStore`](boxoffice_core::InventoryStore) and
//! [`ReservationStore`](boxoffice_core::ReservationStore) on a shared [`PgPool`] using
//! sqlx runtime queries. Each service normally owns its own database; both tables are
//! created by [`migrate`].
//!
//! # Example
//!
//! ```no_run
//! use boxoffice_postgres::{PostgresInventoryStore, connect, migrate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect("postgres://localhost/boxoffice", 10).await?;
//! migrate(&pool).await?;
//! let store = PostgresInventoryStore::new(pool);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use boxoffice_core::StoreError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

mod inventory;
mod reservations;

pub use inventory::PostgresInventoryStore;
pub use reservations::PostgresReservationStore;

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the database cannot be reached.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
    tracing::info!("Database migrations applied");
    Ok(())
}

fn db_error(e: &sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}
