use crate::db_error;
use boxoffice_core::{
    BoxFuture, EventId, EventInventory, InventoryStore, PrincipalId, StoreError,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PostgreSQL`-backed [`InventoryStore`].
///
/// Rows hold the remaining-seat count as `BIGINT`; the lock manager, not the database,
/// serializes concurrent mutations of one event.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Create a store on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: &PgRow) -> Result<EventInventory, StoreError> {
        let remaining: i64 = row.try_get("remaining_seats").map_err(|e| db_error(&e))?;
        let remaining = u64::try_from(remaining)
            .map_err(|_| StoreError::Corrupt(format!("negative seat count {remaining}")))?;

        Ok(EventInventory::restore(
            EventId::from_uuid(row.try_get("id").map_err(|e| db_error(&e))?),
            row.try_get("title").map_err(|e| db_error(&e))?,
            row.try_get("description").map_err(|e| db_error(&e))?,
            row.try_get("starts_at").map_err(|e| db_error(&e))?,
            PrincipalId::new(row.try_get::<String, _>("owner").map_err(|e| db_error(&e))?),
            remaining,
        ))
    }

    async fn get_event(&self, id: EventId) -> Result<Option<EventInventory>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, starts_at, owner, remaining_seats
            FROM events
            WHERE id = $1
            ",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        row.as_ref().map(Self::row_to_event).transpose()
    }

    async fn save_event(&self, event: &EventInventory) -> Result<(), StoreError> {
        let remaining = i64::try_from(event.remaining_seats()).map_err(|_| {
            StoreError::Database(format!(
                "seat count {} does not fit in BIGINT",
                event.remaining_seats()
            ))
        })?;

        sqlx::query(
            r"
            INSERT INTO events (id, title, description, starts_at, owner, remaining_seats)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                starts_at = EXCLUDED.starts_at,
                owner = EXCLUDED.owner,
                remaining_seats = EXCLUDED.remaining_seats,
                updated_at = now()
            ",
        )
        .bind(*event.id.as_uuid())
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.starts_at)
        .bind(event.owner.as_str())
        .bind(remaining)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        tracing::debug!(event_id = %event.id, remaining, "Event saved");
        Ok(())
    }

    async fn delete_event(&self, id: EventId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_events(
        &self,
        owner: Option<&PrincipalId>,
    ) -> Result<Vec<EventInventory>, StoreError> {
        let rows = match owner {
            Some(owner) => {
                sqlx::query(
                    r"
                    SELECT id, title, description, starts_at, owner, remaining_seats
                    FROM events
                    WHERE owner = $1
                    ORDER BY starts_at DESC
                    ",
                )
                .bind(owner.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r"
                    SELECT id, title, description, starts_at, owner, remaining_seats
                    FROM events
                    ORDER BY starts_at ASC
                    ",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| db_error(&e))?;

        rows.iter().map(Self::row_to_event).collect()
    }
}

impl InventoryStore for PostgresInventoryStore {
    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Option<EventInventory>, StoreError>> {
        Box::pin(self.get_event(id))
    }

    fn save<'a>(&'a self, event: &'a EventInventory) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.save_event(event))
    }

    fn delete(&self, id: EventId) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(self.delete_event(id))
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<EventInventory>, StoreError>> {
        Box::pin(self.fetch_events(None))
    }

    fn find_by_owner<'a>(
        &'a self,
        owner: &'a PrincipalId,
    ) -> BoxFuture<'a, Result<Vec<EventInventory>, StoreError>> {
        Box::pin(self.fetch_events(Some(owner)))
    }
}
