use crate::db_error;
use boxoffice_core::{
    BoxFuture, EventId, PrincipalId, Reservation, ReservationId, ReservationStatus,
    ReservationStore, SeatQuantity, StoreError,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const SELECT_RESERVATION: &str = r"
    SELECT id, event_id, requester, quantity, status, reserved_at, cancelled_at
    FROM reservations
";

/// `PostgreSQL`-backed [`ReservationStore`].
#[derive(Debug, Clone)]
pub struct PostgresReservationStore {
    pool: PgPool,
}

impl PostgresReservationStore {
    /// Create a store on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_reservation(row: &PgRow) -> Result<Reservation, StoreError> {
        let quantity: i64 = row.try_get("quantity").map_err(|e| db_error(&e))?;
        let quantity = SeatQuantity::new(quantity).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let status: String = row.try_get("status").map_err(|e| db_error(&e))?;
        let status = status
            .parse::<ReservationStatus>()
            .map_err(StoreError::Corrupt)?;
        let cancelled_at: Option<DateTime<Utc>> =
            row.try_get("cancelled_at").map_err(|e| db_error(&e))?;

        Ok(Reservation::restore(
            ReservationId::from_uuid(row.try_get("id").map_err(|e| db_error(&e))?),
            EventId::from_uuid(row.try_get("event_id").map_err(|e| db_error(&e))?),
            PrincipalId::new(row.try_get::<String, _>("requester").map_err(|e| db_error(&e))?),
            quantity,
            status,
            row.try_get("reserved_at").map_err(|e| db_error(&e))?,
            cancelled_at,
        ))
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_RESERVATION} WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;

        row.as_ref().map(Self::row_to_reservation).transpose()
    }

    async fn save_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        #[allow(clippy::cast_possible_wrap)]
        let quantity = reservation.quantity().get() as i64;

        sqlx::query(
            r"
            INSERT INTO reservations (id, event_id, requester, quantity, status, reserved_at, cancelled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                cancelled_at = EXCLUDED.cancelled_at
            ",
        )
        .bind(*reservation.id.as_uuid())
        .bind(*reservation.event_id.as_uuid())
        .bind(reservation.requester.as_str())
        .bind(quantity)
        .bind(reservation.status().as_str())
        .bind(reservation.reserved_at)
        .bind(reservation.cancelled_at())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        tracing::debug!(
            reservation_id = %reservation.id,
            status = %reservation.status(),
            "Reservation saved"
        );
        Ok(())
    }

    async fn find_by(&self, predicate: &str, value: Predicate<'_>) -> Result<Vec<Reservation>, StoreError> {
        let sql = format!("{SELECT_RESERVATION} WHERE {predicate} = $1 ORDER BY reserved_at ASC");
        let query = sqlx::query(&sql);
        let query = match value {
            Predicate::Requester(requester) => query.bind(requester.as_str()),
            Predicate::Event(event_id) => query.bind(*event_id.as_uuid()),
        };
        let rows = query.fetch_all(&self.pool).await.map_err(|e| db_error(&e))?;

        rows.iter().map(Self::row_to_reservation).collect()
    }
}

enum Predicate<'a> {
    Requester(&'a PrincipalId),
    Event(EventId),
}

impl ReservationStore for PostgresReservationStore {
    fn get(&self, id: ReservationId) -> BoxFuture<'_, Result<Option<Reservation>, StoreError>> {
        Box::pin(self.get_reservation(id))
    }

    fn save<'a>(&'a self, reservation: &'a Reservation) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.save_reservation(reservation))
    }

    fn find_by_requester<'a>(
        &'a self,
        requester: &'a PrincipalId,
    ) -> BoxFuture<'a, Result<Vec<Reservation>, StoreError>> {
        Box::pin(self.find_by("requester", Predicate::Requester(requester)))
    }

    fn find_by_event(
        &self,
        event_id: EventId,
    ) -> BoxFuture<'_, Result<Vec<Reservation>, StoreError>> {
        Box::pin(self.find_by("event_id", Predicate::Event(event_id)))
    }
}
