//! Error types for web handlers.
//!
//! [`AppError`] carries the HTTP status, a stable machine-readable code and a
//! user-facing message. Domain errors convert into it with `?`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use boxoffice_core::{
    ClientError, InventoryError, LockError, ReservationError, SeatCountError, StoreError,
};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<EventInventory>, AppError> {
///     let event = authority.get_event(id).await?; // InventoryError -> AppError
///     Ok(Json(event))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error for server-side logging.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Replace the machine-readable code.
    #[must_use]
    pub fn with_code(mut self, code: &str) -> Self {
        self.code = code.to_string();
        self
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST".to_string())
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), "UNAUTHORIZED".to_string())
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message.into(), "FORBIDDEN".to_string())
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), "CONFLICT".to_string())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 502 Bad Gateway error.
    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message.into(), "BAD_GATEWAY".to_string())
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::internal("Storage failure").with_source(err)
    }
}

impl From<LockError> for AppError {
    fn from(err: LockError) -> Self {
        Self::unavailable("Lock service unavailable")
            .with_code("LOCK_BACKEND_UNAVAILABLE")
            .with_source(err)
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(id) => Self::not_found("Event", id),
            ClientError::InvalidArgument(message) => {
                Self::bad_request(message).with_code("INVALID_ARGUMENT")
            }
            ClientError::Transport(_) | ClientError::Remote { .. } | ClientError::Decode(_) => {
                Self::bad_gateway("Inventory service unavailable")
                    .with_code("INVENTORY_UNAVAILABLE")
                    .with_source(err)
            }
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InvalidArgument(message) => {
                Self::bad_request(message).with_code("INVALID_ARGUMENT")
            }
            InventoryError::NotFound(id) => Self::not_found("Event", id),
            InventoryError::Unauthorized { .. } => Self::forbidden(err.to_string()),
            InventoryError::LockTimeout(_) => Self::unavailable(err.to_string()).with_code("LOCK_TIMEOUT"),
            InventoryError::Lock(lock) => lock.into(),
            InventoryError::Store(store) => store.into(),
            InventoryError::SeatCount(SeatCountError::WrongLock { .. }) => {
                Self::internal("Seat count update rejected").with_source(err)
            }
            InventoryError::SeatCount(seats) => {
                Self::conflict(seats.to_string()).with_code("SEAT_COUNT_CONFLICT")
            }
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::InvalidArgument(message) => {
                Self::bad_request(message).with_code("INVALID_ARGUMENT")
            }
            ReservationError::NotFound(id) => Self::not_found("Reservation", id),
            ReservationError::Unauthorized { .. } => Self::forbidden(err.to_string()),
            ReservationError::AlreadyCancelled(_) => {
                Self::conflict(err.to_string()).with_code("ALREADY_CANCELLED")
            }
            ReservationError::InsufficientInventory { .. } => {
                Self::conflict(err.to_string()).with_code("INSUFFICIENT_INVENTORY")
            }
            ReservationError::CompensationFailed { .. } => {
                Self::conflict(err.to_string()).with_code("COMPENSATION_FAILED")
            }
            ReservationError::Store(store) => store.into(),
            ReservationError::Inventory(client) => client.into(),
            ReservationError::Worker(_) => Self::internal("Reservation worker failed").with_source(err),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use boxoffice_core::{EventId, LockKey, PrincipalId, ReservationId, SeatQuantity};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_not_found() {
        let err = AppError::not_found("Event", "123");
        assert_eq!(err.to_string(), "[NOT_FOUND] Event with id 123 not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_inventory_error_statuses() {
        let event_id = EventId::new();
        let cases = [
            (InventoryError::InvalidArgument("q".into()), StatusCode::BAD_REQUEST),
            (InventoryError::NotFound(event_id), StatusCode::NOT_FOUND),
            (
                InventoryError::Unauthorized {
                    event_id,
                    principal: PrincipalId::new("b@x.com"),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                InventoryError::LockTimeout(LockKey::for_event(event_id)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                InventoryError::Store(StoreError::Database("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                InventoryError::SeatCount(SeatCountError::Overflow),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_reservation_error_statuses() {
        let id = ReservationId::new();
        let quantity = SeatQuantity::new(2).unwrap();
        assert_eq!(
            AppError::from(ReservationError::AlreadyCancelled(id)).code(),
            "ALREADY_CANCELLED"
        );
        assert_eq!(
            AppError::from(ReservationError::InsufficientInventory {
                event_id: EventId::new(),
                quantity
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(ReservationError::Inventory(ClientError::Transport("reset".into())))
                .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(ReservationError::NotFound(id)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ReservationError::InvalidArgument("q".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_response_body_is_json() {
        let response = AppError::conflict("Reservation already cancelled").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "CONFLICT");
        assert_eq!(body["message"], "Reservation already cancelled");
    }
}
