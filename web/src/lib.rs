//! Axum integration shared by the inventory and reservation services.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract** the caller ([`CallerIdentity`], from `X-User`) and path/query/JSON data
//! 3. **Call** the domain service (Inventory Authority or Reservation Orchestrator)
//! 4. **Map** the domain result or error ([`AppError`]) to an HTTP response
//!
//! # Example
//!
//! ```ignore
//! use boxoffice_web::{AppError, CallerIdentity};
//! use axum::{Json, extract::{Path, State}};
//!
//! async fn cancel(
//!     State(state): State<AppState>,
//!     CallerIdentity(requester): CallerIdentity,
//!     Path(id): Path<ReservationId>,
//! ) -> Result<Json<ReservationResponse>, AppError> {
//!     Ok(Json(state.orchestrator.cancel_reservation(id, &requester).await?.into()))
//! }
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use config::{ConfigError, ServerConfig, StorageBackend, StorageConfig};
pub use error::AppError;
pub use extractors::{CallerIdentity, CorrelationId, USER_HEADER};
pub use middleware::{
    CORRELATION_ID_HEADER, correlation_id_layer, current_correlation_id, with_correlation_id,
};
pub use server::{observability_routes, shutdown_signal};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
