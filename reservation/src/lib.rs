//! # Box Office Reservation
//!
//! The Reservation Orchestrator service: takes seats from the Inventory Authority,
//! records reservations, and rolls the seats back when a later step fails.
//!
//! - [`orchestrator`]: the create/cancel/confirm saga
//! - [`client`]: [`HttpInventoryClient`], the network [`boxoffice_core::InventoryClient`]
//! - [`api`]: the HTTP binding
//! - [`config`]: environment configuration

pub mod api;
pub mod client;
pub mod config;
pub mod orchestrator;

pub use api::{AvailabilityQuery, CreateReservationRequest, build_router};
pub use client::HttpInventoryClient;
pub use config::{Config, InventoryServiceConfig, SagaConfig};
pub use orchestrator::{ReservationOrchestrator, ReservationResponse};
