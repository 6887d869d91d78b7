//! # Box Office Inventory
//!
//! The Inventory Authority service: owns each event's remaining-seat count and
//! serializes every change to it through the event's lock.
//!
//! - [`authority`]: lock → read → mutate → persist → release, plus event CRUD
//! - [`api`]: the HTTP binding
//! - [`config`]: environment configuration

pub mod api;
pub mod authority;
pub mod config;

pub use api::{EventResponse, build_router};
pub use authority::{InventoryAuthority, SeatOutcome};
pub use config::{Config, LockBackend, LockConfig};
