//! Reservation service configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use boxoffice_core::ReservationWorkflow;
use boxoffice_runtime::RetryPolicy;
use boxoffice_web::config::{ConfigError, Lookup, ServerConfig, StorageConfig, parse_or};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Reservation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener
    pub server: ServerConfig,
    /// Reservation storage
    pub storage: StorageConfig,
    /// Remote inventory service
    pub inventory: InventoryServiceConfig,
    /// Saga behaviour
    pub saga: SagaConfig,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed values, a backend missing its URL, or an
    /// inventory request timeout that does not exceed the authority's lock wait.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let inventory = InventoryServiceConfig {
            base_url: lookup("INVENTORY_SERVICE_URL")
                .unwrap_or_else(|| "http://localhost:8081".to_string()),
            request_timeout_ms: parse_or(lookup, "INVENTORY_REQUEST_TIMEOUT_MS", 8_000)?,
            lock_wait_timeout_ms: parse_or(lookup, "LOCK_WAIT_TIMEOUT_MS", 5_000)?,
        };
        inventory.validate()?;

        Ok(Self {
            server: ServerConfig::load(lookup, 8082)?,
            storage: StorageConfig::load(lookup)?,
            inventory,
            saga: SagaConfig {
                workflow: parse_or(lookup, "RESERVATION_WORKFLOW", ReservationWorkflow::default())?,
                compensation_max_retries: parse_or(lookup, "COMPENSATION_MAX_RETRIES", 0)?,
                compensation_initial_delay_ms: parse_or(
                    lookup,
                    "COMPENSATION_INITIAL_DELAY_MS",
                    100,
                )?,
                worker_pool_size: parse_or(lookup, "WORKER_POOL_SIZE", 16)?,
            },
        })
    }
}

/// Where the Inventory Authority lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryServiceConfig {
    /// Base URL, e.g. `http://localhost:8081`
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Lock wait configured on the authority (`LOCK_WAIT_TIMEOUT_MS`)
    pub lock_wait_timeout_ms: u64,
}

impl InventoryServiceConfig {
    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Check the request timeout outlasts the authority's lock wait.
    ///
    /// A contended reserve answers `false` only after the authority has waited out
    /// its lock. A client that gives up first reports a transport error instead, and
    /// the remote write may still land with nothing to compensate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the request timeout does not exceed the
    /// lock wait.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms <= self.lock_wait_timeout_ms {
            return Err(ConfigError::Invalid {
                key: "INVENTORY_REQUEST_TIMEOUT_MS",
                value: self.request_timeout_ms.to_string(),
                reason: format!(
                    "must exceed the inventory lock wait of {}ms",
                    self.lock_wait_timeout_ms
                ),
            });
        }
        if self.request_timeout_ms < self.lock_wait_timeout_ms.saturating_add(1_000) {
            tracing::warn!(
                request_timeout_ms = self.request_timeout_ms,
                lock_wait_timeout_ms = self.lock_wait_timeout_ms,
                "Inventory request timeout leaves under a second beyond the lock wait"
            );
        }
        Ok(())
    }
}

/// Saga behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaConfig {
    /// Status a new reservation starts in
    pub workflow: ReservationWorkflow,
    /// Retries for a failed compensating rollback (0 = single attempt)
    pub compensation_max_retries: usize,
    /// Delay before the first retry, in milliseconds
    pub compensation_initial_delay_ms: u64,
    /// Concurrent background sagas
    pub worker_pool_size: usize,
}

impl SagaConfig {
    /// Retry policy for compensating rollbacks.
    #[must_use]
    pub fn compensation_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.compensation_max_retries)
            .initial_delay(Duration::from_millis(self.compensation_initial_delay_ms))
            .build()
    }
}
