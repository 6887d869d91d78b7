//! Inventory service configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use boxoffice_web::config::{ConfigError, Lookup, ServerConfig, StorageConfig, parse_or};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Inventory service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener
    pub server: ServerConfig,
    /// Event storage
    pub storage: StorageConfig,
    /// Event lock coordination
    pub lock: LockConfig,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed values, a backend missing its URL, or an
    /// unusable lock lease.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let lock = LockConfig::load(lookup)?;
        lock.validate()?;
        Ok(Self {
            server: ServerConfig::load(lookup, 8081)?,
            storage: StorageConfig::load(lookup)?,
            lock,
        })
    }
}

/// Which coordination backend serializes event mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// In-process locks; only valid with a single authority instance
    #[default]
    Local,
    /// Redis `SET NX PX` locks shared by every instance
    Redis,
}

impl FromStr for LockBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "redis" => Ok(Self::Redis),
            other => Err(format!("expected local or redis, got {other}")),
        }
    }
}

/// Lock backend plus the wait and lease bounds applied to every acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Selected backend
    pub backend: LockBackend,
    /// Redis connection URL (required for the redis backend)
    pub redis_url: Option<String>,
    /// Longest time an operation waits for the event lock
    #[serde(with = "millis")]
    pub wait_timeout: Duration,
    /// Longest time a holder keeps the lock before it becomes reclaimable
    #[serde(with = "millis")]
    pub lease: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: LockBackend::Local,
            redis_url: None,
            wait_timeout: Duration::from_secs(5),
            lease: Duration::from_secs(10),
        }
    }
}

impl LockConfig {
    fn load(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            backend: parse_or(lookup, "LOCK_BACKEND", defaults.backend)?,
            redis_url: lookup("REDIS_URL"),
            wait_timeout: Duration::from_millis(parse_or(
                lookup,
                "LOCK_WAIT_TIMEOUT_MS",
                5_000,
            )?),
            lease: Duration::from_millis(parse_or(lookup, "LOCK_LEASE_MS", 10_000)?),
        };
        if config.backend == LockBackend::Redis && config.redis_url.is_none() {
            return Err(ConfigError::Missing {
                key: "REDIS_URL",
                because: "LOCK_BACKEND=redis",
            });
        }
        Ok(config)
    }

    /// Reject a zero lease; warn when the lease does not outlast the wait timeout.
    ///
    /// The lease has to cover read, mutate and persist with margin. A lease no longer
    /// than the wait is legal but means a stalled holder can be overtaken by a waiter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero lease.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease.is_zero() {
            return Err(ConfigError::Invalid {
                key: "LOCK_LEASE_MS",
                value: "0".to_string(),
                reason: "lease must be greater than zero".to_string(),
            });
        }
        if self.lease <= self.wait_timeout {
            tracing::warn!(
                lease_ms = self.lease.as_millis(),
                wait_timeout_ms = self.wait_timeout.as_millis(),
                "Lock lease does not exceed the wait timeout"
            );
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
