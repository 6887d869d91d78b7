//! Configuration pieces shared by both services.
//!
//! Values come from environment variables (optionally seeded from a `.env` file by the
//! binaries) with defaults for local development. Loaders take a lookup function so
//! tests can supply variables without touching the process environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Invalid configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// A variable required by the selected backend is missing.
    #[error("{key} must be set when {because}")]
    Missing {
        /// Variable name
        key: &'static str,
        /// Setting that requires it
        because: &'static str,
    },
}

/// Environment lookup: the process environment in production, a map in tests.
pub trait Lookup: Fn(&str) -> Option<String> {}

impl<F> Lookup for F where F: Fn(&str) -> Option<String> {}

/// Parse `key` if set, otherwise use `default`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the variable is set but does not parse.
pub fn parse_or<T>(lookup: &impl Lookup, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Port advertised for Prometheus scraping (`/metrics` is served on `port`)
    pub metrics_port: u16,
}

impl ServerConfig {
    /// Load `HOST`, `PORT` and `METRICS_PORT`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed port.
    pub fn load(lookup: &impl Lookup, default_port: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(lookup, "PORT", default_port)?,
            metrics_port: parse_or(lookup, "METRICS_PORT", 9090)?,
        })
    }

    /// `host:port` for the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory; lost on restart
    #[default]
    Memory,
    /// `PostgreSQL` via `DATABASE_URL`
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("expected memory or postgres, got {other}")),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend
    pub backend: StorageBackend,
    /// `PostgreSQL` connection URL (required for the postgres backend)
    pub database_url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl StorageConfig {
    /// Load `STORAGE_BACKEND`, `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown backend or a postgres backend without URL.
    pub fn load(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let config = Self {
            backend: parse_or(lookup, "STORAGE_BACKEND", StorageBackend::Memory)?,
            database_url: lookup("DATABASE_URL"),
            max_connections: parse_or(lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
        };
        if config.backend == StorageBackend::Postgres && config.database_url.is_none() {
            return Err(ConfigError::Missing {
                key: "DATABASE_URL",
                because: "STORAGE_BACKEND=postgres",
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::load(&vars(&[]), 8081).unwrap();
        assert_eq!(server.bind_address(), "0.0.0.0:8081");
        assert_eq!(server.metrics_port, 9090);
    }

    #[test]
    fn test_malformed_port_is_rejected() {
        let err = ServerConfig::load(&vars(&[("PORT", "eighty")]), 8081).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_postgres_requires_url() {
        let err = StorageConfig::load(&vars(&[("STORAGE_BACKEND", "postgres")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                key: "DATABASE_URL",
                because: "STORAGE_BACKEND=postgres"
            }
        );

        let ok = StorageConfig::load(&vars(&[
            ("STORAGE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/boxoffice"),
        ]))
        .unwrap();
        assert_eq!(ok.backend, StorageBackend::Postgres);
    }
}
