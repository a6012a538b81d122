//! Configuration for the `PostgreSQL` reservation store.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;

/// `PostgreSQL` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections in the pool
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Idle timeout in seconds (connections idle longer than this are closed)
    pub idle_timeout: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized variables (all optional):
    ///
    /// - `DATABASE_URL` (default `postgres://localhost/swellbook`)
    /// - `POSTGRES_MAX_CONNECTIONS` (default 10)
    /// - `POSTGRES_MIN_CONNECTIONS` (default 1)
    /// - `POSTGRES_CONNECT_TIMEOUT` (default 30 seconds)
    /// - `POSTGRES_IDLE_TIMEOUT` (default 600 seconds)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/swellbook".to_owned()),
            max_connections: env_or("POSTGRES_MAX_CONNECTIONS", 10),
            min_connections: env_or("POSTGRES_MIN_CONNECTIONS", 1),
            connect_timeout: env_or("POSTGRES_CONNECT_TIMEOUT", 30),
            idle_timeout: env_or("POSTGRES_IDLE_TIMEOUT", 600),
        }
    }

    /// Configuration pointing at `url` with default pool settings.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
            idle_timeout: 600,
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
