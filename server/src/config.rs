//! Configuration management for the server.

use shelf_engine::{CollectionIdentity, SchemaVersion, DEFAULT_BLOCKED_TIMEOUT};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database holding the todo store
    pub database: String,
    /// Schema version the todo cache opens with
    pub version: SchemaVersion,
    /// Store holding the todos
    pub store: String,
    /// Where the backend is loaded from at start and saved to at shutdown
    pub snapshot_path: Option<PathBuf>,
    /// How long an upgrade waits for other connections to close
    pub blocked_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database: "TodoApp".to_string(),
            version: 1,
            store: "todos".to_string(),
            snapshot_path: None,
            blocked_timeout: DEFAULT_BLOCKED_TIMEOUT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        let database = lookup("DB_NAME").unwrap_or(defaults.database);
        if database.is_empty() {
            return Err(ConfigError::Empty("DB_NAME"));
        }

        let version = match lookup("DB_VERSION") {
            Some(version) => version
                .parse()
                .ok()
                .filter(|v: &SchemaVersion| *v >= 1)
                .ok_or(ConfigError::InvalidVersion)?,
            None => defaults.version,
        };

        let store = lookup("STORE_NAME").unwrap_or(defaults.store);
        if store.is_empty() {
            return Err(ConfigError::Empty("STORE_NAME"));
        }

        let snapshot_path = lookup("SNAPSHOT_PATH")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        let blocked_timeout = match lookup("BLOCKED_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .map_err(|_| ConfigError::InvalidBlockedTimeout)?,
            ),
            None => defaults.blocked_timeout,
        };

        Ok(Self {
            host,
            port,
            database,
            version,
            store,
            snapshot_path,
            blocked_timeout,
        })
    }

    /// The store the todo cache mirrors.
    pub fn identity(&self) -> CollectionIdentity {
        CollectionIdentity::new(self.database.clone(), self.version, self.store.clone())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("DB_VERSION must be a whole number of at least 1")]
    InvalidVersion,

    #[error("BLOCKED_TIMEOUT_MS must be a whole number of milliseconds")]
    InvalidBlockedTimeout,

    #[error("{0} must not be empty")]
    Empty(&'static str),
}
