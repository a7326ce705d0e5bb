//! Core runtime configuration.
//!
//! Resolved once at process startup and then passed into the store. Nothing
//! below this module reads process environment.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::db::{Database, DbResult};

/// Environment variable naming the store location.
pub const DB_PATH_ENV: &str = "USAGE_PIVOT_DB_PATH";

/// Value of [`DB_PATH_ENV`] selecting an in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{DB_PATH_ENV} is not set")]
    MissingDatabasePath,

    #[error("{DB_PATH_ENV} cannot be empty")]
    EmptyDatabasePath,
}

/// Where the SQLite store lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    database: DatabaseLocation,
}

impl CoreConfig {
    /// Store at a file path.
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            database: DatabaseLocation::File(database_path),
        }
    }

    /// Throwaway in-memory store.
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseLocation::InMemory,
        }
    }

    /// Read [`DB_PATH_ENV`] from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_value(std::env::var(DB_PATH_ENV).ok())
    }

    /// Build from an already-read environment value.
    pub fn from_env_value(value: Option<String>) -> Result<Self, ConfigError> {
        let value = value.ok_or(ConfigError::MissingDatabasePath)?;
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if value == IN_MEMORY {
            return Ok(Self::in_memory());
        }
        Ok(Self::new(PathBuf::from(value)))
    }

    pub fn database(&self) -> &DatabaseLocation {
        &self.database
    }

    /// File path of the store, `None` when in memory.
    pub fn database_path(&self) -> Option<&Path> {
        match &self.database {
            DatabaseLocation::File(path) => Some(path),
            DatabaseLocation::InMemory => None,
        }
    }

    /// Open (and initialise) the configured store.
    pub fn open_database(&self) -> DbResult<Database> {
        match &self.database {
            DatabaseLocation::InMemory => Database::open_in_memory(),
            DatabaseLocation::File(path) => Database::open(path),
        }
    }
}
