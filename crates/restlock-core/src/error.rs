//! Core error types for restlock-core.
//!
//! Errors are split by how the state machine treats them: persistence
//! failures propagate and are retried by the next trigger, surface and alarm
//! failures are logged and skipped.

use std::path::PathBuf;
use thiserror::Error;

use crate::surface::SurfaceId;

/// Core error type for restlock-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Surface controller errors
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// Timer service errors
    #[error("Alarm '{name}' failed: {message}")]
    Alarm { name: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Minutes must be strictly positive
    #[error("'{field}' must be a positive number of minutes, got {value}")]
    NonPositiveMinutes { field: String, value: i64 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Surface controller errors. Always non-fatal for the state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface was closed or never existed
    #[error("surface {0} not found")]
    NotFound(SurfaceId),

    /// The host refused the operation (permission denied, privileged page)
    #[error("surface {id} rejected update: {message}")]
    Rejected { id: SurfaceId, message: String },

    /// Enumerating surfaces failed as a whole
    #[error("surface enumeration failed: {0}")]
    ListFailed(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl CoreError {
    /// Persistence failures are retried by the next natural trigger.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Database(_) | CoreError::Io(_))
    }

    pub(crate) fn alarm(name: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Alarm {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }

    #[test]
    fn only_persistence_errors_are_retryable() {
        assert!(CoreError::Database(DatabaseError::Locked).is_retryable());
        assert!(!CoreError::Surface(SurfaceError::NotFound(3)).is_retryable());
        assert!(!CoreError::alarm("break", "host refused").is_retryable());
    }
}
