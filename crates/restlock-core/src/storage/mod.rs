mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{Config, DaemonConfig};
pub use database::Database;
pub use memory::{MemoryAlarms, MemoryStore, MemorySurfaces};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::state::StateMap;

/// Persistent key-value store holding settings and scheduler state.
///
/// `get` and `set` are each atomic. Callers read everything they need with
/// one `get` and write the complete new state with one `set`.
pub trait StateStore {
    /// Values for the requested keys. Absent keys are simply missing from
    /// the returned map.
    fn get(&self, keys: &[&str]) -> Result<StateMap>;

    /// Write all entries as one transaction.
    fn set(&self, entries: StateMap) -> Result<()>;

    /// True when nothing has been persisted yet (first install).
    fn is_empty(&self) -> Result<bool>;
}

/// Returns `~/.config/restlock[-dev]/` based on RESTLOCK_ENV.
///
/// Set RESTLOCK_ENV=dev to use development data directory, or RESTLOCK_HOME
/// to point at an explicit directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("RESTLOCK_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("RESTLOCK_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("restlock-dev")
            } else {
                base_dir.join("restlock")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
