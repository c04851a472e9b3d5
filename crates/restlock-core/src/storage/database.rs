//! SQLite-backed host adapters.
//!
//! One database file provides everything the state machine needs to survive
//! a restart:
//! - `kv`: the persisted state map ([`StateStore`])
//! - `alarms`: armed one-shot alarms ([`AlarmService`])
//! - `surfaces`: a local surface registry ([`SurfaceController`]) used when
//!   no browser host is attached, e.g. by the CLI
//!
//! Several processes may share the file (the daemon and one-shot CLI
//! commands). Each handler runs inside [`Database::serialized`], which holds
//! SQLite's write lock from its first read to its last write.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::warn;

use super::{data_dir, StateStore};
use crate::error::{DatabaseError, Result, SurfaceError};
use crate::state::StateMap;
use crate::surface::{Surface, SurfaceController, SurfaceId};
use crate::timer::{Alarm, AlarmName, AlarmService};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database for restlock state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/restlock.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("restlock.db"))
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (tests, embedding).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        super::migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Run `f` as one `BEGIN IMMEDIATE` transaction.
    ///
    /// Other connections to the same file wait (up to the busy timeout)
    /// until `f` returns. Everything `f` wrote is rolled back when it fails.
    /// Not reentrant.
    ///
    /// # Errors
    /// Returns `f`'s error, or a database error when the transaction cannot
    /// be started or committed.
    pub fn serialized<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f()?;
        tx.commit()?;
        Ok(value)
    }

    // ── Surface registry ─────────────────────────────────────────────

    /// Register a new surface and return it with its assigned id.
    pub fn open_surface(&self, resource: Option<&str>) -> Result<Surface> {
        self.conn.execute(
            "INSERT INTO surfaces (resource) VALUES (?1)",
            params![resource],
        )?;
        let id = self.conn.last_insert_rowid() as SurfaceId;
        Ok(Surface {
            id: Some(id),
            resource: resource.map(str::to_string),
        })
    }

    /// Remove a surface. Returns whether it existed.
    pub fn close_surface(&self, id: SurfaceId) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM surfaces WHERE id = ?1", params![id as i64])?;
        Ok(removed > 0)
    }
}

impl StateStore for Database {
    fn get(&self, keys: &[&str]) -> Result<StateMap> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let mut map = StateMap::new();
        for key in keys {
            let raw: Option<String> = stmt
                .query_row(params![key], |row| row.get(0))
                .optional()?;
            let Some(raw) = raw else { continue };
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    map.insert((*key).to_string(), value);
                }
                // Reads as absent, so the key falls back to its default.
                Err(e) => warn!(key = *key, error = %e, "ignoring malformed state value"),
            }
        }
        Ok(map)
    }

    /// Applies every entry or none. A savepoint nests inside
    /// [`Database::serialized`] and acts as its own transaction outside it.
    fn set(&self, entries: StateMap) -> Result<()> {
        self.conn.execute_batch("SAVEPOINT kv_set")?;
        let written = self
            .write_entries(&entries)
            .and_then(|()| Ok(self.conn.execute_batch("RELEASE kv_set")?));
        if written.is_err() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK TO kv_set; RELEASE kv_set") {
                warn!(error = %e, "failed to roll back state write");
            }
        }
        written
    }

    fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count == 0)
    }
}

impl Database {
    fn write_entries(&self, entries: &StateMap) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
        for (key, value) in entries {
            stmt.execute(params![key, serde_json::to_string(value)?])?;
        }
        Ok(())
    }
}

impl AlarmService for Database {
    fn arm(&self, name: AlarmName, fire_at: u64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO alarms (name, fire_at) VALUES (?1, ?2)",
            params![name.as_str(), fire_at as i64],
        )?;
        Ok(())
    }

    fn cancel(&self, name: AlarmName) -> Result<()> {
        self.conn
            .execute("DELETE FROM alarms WHERE name = ?1", params![name.as_str()])?;
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM alarms", [])?;
        Ok(())
    }

    fn armed(&self) -> Result<Vec<Alarm>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, fire_at FROM alarms ORDER BY fire_at, name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut alarms = Vec::new();
        for row in rows {
            let (name, fire_at) = row?;
            alarms.push(Alarm {
                name: name.parse()?,
                fire_at: fire_at.max(0) as u64,
            });
        }
        Ok(alarms)
    }

    fn acknowledge(&self, alarm: Alarm) -> Result<()> {
        self.conn.execute(
            "DELETE FROM alarms WHERE name = ?1 AND fire_at = ?2",
            params![alarm.name.as_str(), alarm.fire_at as i64],
        )?;
        Ok(())
    }
}

impl SurfaceController for Database {
    fn list_all(&self) -> Result<Vec<Surface>, SurfaceError> {
        let query = || -> Result<Vec<Surface>, rusqlite::Error> {
            let mut stmt = self
                .conn
                .prepare("SELECT id, resource FROM surfaces ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(Surface {
                    id: Some(row.get::<_, i64>(0)? as SurfaceId),
                    resource: row.get(1)?,
                })
            })?;
            let surfaces = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(surfaces)
        };
        query().map_err(|e| SurfaceError::ListFailed(e.to_string()))
    }

    fn get(&self, id: SurfaceId) -> Result<Option<Surface>, SurfaceError> {
        self.conn
            .query_row(
                "SELECT resource FROM surfaces WHERE id = ?1",
                params![id as i64],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(|found| {
                found.map(|resource| Surface {
                    id: Some(id),
                    resource,
                })
            })
            .map_err(|e| SurfaceError::Rejected {
                id,
                message: e.to_string(),
            })
    }

    fn set_resource(&self, id: SurfaceId, resource: &str) -> Result<(), SurfaceError> {
        let updated = self
            .conn
            .execute(
                "UPDATE surfaces SET resource = ?1 WHERE id = ?2",
                params![resource, id as i64],
            )
            .map_err(|e| SurfaceError::Rejected {
                id,
                message: e.to_string(),
            })?;
        if updated == 0 {
            return Err(SurfaceError::NotFound(id));
        }
        Ok(())
    }
}
