pub mod config;
pub mod cycle;
pub mod daemon;
pub mod surface;

use restlock_core::{Config, CoreError, Database, Engine, Host, SystemClock};
use serde::Serialize;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Everything a command needs to build an engine over the on-disk state.
pub struct Context {
    pub db: Database,
    pub config: Config,
    clock: SystemClock,
}

impl Context {
    pub fn open() -> CliResult<Self> {
        Ok(Self {
            db: Database::open()?,
            config: Config::load()?,
            clock: SystemClock,
        })
    }

    pub fn engine(&self) -> Engine<'_> {
        Engine::new(Host::new(
            &self.db,
            &self.db,
            &self.db,
            &self.clock,
            self.config.locked_resource(),
        ))
    }

    /// Run one handler while holding the database write lock, so a daemon
    /// and one-shot commands never interleave their reads and writes.
    pub fn serialized<T>(
        &self,
        handler: impl FnOnce(&Engine<'_>) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let engine = self.engine();
        self.db.serialized(|| handler(&engine))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
