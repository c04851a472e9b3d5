//! # Rest & Lock Core Library
//!
//! This library provides the core logic of Rest & Lock, a break enforcer:
//! after every work interval it locks all open surfaces onto a dedicated
//! lock screen for the break duration, then restores them and schedules the
//! next break. The `restlock` CLI is a thin host over the same library.
//!
//! ## Architecture
//!
//! - **Engine**: Stateless event dispatcher. Each [`Event`] is handled to
//!   completion from persisted state, so restarts lose nothing
//! - **Scheduler / Lock**: The two halves of the break cycle
//! - **Control**: Start, stop, reschedule and configure commands
//! - **Storage**: SQLite-backed state, alarms and surfaces plus TOML
//!   configuration; in-memory adapters for tests and embedders
//!
//! ## Host Ports
//!
//! - [`StateStore`]: Key-value persistence with atomic multi-key writes
//! - [`AlarmService`]: Named one-shot alarms, delivered at-least-once
//! - [`SurfaceController`]: Enumerate and redirect open surfaces
//! - [`Clock`]: Wall-clock time in epoch milliseconds

pub mod control;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod lock;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod surface;
pub mod timer;

pub use control::{Ack, Command, ControlInterface};
pub use engine::Engine;
pub use error::{ConfigError, CoreError, DatabaseError, SurfaceError, ValidationError};
pub use events::{Event, Outcome};
pub use host::Host;
pub use lock::{BatchReport, Enforcement, Interceptor, LockController, LockReport, RestoreReport};
pub use scheduler::{BreakScheduler, Pending, ScheduleOutcome};
pub use state::{LockState, Phase, ScheduleState, Settings, StateMap, StatusSnapshot};
pub use storage::{Config, Database, MemoryAlarms, MemoryStore, MemorySurfaces, StateStore};
pub use surface::{LockedResource, NavigationPhase, Surface, SurfaceController, SurfaceId};
pub use timer::{Alarm, AlarmName, AlarmService, Clock, ManualClock, SystemClock};
