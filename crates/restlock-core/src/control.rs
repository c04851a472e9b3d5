//! Control interface.
//!
//! External commands that change settings and re-drive the scheduler. Every
//! command is idempotent, persists its whole state change in one write, and
//! answers with an [`Ack`] once that write has landed. A refused write
//! leaves state and alarms as they were.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::host::Host;
use crate::scheduler::{BreakScheduler, Pending};
use crate::state::{
    keys, validate_minutes, LockState, Settings, StateMap,
    DEFAULT_BREAK_DURATION_MINUTES, DEFAULT_WORK_INTERVAL_MINUTES,
};
use crate::timer::AlarmName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Command {
    /// Enable breaks and arm the next one.
    Start,
    /// Disable breaks. A lock already in progress runs to its end.
    Stop,
    /// Forget the pending break and schedule a fresh one from now.
    Reschedule,
    /// Change interval and/or duration, then reschedule. `None` keeps the
    /// current value; a non-positive value is replaced by the default.
    Configure {
        work_interval_minutes: Option<i64>,
        break_duration_minutes: Option<i64>,
    },
}

/// Acknowledgement returned for every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

pub struct ControlInterface<'a> {
    host: &'a Host<'a>,
}

impl<'a> ControlInterface<'a> {
    pub fn new(host: &'a Host<'a>) -> Self {
        Self { host }
    }

    /// Run a command, turning any failure into `ok: false`.
    pub fn handle(&self, command: Command) -> Ack {
        let name = command_name(&command);
        match self.execute(command) {
            Ok(()) => {
                info!(command = name, "command applied");
                Ack { ok: true }
            }
            Err(e) => {
                error!(command = name, error = %e, "command failed");
                Ack { ok: false }
            }
        }
    }

    /// # Errors
    /// Returns an error when the state store fails.
    pub fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Reschedule => self.reschedule(),
            Command::Configure {
                work_interval_minutes,
                break_duration_minutes,
            } => self.configure(work_interval_minutes, break_duration_minutes),
        }
    }

    fn scheduler(&self) -> BreakScheduler<'a> {
        BreakScheduler::new(self.host)
    }

    fn start(&self) -> Result<()> {
        self.scheduler().schedule_with(|current| {
            let mut entries = StateMap::new();
            entries.insert(keys::ENABLED.into(), true.into());
            let pending = Pending::new(entries);
            // The break recorded before `stop` is stale; re-arm from now.
            if Settings::from_map(current).enabled {
                pending
            } else {
                pending.from_now()
            }
        })?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let map = self.host.store.get(&[keys::LOCK_ACTIVE])?;
        let locked = LockState::from_map(&map).active;

        let mut entries = StateMap::new();
        entries.insert(keys::ENABLED.into(), false.into());
        self.host.store.set(entries)?;

        // The pending unlock must survive or the current break never ends.
        let cancelled = if locked {
            self.host.alarms.cancel(AlarmName::Break)
        } else {
            self.host.alarms.cancel_all()
        };
        if let Err(e) = cancelled {
            warn!(error = %e, "failed to cancel alarms on stop");
        }
        Ok(())
    }

    fn reschedule(&self) -> Result<()> {
        self.scheduler().reschedule_from_now()?;
        Ok(())
    }

    fn configure(&self, interval: Option<i64>, duration: Option<i64>) -> Result<()> {
        self.scheduler().schedule_with(|current| {
            let mut settings = Settings::from_map(current);
            if let Some(minutes) = interval {
                settings.work_interval_minutes =
                    sanitize(keys::WORK_INTERVAL_MINUTES, minutes, DEFAULT_WORK_INTERVAL_MINUTES);
            }
            if let Some(minutes) = duration {
                settings.break_duration_minutes =
                    sanitize(keys::BREAK_DURATION_MINUTES, minutes, DEFAULT_BREAK_DURATION_MINUTES);
            }

            let mut entries = settings.to_entries();
            entries.remove(keys::ENABLED);
            Pending::new(entries).from_now()
        })?;
        Ok(())
    }
}

fn sanitize(field: &str, minutes: i64, default: u32) -> u32 {
    validate_minutes(field, minutes).unwrap_or_else(|e| {
        warn!(error = %e, default, "rejected setting, using default");
        default
    })
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Start => "start",
        Command::Stop => "stop",
        Command::Reschedule => "reschedule",
        Command::Configure { .. } => "configure",
    }
}
