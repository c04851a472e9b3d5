use serde::{Deserialize, Serialize};

use crate::control::{Ack, Command};
use crate::lock::{Enforcement, LockReport, RestoreReport};
use crate::scheduler::ScheduleOutcome;
use crate::surface::{NavigationPhase, Surface};
use crate::timer::AlarmName;

/// Every host notification the core reacts to.
/// Each one is handled to completion before the next is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// First installation or update.
    Installed,
    /// The host process came up.
    Startup,
    BreakTimerFired,
    UnlockTimerFired,
    SurfaceCreated {
        surface: Surface,
    },
    SurfaceNavigated {
        surface: Surface,
        phase: NavigationPhase,
    },
    CommandReceived {
        command: Command,
    },
}

impl From<AlarmName> for Event {
    fn from(name: AlarmName) -> Self {
        match name {
            AlarmName::Break => Event::BreakTimerFired,
            AlarmName::Unlock => Event::UnlockTimerFired,
        }
    }
}

impl From<Command> for Event {
    fn from(command: Command) -> Self {
        Event::CommandReceived { command }
    }
}

/// What handling an [`Event`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Scheduled { schedule: ScheduleOutcome },
    Locked { report: LockReport },
    Unlocked { report: RestoreReport },
    /// A lock survived a restart and its unlock alarm was re-armed.
    Resumed { lock_end_at: u64 },
    Enforced { enforcement: Enforcement },
    Acknowledged { ack: Ack },
    /// A stale or duplicate delivery.
    Ignored { reason: String },
}

impl Outcome {
    pub(crate) fn ignored(reason: impl Into<String>) -> Self {
        Outcome::Ignored {
            reason: reason.into(),
        }
    }
}
