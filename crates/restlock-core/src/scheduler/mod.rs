//! Break scheduler.
//!
//! Decides when the next break begins, persists that decision, and arms the
//! `break` alarm for it. Re-invoking the scheduler is always safe: a future
//! `next_break_at` that is already on record is kept, not reset, so restarts
//! and redundant events never push a break further out.
//!
//! Callers that change other state alongside the schedule (commands, the
//! unlock path) hand their entries to [`BreakScheduler::schedule_with`], so
//! each handler reads once and writes once. Alarms are touched only after
//! that write has succeeded.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::host::Host;
use crate::state::{keys, to_datetime, LockState, ScheduleState, Settings, StateMap};
use crate::timer::AlarmName;

const SCHEDULE_KEYS: [&str; 6] = [
    keys::WORK_INTERVAL_MINUTES,
    keys::BREAK_DURATION_MINUTES,
    keys::ENABLED,
    keys::NEXT_BREAK_AT,
    keys::LOCK_ACTIVE,
    keys::LOCK_END_AT,
];

/// What a call to [`BreakScheduler::schedule_next_break`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// Breaks are switched off; nothing armed.
    Disabled,
    /// A lock is in progress; the post-unlock call will schedule.
    Deferred { lock_end_at: u64 },
    Scheduled {
        next_break_at: u64,
        /// The existing future break time was kept.
        preserved: bool,
        /// False when the timer host refused the alarm. Self-heals on the
        /// next startup.
        armed: bool,
    },
}

impl ScheduleOutcome {
    pub fn next_break_at(&self) -> Option<u64> {
        match self {
            ScheduleOutcome::Scheduled { next_break_at, .. } => Some(*next_break_at),
            _ => None,
        }
    }
}

/// State a caller persists in the same write as the schedule.
#[derive(Debug, Default)]
pub struct Pending {
    pub entries: StateMap,
    /// Ignore the recorded break and derive the next one from now.
    pub from_now: bool,
}

impl Pending {
    pub fn new(entries: StateMap) -> Self {
        Self {
            entries,
            from_now: false,
        }
    }

    pub fn from_now(mut self) -> Self {
        self.from_now = true;
        self
    }
}

pub struct BreakScheduler<'a> {
    host: &'a Host<'a>,
}

impl<'a> BreakScheduler<'a> {
    pub fn new(host: &'a Host<'a>) -> Self {
        Self { host }
    }

    /// Make sure exactly one future break is on record and armed.
    ///
    /// # Errors
    /// Returns an error only when the state store fails; the caller's next
    /// trigger retries. Alarm failures are logged and reported in the outcome.
    pub fn schedule_next_break(&self) -> Result<ScheduleOutcome> {
        self.schedule_with(|_| Pending::default())
    }

    /// Drop the recorded break and schedule a fresh one from now.
    ///
    /// # Errors
    /// Returns an error when the state store fails. Nothing is written and
    /// no alarm is touched in that case.
    pub fn reschedule_from_now(&self) -> Result<ScheduleOutcome> {
        self.schedule_with(|_| Pending::default().from_now())
    }

    /// Schedule against the state as it will be once `update`'s entries are
    /// applied, and persist those entries with the new break time in a
    /// single write.
    ///
    /// `update` sees the current values of the settings, schedule and lock
    /// keys.
    ///
    /// # Errors
    /// Returns an error when the state store fails. Nothing is written and
    /// no alarm is touched in that case.
    pub fn schedule_with<F>(&self, update: F) -> Result<ScheduleOutcome>
    where
        F: FnOnce(&StateMap) -> Pending,
    {
        let mut view = self.host.store.get(&SCHEDULE_KEYS)?;
        let Pending {
            mut entries,
            from_now,
        } = update(&view);
        view.extend(entries.clone());

        let now = self.host.now_ms();
        let outcome = plan(&view, now, from_now);

        match outcome.next_break_at() {
            Some(at) => entries.extend(
                ScheduleState {
                    next_break_at: Some(at),
                }
                .to_entries(),
            ),
            None if from_now => entries.extend(ScheduleState::default().to_entries()),
            None => {}
        }
        if !entries.is_empty() {
            self.host.store.set(entries)?;
        }

        match outcome {
            ScheduleOutcome::Scheduled {
                next_break_at,
                preserved,
                ..
            } => {
                let armed = match self.host.alarms.arm(AlarmName::Break, next_break_at) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, next_break_at, "failed to arm break alarm");
                        false
                    }
                };
                info!(
                    at = %to_datetime(next_break_at).map(|t| t.to_rfc3339()).unwrap_or_default(),
                    preserved,
                    "scheduled next break"
                );
                Ok(ScheduleOutcome::Scheduled {
                    next_break_at,
                    preserved,
                    armed,
                })
            }
            ScheduleOutcome::Disabled | ScheduleOutcome::Deferred { .. } => {
                if from_now {
                    if let Err(e) = self.host.alarms.cancel(AlarmName::Break) {
                        warn!(error = %e, "failed to cancel break alarm");
                    }
                }
                Ok(outcome)
            }
        }
    }
}

/// Decide the next break for `view` without touching any port. `armed` is
/// left false for the caller to fill in.
fn plan(view: &StateMap, now: u64, from_now: bool) -> ScheduleOutcome {
    let settings = Settings::from_map(view);
    if !settings.enabled {
        debug!("breaks disabled, not scheduling");
        return ScheduleOutcome::Disabled;
    }

    let lock = LockState::from_map(view);
    if lock.active {
        debug!(lock_end_at = lock.lock_end_at, "lock in progress, deferring schedule");
        return ScheduleOutcome::Deferred {
            lock_end_at: lock.lock_end_at,
        };
    }

    let recorded = if from_now {
        None
    } else {
        ScheduleState::from_map(view).next_break_at
    };
    let (next_break_at, preserved) = match recorded {
        Some(at) if at > now => (at, true),
        _ => (now + settings.work_interval_ms(), false),
    };
    ScheduleOutcome::Scheduled {
        next_break_at,
        preserved,
        armed: false,
    }
}
