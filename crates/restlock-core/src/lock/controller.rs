use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::BatchReport;
use crate::error::Result;
use crate::host::Host;
use crate::scheduler::{BreakScheduler, Pending, ScheduleOutcome};
use crate::state::{keys, to_datetime, LockState, Settings};
use crate::surface::{Surface, SurfaceId};
use crate::timer::AlarmName;

/// Result of [`LockController::start_lock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockReport {
    pub lock_end_at: u64,
    pub captured: usize,
    pub redirects: BatchReport,
    pub unlock_armed: bool,
    /// A lock was already running (duplicate break delivery); nothing changed.
    pub already_active: bool,
}

/// Result of [`LockController::unlock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub restores: BatchReport,
    pub schedule: ScheduleOutcome,
}

/// Owns the lock episode: capture and redirect at break start, restore and
/// hand back to the scheduler at break end.
pub struct LockController<'a> {
    host: &'a Host<'a>,
}

impl<'a> LockController<'a> {
    pub fn new(host: &'a Host<'a>) -> Self {
        Self { host }
    }

    /// Begin a break: capture every surface, persist the lock, redirect,
    /// arm the unlock alarm.
    ///
    /// # Errors
    /// Returns an error only when the lock state cannot be persisted. In that
    /// case no surface has been redirected yet.
    pub fn start_lock(&self) -> Result<LockReport> {
        let map = self.host.store.get(&[
            keys::WORK_INTERVAL_MINUTES,
            keys::BREAK_DURATION_MINUTES,
            keys::ENABLED,
            keys::LOCK_ACTIVE,
            keys::LOCK_END_AT,
            keys::CAPTURED_SURFACES,
        ])?;
        let current = LockState::from_map(&map);
        if current.active {
            debug!(lock_end_at = current.lock_end_at, "lock already active");
            return Ok(LockReport {
                lock_end_at: current.lock_end_at,
                captured: current.captured_surfaces.len(),
                redirects: BatchReport::default(),
                unlock_armed: false,
                already_active: true,
            });
        }

        let settings = Settings::from_map(&map);
        let lock_end_at = self.host.now_ms() + settings.break_duration_ms();

        let surfaces = self.host.surfaces.list_all().unwrap_or_else(|e| {
            warn!(error = %e, "could not enumerate surfaces; locking without capture");
            Vec::new()
        });
        let captured = self.capture(&surfaces);
        let captured_count = captured.len();

        self.host.store.set(
            LockState {
                active: true,
                lock_end_at,
                captured_surfaces: captured,
            }
            .to_entries(),
        )?;

        let redirects = self.redirect_all(&surfaces);

        let unlock_armed = match self.host.alarms.arm(AlarmName::Unlock, lock_end_at) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, lock_end_at, "failed to arm unlock alarm");
                false
            }
        };

        info!(
            until = %to_datetime(lock_end_at).map(|t| t.to_rfc3339()).unwrap_or_default(),
            captured = captured_count,
            redirected = redirects.applied.len(),
            failed = redirects.failed.len(),
            "lock started"
        );
        Ok(LockReport {
            lock_end_at,
            captured: captured_count,
            redirects,
            unlock_armed,
            already_active: false,
        })
    }

    /// End a break: restore surfaces still showing the lock, clear the lock,
    /// schedule the next break.
    ///
    /// The cleared lock and the next break time go out in one write.
    ///
    /// # Errors
    /// Returns an error when that write fails; the lock then stays active
    /// and the undelivered unlock alarm retries.
    pub fn unlock(&self) -> Result<RestoreReport> {
        let map = self.host.store.get(&keys::LOCK)?;
        let lock = LockState::from_map(&map);
        if !lock.active {
            debug!("unlock without an active lock");
        }

        let restores = lock
            .captured_surfaces
            .iter()
            .fold(BatchReport::default(), |report, (id, original)| {
                self.restore_one(report, *id, original)
            });

        let schedule = BreakScheduler::new(self.host)
            .schedule_with(|_| Pending::new(LockState::cleared().to_entries()))?;

        info!(
            restored = restores.applied.len(),
            skipped = restores.skipped.len(),
            failed = restores.failed.len(),
            "unlocked"
        );
        Ok(RestoreReport { restores, schedule })
    }

    /// Re-arm the unlock alarm for a lock that outlived a restart. An
    /// overdue lock fires on the host's next delivery.
    ///
    /// Returns the lock end time when a lock is active.
    ///
    /// # Errors
    /// Returns an error when the state store cannot be read.
    pub fn resume(&self) -> Result<Option<u64>> {
        let map = self.host.store.get(&[keys::LOCK_ACTIVE, keys::LOCK_END_AT])?;
        let lock = LockState::from_map(&map);
        if !lock.active {
            return Ok(None);
        }
        if let Err(e) = self.host.alarms.arm(AlarmName::Unlock, lock.lock_end_at) {
            warn!(error = %e, "failed to re-arm unlock alarm");
        }
        info!(lock_end_at = lock.lock_end_at, "resumed lock after restart");
        Ok(Some(lock.lock_end_at))
    }

    fn capture(&self, surfaces: &[Surface]) -> BTreeMap<SurfaceId, String> {
        surfaces
            .iter()
            .filter(|s| !self.host.locked.shown_by(s))
            .filter_map(|s| Some((s.id?, s.resource_or_empty().to_string())))
            .collect()
    }

    fn redirect_all(&self, surfaces: &[Surface]) -> BatchReport {
        let target = self.host.locked.as_str();
        surfaces
            .iter()
            .filter_map(|s| s.id)
            .fold(BatchReport::default(), |report, id| {
                match self.host.surfaces.set_resource(id, target) {
                    Ok(()) => report.apply(id),
                    Err(e) => {
                        warn!(surface = id, error = %e, "failed to redirect surface");
                        report.fail(id, e)
                    }
                }
            })
    }

    fn restore_one(&self, report: BatchReport, id: SurfaceId, original: &str) -> BatchReport {
        if original.is_empty() {
            return report.skip(id);
        }
        match self.host.surfaces.get(id) {
            Ok(Some(surface)) if self.host.locked.shown_by(&surface) => {
                match self.host.surfaces.set_resource(id, original) {
                    Ok(()) => report.apply(id),
                    Err(e) => {
                        debug!(surface = id, error = %e, "restore failed");
                        report.fail(id, e)
                    }
                }
            }
            // Closed, or the user already navigated away from the lock.
            Ok(_) => report.skip(id),
            Err(e) => {
                debug!(surface = id, error = %e, "surface lookup failed");
                report.fail(id, e)
            }
        }
    }
}
