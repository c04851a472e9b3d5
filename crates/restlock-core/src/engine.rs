//! Event dispatch.
//!
//! The engine routes each [`Event`] to the component that owns it and turns
//! due alarms into events. It keeps nothing between calls: every decision is
//! taken from the state store, so a fresh engine after a restart behaves
//! exactly like the old one.

use tracing::{debug, error, info};

use crate::control::ControlInterface;
use crate::error::Result;
use crate::events::{Event, Outcome};
use crate::host::Host;
use crate::lock::{Interceptor, LockController};
use crate::scheduler::{BreakScheduler, Pending};
use crate::state::{keys, LockState, ScheduleState, Settings, StatusSnapshot};

pub struct Engine<'a> {
    host: Host<'a>,
}

impl<'a> Engine<'a> {
    pub fn new(host: Host<'a>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Host<'a> {
        &self.host
    }

    /// Handle one event to completion.
    ///
    /// # Errors
    /// Returns an error when the state store fails. Surface and alarm
    /// failures are reported inside the outcome instead.
    pub fn dispatch(&self, event: Event) -> Result<Outcome> {
        debug!(?event, "dispatching");
        match event {
            Event::Installed => self.on_installed(),
            Event::Startup => self.on_startup(),
            Event::BreakTimerFired => self.on_break_timer(),
            Event::UnlockTimerFired => self.on_unlock_timer(),
            Event::SurfaceCreated { surface } => {
                let enforcement = Interceptor::new(&self.host).on_created(&surface)?;
                Ok(Outcome::Enforced { enforcement })
            }
            Event::SurfaceNavigated { surface, phase } => {
                let enforcement = Interceptor::new(&self.host).on_navigated(&surface, phase)?;
                Ok(Outcome::Enforced { enforcement })
            }
            Event::CommandReceived { command } => {
                let ack = ControlInterface::new(&self.host).handle(command);
                Ok(Outcome::Acknowledged { ack })
            }
        }
    }

    /// First install: seed default settings together with the first break
    /// if nothing is stored yet, otherwise behave as on startup.
    ///
    /// # Errors
    /// Returns an error when the state store fails.
    pub fn on_installed(&self) -> Result<Outcome> {
        if !self.host.store.is_empty()? {
            return self.on_startup();
        }
        info!("first install, writing default settings");
        let schedule = BreakScheduler::new(&self.host)
            .schedule_with(|_| Pending::new(Settings::default().to_entries()))?;
        Ok(Outcome::Scheduled { schedule })
    }

    /// Re-arm whatever the persisted state says should be pending.
    ///
    /// # Errors
    /// Returns an error when the state store fails.
    pub fn on_startup(&self) -> Result<Outcome> {
        if let Some(lock_end_at) = LockController::new(&self.host).resume()? {
            return Ok(Outcome::Resumed { lock_end_at });
        }
        let schedule = BreakScheduler::new(&self.host).schedule_next_break()?;
        Ok(Outcome::Scheduled { schedule })
    }

    fn on_break_timer(&self) -> Result<Outcome> {
        let map = self
            .host
            .store
            .get(&[keys::ENABLED, keys::NEXT_BREAK_AT])?;
        if !Settings::from_map(&map).enabled {
            return Ok(Outcome::ignored("breaks disabled"));
        }
        // An alarm armed before a reschedule may still be delivered.
        if let Some(at) = ScheduleState::from_map(&map).next_break_at {
            if at > self.host.now_ms() {
                return Ok(Outcome::ignored("break not yet due"));
            }
        }
        let report = LockController::new(&self.host).start_lock()?;
        Ok(Outcome::Locked { report })
    }

    fn on_unlock_timer(&self) -> Result<Outcome> {
        let map = self.host.store.get(&[keys::LOCK_ACTIVE, keys::LOCK_END_AT])?;
        let lock = LockState::from_map(&map);
        if lock.active && lock.lock_end_at > self.host.now_ms() {
            return Ok(Outcome::ignored("lock not yet over"));
        }
        let report = LockController::new(&self.host).unlock()?;
        Ok(Outcome::Unlocked { report })
    }

    /// Deliver every alarm whose time has come, oldest first.
    ///
    /// An alarm is acknowledged only after its event was handled, so a
    /// failure leaves it armed for the next call.
    ///
    /// # Errors
    /// Returns the first dispatch or alarm-host error.
    pub fn deliver_due(&self) -> Result<Vec<Outcome>> {
        let due = self.host.alarms.due(self.host.now_ms())?;
        let mut outcomes = Vec::with_capacity(due.len());
        for alarm in due {
            let outcome = self.dispatch(Event::from(alarm.name)).map_err(|e| {
                error!(alarm = %alarm.name, error = %e, "alarm handling failed");
                e
            })?;
            self.host.alarms.acknowledge(alarm)?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// # Errors
    /// Returns an error when the state store fails.
    pub fn status(&self) -> Result<StatusSnapshot> {
        let map = self.host.store.get(&keys::ALL)?;
        Ok(StatusSnapshot::from_map(&map, self.host.now_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Command;
    use crate::lock::Enforcement;
    use crate::scheduler::ScheduleOutcome;
    use crate::state::Phase;
    use crate::storage::{MemoryAlarms, MemoryStore, MemorySurfaces, StateStore};
    use crate::surface::{LockedResource, NavigationPhase, Surface};
    use crate::timer::{AlarmName, AlarmService, ManualClock, MINUTE_MS};

    const LOCKED: &str = LockedResource::DEFAULT;

    struct Fixture {
        store: MemoryStore,
        alarms: MemoryAlarms,
        surfaces: MemorySurfaces,
        clock: ManualClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                alarms: MemoryAlarms::new(),
                surfaces: MemorySurfaces::with_surfaces([(1, "https://a/"), (2, "https://b/")]),
                clock: ManualClock::new(0),
            }
        }

        fn engine(&self) -> Engine<'_> {
            Engine::new(Host::new(
                &self.store,
                &self.alarms,
                &self.surfaces,
                &self.clock,
                LockedResource::default(),
            ))
        }
    }

    #[test]
    fn install_seeds_defaults_and_schedules() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let outcome = engine.on_installed().unwrap();
        assert_eq!(
            outcome,
            Outcome::Scheduled {
                schedule: ScheduleOutcome::Scheduled {
                    next_break_at: 50 * MINUTE_MS,
                    preserved: false,
                    armed: true,
                }
            }
        );
        let settings = Settings::from_map(&fx.store.snapshot());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn install_keeps_existing_settings() {
        let fx = Fixture::new();
        let mut custom = Settings::default();
        custom.work_interval_minutes = 20;
        fx.store.set(custom.to_entries()).unwrap();

        fx.engine().on_installed().unwrap();
        assert_eq!(fx.alarms.fire_time(AlarmName::Break), Some(20 * MINUTE_MS));
    }

    #[test]
    fn full_cycle_with_default_settings() {
        let fx = Fixture::new();
        let engine = fx.engine();
        engine.on_installed().unwrap();

        fx.clock.advance_minutes(49);
        assert!(engine.deliver_due().unwrap().is_empty());

        fx.clock.advance_minutes(1);
        let outcomes = engine.deliver_due().unwrap();
        assert!(matches!(outcomes[..], [Outcome::Locked { .. }]));
        assert_eq!(fx.surfaces.resource(1).as_deref(), Some(LOCKED));
        assert_eq!(fx.surfaces.resource(2).as_deref(), Some(LOCKED));
        assert_eq!(engine.status().unwrap().phase, Phase::Locked);
        assert_eq!(fx.alarms.fire_time(AlarmName::Unlock), Some(60 * MINUTE_MS));
        assert_eq!(fx.alarms.fire_time(AlarmName::Break), None);

        fx.clock.advance_minutes(10);
        let outcomes = engine.deliver_due().unwrap();
        assert!(matches!(outcomes[..], [Outcome::Unlocked { .. }]));
        assert_eq!(fx.surfaces.resource(1).as_deref(), Some("https://a/"));
        assert_eq!(fx.surfaces.resource(2).as_deref(), Some("https://b/"));

        let status = engine.status().unwrap();
        assert_eq!(status.phase, Phase::AwaitingBreak);
        assert_eq!(status.remaining_ms, Some(50 * MINUTE_MS));
        assert_eq!(fx.alarms.fire_time(AlarmName::Break), Some(110 * MINUTE_MS));
        assert_eq!(fx.alarms.fire_time(AlarmName::Unlock), None);
    }

    #[test]
    fn duplicate_break_delivery_keeps_original_lock() {
        let fx = Fixture::new();
        let engine = fx.engine();
        engine.on_installed().unwrap();
        fx.clock.advance_minutes(50);
        engine.dispatch(Event::BreakTimerFired).unwrap();

        fx.clock.advance_minutes(2);
        let outcome = engine.dispatch(Event::BreakTimerFired).unwrap();
        let Outcome::Locked { report } = outcome else {
            panic!("expected lock report, got {outcome:?}");
        };
        assert!(report.already_active);
        assert_eq!(report.lock_end_at, 60 * MINUTE_MS);
    }

    #[test]
    fn stale_break_after_reschedule_is_ignored() {
        let fx = Fixture::new();
        let engine = fx.engine();
        engine.on_installed().unwrap();
        fx.clock.advance_minutes(30);
        engine.dispatch(Command::Reschedule.into()).unwrap();

        fx.clock.advance_minutes(20);
        let outcome = engine.dispatch(Event::BreakTimerFired).unwrap();
        assert!(matches!(outcome, Outcome::Ignored { .. }));
        assert!(fx.surfaces.updates().is_empty());
    }

    #[test]
    fn break_is_ignored_when_disabled() {
        let fx = Fixture::new();
        let engine = fx.engine();
        engine.on_installed().unwrap();
        engine.dispatch(Command::Stop.into()).unwrap();
        fx.clock.advance_minutes(50);
        let outcome = engine.dispatch(Event::BreakTimerFired).unwrap();
        assert!(matches!(outcome, Outcome::Ignored { .. }));
    }

    #[test]
    fn early_unlock_delivery_is_ignored() {
        let fx = Fixture::new();
        let engine = fx.engine();
        engine.on_installed().unwrap();
        fx.clock.advance_minutes(50);
        engine.dispatch(Event::BreakTimerFired).unwrap();

        fx.clock.advance_minutes(5);
        let outcome = engine.dispatch(Event::UnlockTimerFired).unwrap();
        assert!(matches!(outcome, Outcome::Ignored { .. }));
        assert_eq!(engine.status().unwrap().phase, Phase::Locked);
    }

    #[test]
    fn new_surface_during_lock_is_redirected() {
        let fx = Fixture::new();
        let engine = fx.engine();
        engine.on_installed().unwrap();
        fx.clock.advance_minutes(50);
        engine.deliver_due().unwrap();

        fx.surfaces.insert(3, "https://new/");
        let outcome = engine
            .dispatch(Event::SurfaceCreated {
                surface: Surface::new(3, "https://new/"),
            })
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Enforced {
                enforcement: Enforcement::Redirected { surface: 3 }
            }
        );

        fx.surfaces.navigate(1, "https://escape/");
        let outcome = engine
            .dispatch(Event::SurfaceNavigated {
                surface: Surface::new(1, "https://escape/"),
                phase: NavigationPhase::Loading,
            })
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Enforced {
                enforcement: Enforcement::Redirected { surface: 1 }
            }
        ));
    }

    #[test]
    fn restart_during_lock_resumes_unlock() {
        let fx = Fixture::new();
        fx.engine().on_installed().unwrap();
        fx.clock.advance_minutes(50);
        fx.engine().deliver_due().unwrap();

        fx.alarms.cancel_all().unwrap();
        fx.clock.advance_minutes(3);
        let outcome = fx.engine().on_startup().unwrap();
        assert_eq!(
            outcome,
            Outcome::Resumed {
                lock_end_at: 60 * MINUTE_MS
            }
        );
        assert_eq!(fx.alarms.fire_time(AlarmName::Unlock), Some(60 * MINUTE_MS));
    }

    #[test]
    fn restart_keeps_pending_break_time() {
        let fx = Fixture::new();
        fx.engine().on_installed().unwrap();
        fx.clock.advance_minutes(10);
        let outcome = fx.engine().dispatch(Event::Startup).unwrap();
        assert_eq!(
            outcome,
            Outcome::Scheduled {
                schedule: ScheduleOutcome::Scheduled {
                    next_break_at: 50 * MINUTE_MS,
                    preserved: true,
                    armed: true,
                }
            }
        );
    }

    #[test]
    fn failed_arming_leaves_nothing_to_deliver() {
        let fx = Fixture::new();
        fx.alarms.fail_arming(true);
        let engine = fx.engine();
        engine.on_installed().unwrap();
        fx.clock.advance_minutes(60);
        assert!(engine.deliver_due().unwrap().is_empty());

        fx.alarms.fail_arming(false);
        engine.on_startup().unwrap();
        assert!(fx.alarms.fire_time(AlarmName::Break).is_some());
    }

    #[test]
    fn refused_install_write_leaves_store_empty() {
        let fx = Fixture::new();
        fx.store.fail_writes(true);
        let engine = fx.engine();
        assert!(engine.on_installed().unwrap_err().is_retryable());
        assert!(fx.store.is_empty().unwrap());
        assert!(fx.alarms.armed().unwrap().is_empty());

        fx.store.fail_writes(false);
        engine.on_installed().unwrap();
        assert_eq!(fx.store.write_count(), 1);
    }

    #[test]
    fn break_delivery_is_retried_after_refused_write() {
        let fx = Fixture::new();
        let engine = fx.engine();
        engine.on_installed().unwrap();

        fx.clock.advance_minutes(50);
        fx.store.fail_writes(true);
        assert!(engine.deliver_due().is_err());
        assert_eq!(fx.alarms.fire_time(AlarmName::Break), Some(50 * MINUTE_MS));
        assert_eq!(fx.surfaces.resource(1).as_deref(), Some("https://a/"));
        assert_eq!(engine.status().unwrap().phase, Phase::AwaitingBreak);

        fx.store.fail_writes(false);
        let outcomes = engine.deliver_due().unwrap();
        assert!(matches!(outcomes.as_slice(), [Outcome::Locked { .. }]));
        assert!(fx.alarms.fire_time(AlarmName::Break).is_none());
        assert_eq!(fx.surfaces.resource(1).as_deref(), Some(LOCKED));
    }
}
