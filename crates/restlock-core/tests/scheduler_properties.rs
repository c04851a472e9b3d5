//! Property tests for scheduling and the lock cycle.

use proptest::prelude::*;
use restlock_core::storage::{MemoryAlarms, MemoryStore, MemorySurfaces};
use restlock_core::timer::MINUTE_MS;
use restlock_core::{
    AlarmName, BreakScheduler, Command, Engine, Event, Host, LockedResource, ManualClock, Phase,
    ScheduleOutcome,
};

struct World {
    store: MemoryStore,
    alarms: MemoryAlarms,
    surfaces: MemorySurfaces,
    clock: ManualClock,
}

impl World {
    fn new(surface_count: u64) -> Self {
        Self {
            store: MemoryStore::new(),
            alarms: MemoryAlarms::new(),
            surfaces: MemorySurfaces::with_surfaces(
                (1..=surface_count).map(|id| (id, format!("https://site-{id}.example/"))),
            ),
            clock: ManualClock::new(0),
        }
    }

    fn host(&self) -> Host<'_> {
        Host::new(
            &self.store,
            &self.alarms,
            &self.surfaces,
            &self.clock,
            LockedResource::default(),
        )
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn repeated_scheduling_never_moves_a_future_break(
        interval in 1i64..240,
        offsets in proptest::collection::vec(0u64..60, 1..8)
    ) {
        let world = World::new(0);
        let host = world.host();
        let engine = Engine::new(host.clone());
        engine.dispatch(Command::Configure {
            work_interval_minutes: Some(interval),
            break_duration_minutes: Some(5),
        }.into()).unwrap();
        let first = interval as u64 * MINUTE_MS;

        let scheduler = BreakScheduler::new(&host);
        for offset in offsets {
            let at = (offset * MINUTE_MS).min(first - 1);
            world.clock.set(at);
            let outcome = scheduler.schedule_next_break().unwrap();
            prop_assert_eq!(outcome.next_break_at(), Some(first));
        }
        prop_assert_eq!(world.alarms.fire_time(AlarmName::Break), Some(first));
    }

    #[test]
    fn every_surface_is_restored_after_a_break(
        surfaces in 0u64..12,
        interval in 1i64..90,
        duration in 1i64..30
    ) {
        let world = World::new(surfaces);
        let engine = Engine::new(world.host());
        engine.dispatch(Command::Configure {
            work_interval_minutes: Some(interval),
            break_duration_minutes: Some(duration),
        }.into()).unwrap();

        world.clock.advance_minutes(interval as u64);
        engine.deliver_due().unwrap();
        prop_assert_eq!(engine.status().unwrap().phase, Phase::Locked);
        for id in 1..=surfaces {
            let resource = world.surfaces.resource(id);
            prop_assert_eq!(resource.as_deref(), Some(LockedResource::DEFAULT));
        }

        world.clock.advance_minutes(duration as u64);
        engine.deliver_due().unwrap();
        prop_assert_eq!(engine.status().unwrap().phase, Phase::AwaitingBreak);
        for id in 1..=surfaces {
            let expected = format!("https://site-{id}.example/");
            prop_assert_eq!(world.surfaces.resource(id), Some(expected));
        }
    }

    #[test]
    fn an_enabled_idle_system_always_has_a_pending_break(
        events in proptest::collection::vec(0u8..6, 1..30)
    ) {
        let world = World::new(2);
        let engine = Engine::new(world.host());
        engine.on_installed().unwrap();

        for code in events {
            world.clock.advance_minutes(7);
            let event = match code {
                0 => Event::Startup,
                1 => Command::Start.into(),
                2 => Command::Reschedule.into(),
                3 => Event::BreakTimerFired,
                4 => Event::UnlockTimerFired,
                _ => Event::Installed,
            };
            engine.dispatch(event).unwrap();
            engine.deliver_due().unwrap();

            let status = engine.status().unwrap();
            match status.phase {
                Phase::AwaitingBreak => {
                    prop_assert!(world.alarms.fire_time(AlarmName::Break).is_some());
                    prop_assert!(status.next_break_at.is_some());
                }
                Phase::Locked => {
                    prop_assert!(world.alarms.fire_time(AlarmName::Unlock).is_some());
                }
                Phase::Paused => prop_assert!(false, "never stopped, cannot be paused"),
            }
        }
    }
}

#[test]
fn scheduling_while_disabled_arms_nothing() {
    let world = World::new(0);
    let host = world.host();
    let engine = Engine::new(host.clone());
    engine.dispatch(Command::Stop.into()).unwrap();
    let outcome = BreakScheduler::new(&host).schedule_next_break().unwrap();
    assert_eq!(outcome, ScheduleOutcome::Disabled);
    assert!(world.alarms.fire_time(AlarmName::Break).is_none());
}
