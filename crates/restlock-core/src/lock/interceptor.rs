use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::host::Host;
use crate::state::{keys, LockState};
use crate::surface::{NavigationPhase, Surface, SurfaceId};

/// What the interceptor did with one surface notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Enforcement {
    /// No lock active.
    Inactive,
    /// Not a load event, or a surface without an id.
    Ignored,
    /// Already showing the locked resource.
    Allowed,
    Redirected { surface: SurfaceId },
    Failed { surface: SurfaceId, error: String },
}

/// Keeps every surface on the locked resource for the whole break window.
///
/// Reads the persisted lock flag on every notification; nothing is cached
/// because the process may have restarted since the lock began.
pub struct Interceptor<'a> {
    host: &'a Host<'a>,
}

impl<'a> Interceptor<'a> {
    pub fn new(host: &'a Host<'a>) -> Self {
        Self { host }
    }

    /// # Errors
    /// Returns an error when the lock flag cannot be read.
    pub fn on_created(&self, surface: &Surface) -> Result<Enforcement> {
        self.enforce(surface)
    }

    /// # Errors
    /// Returns an error when the lock flag cannot be read.
    pub fn on_navigated(&self, surface: &Surface, phase: NavigationPhase) -> Result<Enforcement> {
        if !phase.is_load() {
            return Ok(Enforcement::Ignored);
        }
        self.enforce(surface)
    }

    fn enforce(&self, surface: &Surface) -> Result<Enforcement> {
        let map = self.host.store.get(&[keys::LOCK_ACTIVE])?;
        if !LockState::from_map(&map).active {
            return Ok(Enforcement::Inactive);
        }
        let Some(id) = surface.id else {
            return Ok(Enforcement::Ignored);
        };
        if self.host.locked.shown_by(surface) {
            return Ok(Enforcement::Allowed);
        }

        match self.host.surfaces.set_resource(id, self.host.locked.as_str()) {
            Ok(()) => {
                debug!(surface = id, "forced surface back to lock");
                Ok(Enforcement::Redirected { surface: id })
            }
            Err(e) => {
                warn!(surface = id, error = %e, "failed to enforce lock");
                Ok(Enforcement::Failed {
                    surface: id,
                    error: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateMap;
    use crate::storage::{MemoryAlarms, MemoryStore, MemorySurfaces, StateStore};
    use crate::surface::LockedResource;
    use crate::timer::ManualClock;
    use serde_json::json;

    fn locked_store(active: bool) -> MemoryStore {
        let store = MemoryStore::new();
        let mut entries = StateMap::new();
        entries.insert(keys::LOCK_ACTIVE.into(), json!(active));
        store.set(entries).unwrap();
        store
    }

    fn run(store: &MemoryStore, surfaces: &MemorySurfaces, f: impl FnOnce(&Interceptor<'_>)) {
        let alarms = MemoryAlarms::new();
        let clock = ManualClock::new(0);
        let host = Host::new(store, &alarms, surfaces, &clock, LockedResource::default());
        f(&Interceptor::new(&host));
    }

    #[test]
    fn created_surface_is_forced_back_while_locked() {
        let store = locked_store(true);
        let surfaces = MemorySurfaces::with_surfaces([(5, "https://new/")]);
        run(&store, &surfaces, |i| {
            let result = i.on_created(&Surface::new(5, "https://new/")).unwrap();
            assert_eq!(result, Enforcement::Redirected { surface: 5 });
        });
        assert_eq!(surfaces.resource(5).as_deref(), Some(LockedResource::DEFAULT));
    }

    #[test]
    fn blank_new_surface_is_forced_back() {
        let store = locked_store(true);
        let surfaces = MemorySurfaces::new();
        surfaces.insert_blank(6);
        run(&store, &surfaces, |i| {
            let blank = Surface { id: Some(6), resource: None };
            assert_eq!(i.on_created(&blank).unwrap(), Enforcement::Redirected { surface: 6 });
        });
    }

    #[test]
    fn navigation_only_enforced_on_load_phases() {
        let store = locked_store(true);
        let surfaces = MemorySurfaces::with_surfaces([(1, "https://elsewhere/")]);
        run(&store, &surfaces, |i| {
            let s = Surface::new(1, "https://elsewhere/");
            assert_eq!(i.on_navigated(&s, NavigationPhase::Other).unwrap(), Enforcement::Ignored);
            assert_eq!(
                i.on_navigated(&s, NavigationPhase::Complete).unwrap(),
                Enforcement::Redirected { surface: 1 }
            );
        });
    }

    #[test]
    fn locked_resource_is_left_alone() {
        let store = locked_store(true);
        let surfaces = MemorySurfaces::with_surfaces([(1, LockedResource::DEFAULT)]);
        run(&store, &surfaces, |i| {
            let s = Surface::new(1, LockedResource::DEFAULT);
            assert_eq!(i.on_navigated(&s, NavigationPhase::Loading).unwrap(), Enforcement::Allowed);
        });
        assert!(surfaces.updates().is_empty());
    }

    #[test]
    fn nothing_happens_when_unlocked() {
        let store = locked_store(false);
        let surfaces = MemorySurfaces::with_surfaces([(1, "https://a/")]);
        run(&store, &surfaces, |i| {
            let s = Surface::new(1, "https://a/");
            assert_eq!(i.on_created(&s).unwrap(), Enforcement::Inactive);
        });
        assert!(surfaces.updates().is_empty());
    }

    #[test]
    fn enforcement_failure_is_reported_not_raised() {
        let store = locked_store(true);
        let surfaces = MemorySurfaces::with_surfaces([(1, "https://a/")]);
        surfaces.fail_on(1);
        run(&store, &surfaces, |i| {
            let result = i.on_created(&Surface::new(1, "https://a/")).unwrap();
            assert!(matches!(result, Enforcement::Failed { surface: 1, .. }));
        });
    }
}
