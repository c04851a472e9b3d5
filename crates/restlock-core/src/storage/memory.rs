//! In-memory host adapters.
//!
//! Used by tests and by embedders that bring their own persistence.
//! Each adapter has a failure switch: `MemoryStore` can refuse writes and
//! `MemorySurfaces` can fail for specific surfaces, so tests reach both the
//! propagating and the best-effort paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::StateStore;
use crate::error::{DatabaseError, Result, SurfaceError};
use crate::state::StateMap;
use crate::surface::{Surface, SurfaceController, SurfaceId};
use crate::timer::{Alarm, AlarmName, AlarmService};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<StateMap>,
    writes: Mutex<usize>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls so far.
    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }

    pub fn snapshot(&self) -> StateMap {
        lock(&self.entries).clone()
    }

    /// Make every subsequent `set` fail without applying any entry.
    pub fn fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }
}

impl StateStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<StateMap> {
        let entries = lock(&self.entries);
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| ((*k).to_string(), v.clone())))
            .collect())
    }

    fn set(&self, entries: StateMap) -> Result<()> {
        if *lock(&self.fail_writes) {
            return Err(DatabaseError::QueryFailed("disk I/O error".into()).into());
        }
        lock(&self.entries).extend(entries);
        *lock(&self.writes) += 1;
        Ok(())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(lock(&self.entries).is_empty())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAlarms {
    alarms: Mutex<BTreeMap<AlarmName, u64>>,
    fail_arm: Mutex<bool>,
}

impl MemoryAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `arm` fail (host refused).
    pub fn fail_arming(&self, fail: bool) {
        *lock(&self.fail_arm) = fail;
    }

    pub fn fire_time(&self, name: AlarmName) -> Option<u64> {
        lock(&self.alarms).get(&name).copied()
    }
}

impl AlarmService for MemoryAlarms {
    fn arm(&self, name: AlarmName, fire_at: u64) -> Result<()> {
        if *lock(&self.fail_arm) {
            return Err(crate::error::CoreError::alarm(name.as_str(), "arming refused"));
        }
        lock(&self.alarms).insert(name, fire_at);
        Ok(())
    }

    fn cancel(&self, name: AlarmName) -> Result<()> {
        lock(&self.alarms).remove(&name);
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        lock(&self.alarms).clear();
        Ok(())
    }

    fn armed(&self) -> Result<Vec<Alarm>> {
        let mut alarms: Vec<Alarm> = lock(&self.alarms)
            .iter()
            .map(|(name, fire_at)| Alarm {
                name: *name,
                fire_at: *fire_at,
            })
            .collect();
        alarms.sort_by_key(|a| (a.fire_at, a.name));
        Ok(alarms)
    }

    fn acknowledge(&self, alarm: Alarm) -> Result<()> {
        let mut alarms = lock(&self.alarms);
        if alarms.get(&alarm.name) == Some(&alarm.fire_at) {
            alarms.remove(&alarm.name);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySurfaces {
    surfaces: Mutex<BTreeMap<SurfaceId, Option<String>>>,
    /// Surfaces reported by `list_all` without an id.
    anonymous: Mutex<Vec<Option<String>>>,
    failing: Mutex<BTreeSet<SurfaceId>>,
    fail_list: Mutex<bool>,
    updates: Mutex<Vec<(SurfaceId, String)>>,
}

impl MemorySurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_surfaces<I, S>(surfaces: I) -> Self
    where
        I: IntoIterator<Item = (SurfaceId, S)>,
        S: Into<String>,
    {
        let host = Self::default();
        for (id, resource) in surfaces {
            host.insert(id, resource);
        }
        host
    }

    pub fn insert(&self, id: SurfaceId, resource: impl Into<String>) {
        lock(&self.surfaces).insert(id, Some(resource.into()));
    }

    pub fn insert_blank(&self, id: SurfaceId) {
        lock(&self.surfaces).insert(id, None);
    }

    pub fn insert_anonymous(&self, resource: impl Into<String>) {
        lock(&self.anonymous).push(Some(resource.into()));
    }

    pub fn close(&self, id: SurfaceId) {
        lock(&self.surfaces).remove(&id);
    }

    /// Simulate the user navigating a surface without going through
    /// `set_resource` (no update is recorded).
    pub fn navigate(&self, id: SurfaceId, resource: impl Into<String>) {
        if let Some(slot) = lock(&self.surfaces).get_mut(&id) {
            *slot = Some(resource.into());
        }
    }

    /// Make `set_resource` fail for this surface.
    pub fn fail_on(&self, id: SurfaceId) {
        lock(&self.failing).insert(id);
    }

    pub fn fail_listing(&self, fail: bool) {
        *lock(&self.fail_list) = fail;
    }

    pub fn resource(&self, id: SurfaceId) -> Option<String> {
        lock(&self.surfaces).get(&id).cloned().flatten()
    }

    /// Every successful `set_resource` call, in order.
    pub fn updates(&self) -> Vec<(SurfaceId, String)> {
        lock(&self.updates).clone()
    }
}

impl SurfaceController for MemorySurfaces {
    fn list_all(&self) -> Result<Vec<Surface>, SurfaceError> {
        if *lock(&self.fail_list) {
            return Err(SurfaceError::ListFailed("host unavailable".into()));
        }
        let mut all: Vec<Surface> = lock(&self.surfaces)
            .iter()
            .map(|(id, resource)| Surface {
                id: Some(*id),
                resource: resource.clone(),
            })
            .collect();
        all.extend(lock(&self.anonymous).iter().map(|resource| Surface {
            id: None,
            resource: resource.clone(),
        }));
        Ok(all)
    }

    fn get(&self, id: SurfaceId) -> Result<Option<Surface>, SurfaceError> {
        Ok(lock(&self.surfaces).get(&id).map(|resource| Surface {
            id: Some(id),
            resource: resource.clone(),
        }))
    }

    fn set_resource(&self, id: SurfaceId, resource: &str) -> Result<(), SurfaceError> {
        if lock(&self.failing).contains(&id) {
            return Err(SurfaceError::Rejected {
                id,
                message: "permission denied".into(),
            });
        }
        let mut surfaces = lock(&self.surfaces);
        let slot = surfaces.get_mut(&id).ok_or(SurfaceError::NotFound(id))?;
        *slot = Some(resource.to_string());
        lock(&self.updates).push((id, resource.to_string()));
        Ok(())
    }
}
