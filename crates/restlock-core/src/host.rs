//! The set of host capabilities the state machine runs against.

use crate::storage::StateStore;
use crate::surface::{LockedResource, SurfaceController};
use crate::timer::{AlarmService, Clock};

/// Ports injected into every core component.
///
/// Components hold no state of their own; everything they know comes from
/// `store` at the time an event is handled.
#[derive(Clone)]
pub struct Host<'a> {
    pub store: &'a dyn StateStore,
    pub alarms: &'a dyn AlarmService,
    pub surfaces: &'a dyn SurfaceController,
    pub clock: &'a dyn Clock,
    pub locked: LockedResource,
}

impl<'a> Host<'a> {
    pub fn new(
        store: &'a dyn StateStore,
        alarms: &'a dyn AlarmService,
        surfaces: &'a dyn SurfaceController,
        clock: &'a dyn Clock,
        locked: LockedResource,
    ) -> Self {
        Self {
            store,
            alarms,
            surfaces,
            clock,
            locked,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
