//! Persisted state model.
//!
//! Everything the break/lock cycle needs lives in the [`StateStore`] as a
//! flat key -> JSON map. The typed views here decode that map (absent or
//! malformed entries fall back to defaults) and encode the entries each
//! component is allowed to write.
//!
//! [`StateStore`]: crate::storage::StateStore

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::surface::SurfaceId;
use crate::timer::MINUTE_MS;

/// Flat key -> value map exchanged with the state store.
pub type StateMap = BTreeMap<String, Value>;

/// Persisted keys.
pub mod keys {
    pub const WORK_INTERVAL_MINUTES: &str = "work_interval_minutes";
    pub const BREAK_DURATION_MINUTES: &str = "break_duration_minutes";
    pub const ENABLED: &str = "enabled";
    pub const NEXT_BREAK_AT: &str = "next_break_at";
    pub const LOCK_ACTIVE: &str = "lock_active";
    pub const LOCK_END_AT: &str = "lock_end_at";
    pub const CAPTURED_SURFACES: &str = "captured_surfaces";

    pub const SETTINGS: [&str; 3] = [WORK_INTERVAL_MINUTES, BREAK_DURATION_MINUTES, ENABLED];
    pub const LOCK: [&str; 3] = [LOCK_ACTIVE, LOCK_END_AT, CAPTURED_SURFACES];
    pub const ALL: [&str; 7] = [
        WORK_INTERVAL_MINUTES,
        BREAK_DURATION_MINUTES,
        ENABLED,
        NEXT_BREAK_AT,
        LOCK_ACTIVE,
        LOCK_END_AT,
        CAPTURED_SURFACES,
    ];
}

pub const DEFAULT_WORK_INTERVAL_MINUTES: u32 = 50;
pub const DEFAULT_BREAK_DURATION_MINUTES: u32 = 10;

/// User-tunable break parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub work_interval_minutes: u32,
    pub break_duration_minutes: u32,
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_interval_minutes: DEFAULT_WORK_INTERVAL_MINUTES,
            break_duration_minutes: DEFAULT_BREAK_DURATION_MINUTES,
            enabled: true,
        }
    }
}

impl Settings {
    pub fn from_map(map: &StateMap) -> Self {
        Self {
            work_interval_minutes: minutes_or(
                map.get(keys::WORK_INTERVAL_MINUTES),
                DEFAULT_WORK_INTERVAL_MINUTES,
            ),
            break_duration_minutes: minutes_or(
                map.get(keys::BREAK_DURATION_MINUTES),
                DEFAULT_BREAK_DURATION_MINUTES,
            ),
            enabled: map
                .get(keys::ENABLED)
                .and_then(Value::as_bool)
                .unwrap_or(true),
        }
    }

    pub fn to_entries(&self) -> StateMap {
        let mut map = StateMap::new();
        map.insert(
            keys::WORK_INTERVAL_MINUTES.into(),
            self.work_interval_minutes.into(),
        );
        map.insert(
            keys::BREAK_DURATION_MINUTES.into(),
            self.break_duration_minutes.into(),
        );
        map.insert(keys::ENABLED.into(), self.enabled.into());
        map
    }

    pub fn work_interval_ms(&self) -> u64 {
        u64::from(self.work_interval_minutes) * MINUTE_MS
    }

    pub fn break_duration_ms(&self) -> u64 {
        u64::from(self.break_duration_minutes) * MINUTE_MS
    }
}

/// Validate a minutes value coming from outside the core.
///
/// # Errors
/// Returns an error when the value is zero, negative, or does not fit `u32`.
pub fn validate_minutes(field: &str, value: i64) -> Result<u32, ValidationError> {
    if value <= 0 {
        return Err(ValidationError::NonPositiveMinutes {
            field: field.to_string(),
            value,
        });
    }
    u32::try_from(value).map_err(|_| ValidationError::InvalidValue {
        field: field.to_string(),
        message: format!("{value} minutes is out of range"),
    })
}

fn minutes_or(value: Option<&Value>, default: u32) -> u32 {
    value
        .and_then(Value::as_i64)
        .and_then(|v| validate_minutes("minutes", v).ok())
        .unwrap_or(default)
}

fn timestamp(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_u64).filter(|ms| *ms > 0)
}

/// When the next break begins. Written by the break scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub next_break_at: Option<u64>,
}

impl ScheduleState {
    pub fn from_map(map: &StateMap) -> Self {
        Self {
            next_break_at: timestamp(map.get(keys::NEXT_BREAK_AT)),
        }
    }

    pub fn to_entries(&self) -> StateMap {
        let mut map = StateMap::new();
        map.insert(
            keys::NEXT_BREAK_AT.into(),
            self.next_break_at.map_or(Value::Null, Value::from),
        );
        map
    }
}

/// The current lock episode. Written only by the lock controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub active: bool,
    /// Epoch ms; 0 when no lock is active.
    pub lock_end_at: u64,
    pub captured_surfaces: BTreeMap<SurfaceId, String>,
}

impl LockState {
    pub fn from_map(map: &StateMap) -> Self {
        let captured_surfaces = map
            .get(keys::CAPTURED_SURFACES)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Self {
            active: map
                .get(keys::LOCK_ACTIVE)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            lock_end_at: timestamp(map.get(keys::LOCK_END_AT)).unwrap_or(0),
            captured_surfaces,
        }
    }

    pub fn to_entries(&self) -> StateMap {
        let captured: serde_json::Map<String, Value> = self
            .captured_surfaces
            .iter()
            .map(|(id, resource)| (id.to_string(), Value::from(resource.as_str())))
            .collect();
        let mut map = StateMap::new();
        map.insert(keys::LOCK_ACTIVE.into(), self.active.into());
        map.insert(keys::LOCK_END_AT.into(), self.lock_end_at.into());
        map.insert(keys::CAPTURED_SURFACES.into(), Value::Object(captured));
        map
    }

    /// The state written at unlock.
    pub fn cleared() -> Self {
        Self::default()
    }
}

/// Which half of the cycle the system is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingBreak,
    Locked,
    /// Disabled and not locked. Displayed only; the machine treats it as
    /// `AwaitingBreak` with no alarm armed.
    Paused,
}

/// Read-only snapshot of everything persisted, for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub settings: Settings,
    pub next_break_at: Option<DateTime<Utc>>,
    pub lock_end_at: Option<DateTime<Utc>>,
    /// Milliseconds until the next transition (break start or unlock).
    pub remaining_ms: Option<u64>,
    pub captured_surfaces: usize,
}

impl StatusSnapshot {
    pub fn from_map(map: &StateMap, now_ms: u64) -> Self {
        let settings = Settings::from_map(map);
        let schedule = ScheduleState::from_map(map);
        let lock = LockState::from_map(map);

        let phase = if lock.active {
            Phase::Locked
        } else if settings.enabled {
            Phase::AwaitingBreak
        } else {
            Phase::Paused
        };
        let target = match phase {
            Phase::Locked => Some(lock.lock_end_at).filter(|ms| *ms > 0),
            Phase::AwaitingBreak => schedule.next_break_at,
            Phase::Paused => None,
        };

        Self {
            phase,
            settings,
            next_break_at: schedule
                .next_break_at
                .filter(|_| phase == Phase::AwaitingBreak)
                .and_then(to_datetime),
            lock_end_at: Some(lock.lock_end_at)
                .filter(|_| lock.active)
                .and_then(to_datetime),
            remaining_ms: target.map(|at| at.saturating_sub(now_ms)),
            captured_surfaces: lock.captured_surfaces.len(),
        }
    }
}

pub fn to_datetime(epoch_ms: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(i64::try_from(epoch_ms).ok()?)
}
