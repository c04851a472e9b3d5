//! Named one-shot alarms.
//!
//! The host delivers an alarm at-least-once when its absolute time is
//! reached, even across restarts. Handlers must tolerate duplicates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The two wake-ups the cycle uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmName {
    Break,
    Unlock,
}

impl AlarmName {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmName::Break => "break",
            AlarmName::Unlock => "unlock",
        }
    }
}

impl fmt::Display for AlarmName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "break" => Ok(AlarmName::Break),
            "unlock" => Ok(AlarmName::Unlock),
            other => Err(CoreError::alarm(other, "unknown alarm name")),
        }
    }
}

/// An armed alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub name: AlarmName,
    /// Epoch ms.
    pub fire_at: u64,
}

/// Host capability to arm and cancel named one-shot alarms.
///
/// Arming a name that is already armed replaces it. Cancellation is always
/// explicit.
pub trait AlarmService {
    fn arm(&self, name: AlarmName, fire_at: u64) -> Result<()>;

    fn cancel(&self, name: AlarmName) -> Result<()>;

    fn cancel_all(&self) -> Result<()>;

    /// Currently armed alarms, ordered by fire time.
    fn armed(&self) -> Result<Vec<Alarm>>;

    /// Alarms whose time has come. Not removed until acknowledged.
    fn due(&self, now_ms: u64) -> Result<Vec<Alarm>> {
        Ok(self
            .armed()?
            .into_iter()
            .filter(|a| a.fire_at <= now_ms)
            .collect())
    }

    /// Mark a delivered alarm as done. A no-op if the name was re-armed for
    /// a different time in the meantime.
    fn acknowledge(&self, alarm: Alarm) -> Result<()>;
}
