//! Timer service port and time source.

mod alarm;
mod clock;

pub use alarm::{Alarm, AlarmName, AlarmService};
pub use clock::{Clock, ManualClock, SystemClock, MINUTE_MS};
