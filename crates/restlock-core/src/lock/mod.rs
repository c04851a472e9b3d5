//! Lock controller and lock enforcement.
//!
//! ## Lock Episode
//!
//! ```text
//! break alarm -> capture surfaces -> persist lock -> redirect all -> arm unlock
//! unlock alarm -> restore untouched surfaces -> clear lock -> schedule next break
//! ```
//!
//! While a lock is active, the [`Interceptor`] forces any surface that is
//! created or loads something else back to the locked resource.

mod controller;
mod interceptor;

pub use controller::{LockController, LockReport, RestoreReport};
pub use interceptor::{Enforcement, Interceptor};

use serde::Serialize;

use crate::surface::SurfaceId;

/// Per-surface results of a best-effort batch (redirect or restore).
///
/// Built by folding over the surfaces; one failure never stops the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub applied: Vec<SurfaceId>,
    pub skipped: Vec<SurfaceId>,
    pub failed: Vec<(SurfaceId, String)>,
}

impl BatchReport {
    fn apply(mut self, id: SurfaceId) -> Self {
        self.applied.push(id);
        self
    }

    fn skip(mut self, id: SurfaceId) -> Self {
        self.skipped.push(id);
        self
    }

    fn fail(mut self, id: SurfaceId, error: impl ToString) -> Self {
        self.failed.push((id, error.to_string()));
        self
    }
}
