//! Surface controller port.
//!
//! A surface is an open browsing context (tab/window). The host enumerates
//! surfaces, reads and sets what each one displays, and reports creation and
//! navigation as [`Event`](crate::events::Event)s.

use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

pub type SurfaceId = u64;

/// One open surface as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    /// Some hosts report surfaces without an id (devtools, prerender).
    pub id: Option<SurfaceId>,
    pub resource: Option<String>,
}

impl Surface {
    pub fn new(id: SurfaceId, resource: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            resource: Some(resource.into()),
        }
    }

    pub fn resource_or_empty(&self) -> &str {
        self.resource.as_deref().unwrap_or("")
    }
}

/// Load phase carried by a navigation notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationPhase {
    Loading,
    Complete,
    /// Title/favicon/audible changes and the like.
    Other,
}

impl NavigationPhase {
    /// Only load start and load complete trigger enforcement.
    pub fn is_load(self) -> bool {
        matches!(self, NavigationPhase::Loading | NavigationPhase::Complete)
    }
}

/// The well-known resource representing the locked screen.
///
/// Matching is by prefix so the lock page with a query or fragment still
/// counts as locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockedResource(String);

impl LockedResource {
    pub const DEFAULT: &'static str = "restlock://locked";

    pub fn new(resource: impl Into<String>) -> Self {
        Self(resource.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, resource: &str) -> bool {
        !self.0.is_empty() && resource.starts_with(&self.0)
    }

    pub fn shown_by(&self, surface: &Surface) -> bool {
        surface.resource.as_deref().is_some_and(|r| self.matches(r))
    }
}

impl Default for LockedResource {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

/// Host capability to enumerate and redirect surfaces.
///
/// Every call is independent and best-effort: a failure for one surface says
/// nothing about the others.
pub trait SurfaceController {
    /// All currently open surfaces.
    fn list_all(&self) -> Result<Vec<Surface>, SurfaceError>;

    /// Look up one surface. `Ok(None)` when it no longer exists.
    fn get(&self, id: SurfaceId) -> Result<Option<Surface>, SurfaceError>;

    /// Point a surface at a new resource.
    fn set_resource(&self, id: SurfaceId, resource: &str) -> Result<(), SurfaceError>;
}
