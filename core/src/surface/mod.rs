//! Drawable surfaces and the globally-queried alias
//!
//! Modules find their surface by looking up one well-known name. Every
//! surface also has a permanent unique name, and the [`SurfaceArbiter`]
//! lends the well-known name to one surface at a time.
//!
//! - [`SurfaceHost`] - Where surfaces live (a UI toolkit, or the in-memory [`SurfaceTable`])
//! - [`SurfaceArbiter`] - Unique ids and the FIFO alias queue

mod arbiter;


use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;

pub use arbiter::SurfaceArbiter;

/// The name a module's init and shutdown code looks up to find its surface
pub const SURFACE_ALIAS: &str = "canvas";

/// Permanent, process-unique surface identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    /// Handle value passed across the module boundary
    pub fn handle(self) -> i32 {
        i32::try_from(self.0).unwrap_or(-1)
    }

    pub fn from_handle(handle: i32) -> Option<Self> {
        u64::try_from(handle).ok().map(SurfaceId)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Owner of the drawable surfaces modules render into.
///
/// Calls arrive from the bridge and from module host imports, possibly on
/// different threads.
pub trait SurfaceHost: Send + Sync {
    /// Create and mount a surface under its permanent name
    fn create(&self, surface: SurfaceId);

    /// Detach and discard a surface
    fn remove(&self, surface: SurfaceId);

    /// Rename the surface to [`SURFACE_ALIAS`]
    fn claim_alias(&self, surface: SurfaceId);

    /// Restore the surface's permanent name
    fn release_alias(&self, surface: SurfaceId);

    /// Resolve a name lookup made by the module running on `caller`
    fn query(&self, name: &str, caller: SurfaceId) -> Option<SurfaceId>;

    /// The module running on `caller` attaches its input handling to `target`
    fn bind_input(&self, target: SurfaceId, caller: SurfaceId);
}

/// Everything [`SurfaceTable`] observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Created(SurfaceId),
    Removed(SurfaceId),
    AliasClaimed(SurfaceId),
    AliasReleased(SurfaceId),
    Queried {
        name: String,
        caller: SurfaceId,
        resolved: Option<SurfaceId>,
    },
    Bound {
        target: SurfaceId,
        caller: SurfaceId,
    },
}

#[derive(Default)]
struct TableInner {
    names: HashMap<SurfaceId, String>,
    events: Vec<SurfaceEvent>,
    max_alias_holders: usize,
    misroutes: usize,
}

impl TableInner {
    fn alias_holders(&self) -> usize {
        self.names.values().filter(|n| *n == SURFACE_ALIAS).count()
    }
}

/// In-memory surface host.
///
/// Keeps an event log and flags any moment where the alias is held by more
/// than one surface, or where a module reaches a surface other than its own.
#[derive(Default)]
pub struct SurfaceTable {
    inner: Mutex<TableInner>,
}

impl SurfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.lock().events.clone()
    }

    pub fn is_live(&self, surface: SurfaceId) -> bool {
        self.lock().names.contains_key(&surface)
    }

    /// Current name of a live surface
    pub fn name_of(&self, surface: SurfaceId) -> Option<String> {
        self.lock().names.get(&surface).cloned()
    }

    pub fn alias_holder(&self) -> Option<SurfaceId> {
        let inner = self.lock();
        inner
            .names
            .iter()
            .find(|(_, name)| *name == SURFACE_ALIAS)
            .map(|(id, _)| *id)
    }

    /// Highest number of surfaces that held the alias at the same time
    pub fn max_alias_holders(&self) -> usize {
        self.lock().max_alias_holders
    }

    /// Lookups or bindings that reached another instance's surface
    pub fn misroutes(&self) -> usize {
        self.lock().misroutes
    }

    pub fn live_count(&self) -> usize {
        self.lock().names.len()
    }
}

impl SurfaceHost for SurfaceTable {
    fn create(&self, surface: SurfaceId) {
        let mut inner = self.lock();
        inner.names.insert(surface, surface.to_string());
        inner.events.push(SurfaceEvent::Created(surface));
    }

    fn remove(&self, surface: SurfaceId) {
        let mut inner = self.lock();
        if inner.names.remove(&surface).is_none() {
            tracing::warn!(%surface, "removing unknown surface");
        }
        inner.events.push(SurfaceEvent::Removed(surface));
    }

    fn claim_alias(&self, surface: SurfaceId) {
        let mut inner = self.lock();
        match inner.names.get_mut(&surface) {
            Some(name) => *name = SURFACE_ALIAS.to_string(),
            None => tracing::warn!(%surface, "alias claimed for unknown surface"),
        }
        let holders = inner.alias_holders();
        if holders > 1 {
            tracing::error!(%surface, holders, "surface alias held by more than one surface");
        }
        inner.max_alias_holders = inner.max_alias_holders.max(holders);
        inner.events.push(SurfaceEvent::AliasClaimed(surface));
    }

    fn release_alias(&self, surface: SurfaceId) {
        let mut inner = self.lock();
        if let Some(name) = inner.names.get_mut(&surface) {
            *name = surface.to_string();
        }
        inner.events.push(SurfaceEvent::AliasReleased(surface));
    }

    fn query(&self, name: &str, caller: SurfaceId) -> Option<SurfaceId> {
        let mut inner = self.lock();
        let mut matches = inner
            .names
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id);
        let resolved = matches.next();
        let ambiguous = matches.next().is_some();

        if ambiguous || resolved.is_some_and(|id| id != caller) {
            tracing::error!(%caller, name, ?resolved, "surface lookup reached another instance");
            inner.misroutes += 1;
        }
        inner.events.push(SurfaceEvent::Queried {
            name: name.to_string(),
            caller,
            resolved,
        });
        resolved
    }

    fn bind_input(&self, target: SurfaceId, caller: SurfaceId) {
        let mut inner = self.lock();
        if target != caller {
            tracing::error!(%caller, %target, "module bound input to another instance's surface");
            inner.misroutes += 1;
        }
        inner.events.push(SurfaceEvent::Bound { target, caller });
    }
}
