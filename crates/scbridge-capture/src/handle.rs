//! Ownership tracking for native handles.
//!
//! Every native object the core holds is wrapped in an [`OwnedHandle`]. The
//! guard is registered in a [`HandleRegistry`] and gives its reference back to
//! the backend exactly once, when it is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::native::{NativeBackend, NativeToken};

/// Kind of native resource behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    ContentSnapshot,
    Display,
    Window,
    Application,
    Filter,
    Configuration,
    Stream,
    Image,
}

impl HandleKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::ContentSnapshot => "content snapshot",
            Self::Display => "display",
            Self::Window => "window",
            Self::Application => "application",
            Self::Filter => "filter",
            Self::Configuration => "configuration",
            Self::Stream => "stream",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry-assigned identity of a live handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct HandleEntry {
    kind: HandleKind,
    token: NativeToken,
}

/// Tracks every live handle and returns references to the backend.
pub struct HandleRegistry {
    backend: Arc<dyn NativeBackend>,
    entries: Mutex<HashMap<HandleId, HandleEntry>>,
    next_id: AtomicU64,
    released: AtomicU64,
}

impl HandleRegistry {
    /// Create a registry that releases into the given backend.
    pub fn new(backend: Arc<dyn NativeBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            released: AtomicU64::new(0),
        })
    }

    /// Take ownership of the single reference a native call returned.
    pub fn adopt(self: &Arc<Self>, kind: HandleKind, token: NativeToken) -> OwnedHandle {
        let id = HandleId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().insert(id, HandleEntry { kind, token });

        trace!(%id, %kind, %token, "Adopted native handle");

        OwnedHandle {
            id,
            kind,
            token,
            registry: Arc::clone(self),
        }
    }

    fn release(&self, id: HandleId) {
        let entry = self.entries.lock().remove(&id);

        match entry {
            Some(entry) => {
                trace!(%id, kind = %entry.kind, token = %entry.token, "Releasing native handle");
                self.backend.release(entry.token);
                self.released.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                // Guards are not Clone and release consumes them, so this is a bug.
                error!(%id, "Release of unknown handle ignored");
            }
        }
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Number of live handles of one kind.
    pub fn live_count_of(&self, kind: HandleKind) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Snapshot of live handles, ordered by id.
    pub fn live_handles(&self) -> Vec<(HandleId, HandleKind)> {
        let mut handles: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(id, entry)| (*id, entry.kind))
            .collect();
        handles.sort_by_key(|(id, _)| *id);
        handles
    }

    /// Total handles released since the registry was created.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("backend", &self.backend.name())
            .field("live", &self.live_count())
            .field("released", &self.released_count())
            .finish()
    }
}

/// Sole owner of one native reference.
///
/// Not `Clone`. Share it behind an `Arc` when several wrappers need the same
/// native object.
pub struct OwnedHandle {
    id: HandleId,
    kind: HandleKind,
    token: NativeToken,
    registry: Arc<HandleRegistry>,
}

impl OwnedHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn token(&self) -> NativeToken {
        self.token
    }

    /// Release the handle now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedBackend;

    fn registry_with_sim() -> (Arc<SimulatedBackend>, Arc<HandleRegistry>) {
        let sim = Arc::new(SimulatedBackend::new());
        let registry = HandleRegistry::new(sim.clone());
        (sim, registry)
    }

    #[test]
    fn test_drop_releases_exactly_once() {
        let (sim, registry) = registry_with_sim();
        let token = sim.allocate_test_object();
        assert_eq!(sim.live_objects(), 1);

        let handle = registry.adopt(HandleKind::Image, token);
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.live_count_of(HandleKind::Image), 1);

        handle.release();
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 1);
        assert_eq!(sim.live_objects(), 0);
        assert_eq!(sim.over_releases(), 0);
    }

    #[test]
    fn test_release_does_not_disturb_siblings() {
        let (sim, registry) = registry_with_sim();
        let first = registry.adopt(HandleKind::Window, sim.allocate_test_object());
        let second = registry.adopt(HandleKind::Window, sim.allocate_test_object());
        let second_token = second.token();

        drop(first);

        assert_eq!(registry.live_handles(), vec![(second.id(), HandleKind::Window)]);
        assert_eq!(second.token(), second_token);
        assert_eq!(sim.live_objects(), 1);
    }
}
