//! Retain-counted object table of the simulated backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::stream::SimStream;
use crate::configuration::StreamConfiguration;
use crate::filter::ContentFilter;
use crate::native::NativeToken;

/// What a simulated native object holds.
pub(crate) enum SimPayload {
    Snapshot,
    Display,
    Window,
    Application,
    Filter(ContentFilter),
    Configuration(StreamConfiguration),
    Stream(Arc<SimStream>),
    Image,
    Opaque,
}

impl SimPayload {
    fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Display => "display",
            Self::Window => "window",
            Self::Application => "application",
            Self::Filter(_) => "filter",
            Self::Configuration(_) => "configuration",
            Self::Stream(_) => "stream",
            Self::Image => "image",
            Self::Opaque => "opaque",
        }
    }
}

struct SimObject {
    retain_count: u32,
    payload: SimPayload,
}

#[derive(Default)]
pub(crate) struct ObjectTable {
    objects: Mutex<HashMap<u64, SimObject>>,
    next: AtomicU64,
    over_releases: AtomicU64,
}

impl ObjectTable {
    /// Create an object with one reference owned by the caller.
    pub fn allocate(&self, payload: SimPayload) -> NativeToken {
        let raw = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.objects.lock().insert(
            raw,
            SimObject {
                retain_count: 1,
                payload,
            },
        );
        NativeToken::from_raw(raw)
    }

    /// Take another reference. Returns false for unknown tokens.
    pub fn retain(&self, token: NativeToken) -> bool {
        match self.objects.lock().get_mut(&token.raw()) {
            Some(object) => {
                object.retain_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one reference. The payload of a destroyed object is returned so
    /// it can be torn down outside the table lock.
    pub fn release(&self, token: NativeToken) -> Option<SimPayload> {
        let mut objects = self.objects.lock();
        let remaining = match objects.get_mut(&token.raw()) {
            Some(object) => {
                object.retain_count -= 1;
                object.retain_count
            }
            None => {
                self.over_releases.fetch_add(1, Ordering::Relaxed);
                warn!(%token, "Release of a dead simulated object");
                return None;
            }
        };

        if remaining == 0 {
            objects.remove(&token.raw()).map(|object| object.payload)
        } else {
            None
        }
    }

    pub fn with<R>(&self, token: NativeToken, f: impl FnOnce(&SimPayload) -> R) -> Option<R> {
        self.objects.lock().get(&token.raw()).map(|o| f(&o.payload))
    }

    pub fn stream(&self, token: NativeToken) -> Option<Arc<SimStream>> {
        self.with(token, |payload| match payload {
            SimPayload::Stream(stream) => Some(Arc::clone(stream)),
            _ => None,
        })
        .flatten()
    }

    /// Every live stream object.
    pub fn streams(&self) -> Vec<(NativeToken, Arc<SimStream>)> {
        let mut streams: Vec<_> = self
            .objects
            .lock()
            .iter()
            .filter_map(|(raw, object)| match &object.payload {
                SimPayload::Stream(stream) => {
                    Some((NativeToken::from_raw(*raw), Arc::clone(stream)))
                }
                _ => None,
            })
            .collect();
        streams.sort_by_key(|(token, _)| *token);
        streams
    }

    pub fn filter(&self, token: NativeToken) -> Option<ContentFilter> {
        self.with(token, |payload| match payload {
            SimPayload::Filter(filter) => Some(filter.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn configuration(&self, token: NativeToken) -> Option<StreamConfiguration> {
        self.with(token, |payload| match payload {
            SimPayload::Configuration(configuration) => Some(configuration.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn live_count(&self) -> usize {
        self.objects.lock().len()
    }

    /// Live objects per kind, for diagnostics.
    pub fn live_kinds(&self) -> Vec<(&'static str, usize)> {
        let mut counts: HashMap<&'static str, usize> = HashMap::new();
        for object in self.objects.lock().values() {
            *counts.entry(object.payload.kind()).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort();
        counts
    }

    pub fn over_releases(&self) -> u64 {
        self.over_releases.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_release_accounting() {
        let table = ObjectTable::default();
        let token = table.allocate(SimPayload::Opaque);
        assert!(table.retain(token));

        assert!(table.release(token).is_none());
        assert_eq!(table.live_count(), 1);
        assert!(matches!(table.release(token), Some(SimPayload::Opaque)));
        assert_eq!(table.live_count(), 0);

        assert!(table.release(token).is_none());
        assert_eq!(table.over_releases(), 1);
        assert!(!table.retain(token));
    }
}
