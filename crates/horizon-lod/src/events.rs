//! Remote mutation notifications.
//!
//! The network layer reports that terrain inside a region changed
//! elsewhere. Events are collected in a [`MutationEventBuffer`] that is
//! double-buffered per frame, and applied to the store with
//! [`apply_mutations`].

use rustc_hash::FxHashSet;

use crate::region::RegionPos;
use crate::store::SpatialStore;

/// Terrain inside `region` changed and its LOD data is out of date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionMutationEvent {
    pub region: RegionPos,
}

/// Double-buffered mutation events.
///
/// Events sent during a frame become [`previous`](Self::previous) after
/// the next [`swap`](Self::swap) and are dropped after the one after that.
#[derive(Debug, Default)]
pub struct MutationEventBuffer {
    prev: Vec<RegionMutationEvent>,
    current: Vec<RegionMutationEvent>,
}

impl MutationEventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, event: RegionMutationEvent) {
        self.current.push(event);
    }

    /// All readable events, previous frame first.
    pub fn read(&self) -> impl Iterator<Item = &RegionMutationEvent> {
        self.prev.iter().chain(self.current.iter())
    }

    /// Events sent during the last completed frame.
    pub fn previous(&self) -> &[RegionMutationEvent] {
        &self.prev
    }

    pub fn len(&self) -> usize {
        self.prev.len() + self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance one frame. Call once per frame before sending new events.
    pub fn swap(&mut self) {
        self.prev.clear();
        std::mem::swap(&mut self.prev, &mut self.current);
    }

    pub fn clear(&mut self) {
        self.prev.clear();
        self.current.clear();
    }
}

/// Invalidate every distinct region named in `events`. Returns the loaded
/// regions that were marked dirty, in first-seen order.
pub fn apply_mutations(store: &SpatialStore, events: &[RegionMutationEvent]) -> Vec<RegionPos> {
    let mut seen = FxHashSet::default();
    let mut invalidated = Vec::new();
    for event in events {
        if seen.insert(event.region) && store.invalidate(event.region) {
            invalidated.push(event.region);
        }
    }
    if !invalidated.is_empty() {
        tracing::debug!("remote mutations invalidated {} region(s)", invalidated.len());
    }
    invalidated
}
