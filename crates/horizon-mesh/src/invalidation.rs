//! Mesh cache invalidation: tracks which region meshes are out of date
//! after their data, or a neighbour's, changes.

use horizon_lod::{Direction, RegionPos, SpatialKey};
use rustc_hash::FxHashMap;

/// Mesh cache state for one region at one detail level.
#[derive(Clone, Debug)]
pub struct RegionMeshState {
    /// Data version the current mesh was built from.
    pub meshed_version: u64,
    /// Bumped every time the region or a neighbour changes.
    pub data_version: u64,
    /// Whether a remesh task is already in flight.
    pub remesh_pending: bool,
}

impl RegionMeshState {
    /// A state with no mesh built yet, so it starts stale.
    pub fn new() -> Self {
        Self {
            meshed_version: 0,
            data_version: 1,
            remesh_pending: false,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.meshed_version != self.data_version
    }

    pub fn needs_remesh(&self) -> bool {
        self.is_stale() && !self.remesh_pending
    }

    pub fn mark_dirty(&mut self) {
        self.data_version += 1;
    }
}

impl Default for RegionMeshState {
    fn default() -> Self {
        Self::new()
    }
}

/// Determines which region meshes a data change affects.
pub struct MeshInvalidator;

impl MeshInvalidator {
    /// The changed region and its four neighbours. Side walls depend on
    /// the column across the edge, so neighbours always remesh too.
    pub fn invalidate(changed: RegionPos) -> Vec<RegionPos> {
        let mut dirty = Vec::with_capacity(5);
        dirty.push(changed);
        dirty.extend(Direction::ALL.map(|dir| changed.neighbor(dir)));
        dirty
    }
}

/// Mesh states for every region and level that has been meshed or
/// requested.
#[derive(Debug, Default)]
pub struct MeshTracker {
    states: FxHashMap<RegionPos, FxHashMap<u8, RegionMeshState>>,
}

impl MeshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `key`, created stale on first use.
    pub fn track(&mut self, key: SpatialKey) -> &mut RegionMeshState {
        self.states
            .entry(key.region)
            .or_default()
            .entry(key.detail_level)
            .or_default()
    }

    pub fn get(&self, key: SpatialKey) -> Option<&RegionMeshState> {
        self.states.get(&key.region)?.get(&key.detail_level)
    }

    /// Untracked keys always need a mesh.
    pub fn needs_remesh(&self, key: SpatialKey) -> bool {
        self.get(key).is_none_or(RegionMeshState::needs_remesh)
    }

    /// Mark every tracked level of `changed` and its neighbours dirty.
    /// Returns the number of states touched.
    pub fn invalidate(&mut self, changed: RegionPos) -> usize {
        let mut touched = 0;
        for pos in MeshInvalidator::invalidate(changed) {
            if let Some(levels) = self.states.get_mut(&pos) {
                for state in levels.values_mut() {
                    state.mark_dirty();
                    touched += 1;
                }
            }
        }
        touched
    }

    /// Mark every tracked state dirty, e.g. after fog or debug settings
    /// change.
    pub fn invalidate_all(&mut self) {
        for state in self.states.values_mut().flat_map(FxHashMap::values_mut) {
            state.mark_dirty();
        }
    }

    /// Record a submitted remesh, returning the data version it builds.
    pub fn begin(&mut self, key: SpatialKey) -> u64 {
        let state = self.track(key);
        state.remesh_pending = true;
        state.data_version
    }

    /// Record a finished remesh. Returns `true` if the mesh is current and
    /// should replace the cached one, `false` if the data moved on while
    /// it was being built.
    pub fn complete(&mut self, key: SpatialKey, built_version: u64) -> bool {
        let Some(state) = self
            .states
            .get_mut(&key.region)
            .and_then(|levels| levels.get_mut(&key.detail_level))
        else {
            return false;
        };
        state.remesh_pending = false;
        if built_version != state.data_version {
            return false;
        }
        state.meshed_version = built_version;
        true
    }

    /// Forget a region entirely, e.g. after eviction.
    pub fn forget(&mut self, pos: RegionPos) {
        self.states.remove(&pos);
    }

    /// Forget every level of `pos` except `keep`.
    pub fn retain_level(&mut self, pos: RegionPos, keep: u8) {
        if let Some(levels) = self.states.get_mut(&pos) {
            levels.retain(|&level, _| level == keep);
        }
    }

    pub fn len(&self) -> usize {
        self.states.values().map(FxHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32, z: i32, level: u8) -> SpatialKey {
        SpatialKey::new(RegionPos::new(x, z), level)
    }

    #[test]
    fn test_change_invalidates_region_and_neighbors() {
        let dirty = MeshInvalidator::invalidate(RegionPos::new(0, 0));
        assert_eq!(dirty.len(), 5);
        assert_eq!(dirty[0], RegionPos::new(0, 0));
        for pos in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            assert!(dirty.contains(&RegionPos::new(pos.0, pos.1)));
        }
    }

    #[test]
    fn test_new_state_needs_mesh() {
        let state = RegionMeshState::new();
        assert!(state.is_stale());
        assert!(state.needs_remesh());
    }

    #[test]
    fn test_pending_remesh_suppresses_resubmit() {
        let mut tracker = MeshTracker::new();
        let k = key(0, 0, 2);
        assert!(tracker.needs_remesh(k));
        tracker.begin(k);
        assert!(!tracker.needs_remesh(k));
    }

    #[test]
    fn test_complete_with_current_version_cleans_state() {
        let mut tracker = MeshTracker::new();
        let k = key(0, 0, 0);
        let version = tracker.begin(k);
        assert!(tracker.complete(k, version));
        assert!(!tracker.needs_remesh(k));
        assert!(!tracker.get(k).unwrap().is_stale());
    }

    #[test]
    fn test_change_during_build_discards_result() {
        let mut tracker = MeshTracker::new();
        let k = key(0, 0, 0);
        let version = tracker.begin(k);
        tracker.invalidate(RegionPos::new(0, 0));
        assert!(!tracker.complete(k, version));
        assert!(tracker.needs_remesh(k));
    }

    #[test]
    fn test_neighbor_change_marks_region_stale() {
        let mut tracker = MeshTracker::new();
        let k = key(0, 0, 1);
        let version = tracker.begin(k);
        tracker.complete(k, version);

        // Diagonal regions are not neighbours.
        assert_eq!(tracker.invalidate(RegionPos::new(1, 1)), 0);
        assert!(!tracker.needs_remesh(k));

        assert_eq!(tracker.invalidate(RegionPos::new(1, 0)), 1);
        assert!(tracker.needs_remesh(k));
    }

    #[test]
    fn test_invalidate_all() {
        let mut tracker = MeshTracker::new();
        for k in [key(0, 0, 0), key(9, 9, 2)] {
            let version = tracker.begin(k);
            tracker.complete(k, version);
        }
        tracker.invalidate_all();
        assert!(tracker.needs_remesh(key(0, 0, 0)));
        assert!(tracker.needs_remesh(key(9, 9, 2)));
    }

    #[test]
    fn test_forget_and_retain() {
        let mut tracker = MeshTracker::new();
        tracker.track(key(0, 0, 0));
        tracker.track(key(0, 0, 1));
        tracker.track(key(5, 5, 0));
        assert_eq!(tracker.len(), 3);

        tracker.retain_level(RegionPos::new(0, 0), 1);
        assert_eq!(tracker.len(), 2);
        assert!(tracker.get(key(0, 0, 0)).is_none());

        tracker.forget(RegionPos::new(5, 5));
        assert_eq!(tracker.len(), 1);
        assert!(!tracker.complete(key(5, 5, 0), 1));
    }
}
