//! Concurrent region store keyed by [`RegionPos`].
//!
//! The store is the only shared mutable state of the LOD pipeline.
//! Writers are serialized per region behind a lock and apply changes
//! copy-on-write, so a reader holding an `Arc<LodRegion>` snapshot never
//! sees a half-merged pyramid. Each region gets a store-unique epoch at
//! creation; a generation result carrying a stale epoch is discarded, which
//! keeps an evicted region from being resurrected by a late worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;

use crate::aggregate::AggregatePolicy;
use crate::data_point::LodDataPoint;
use crate::generation_mode::GenerationMode;
use crate::region::{
    DEFAULT_REGION_DETAIL, Direction, LevelView, LodRegion, MAX_REGION_DETAIL, RegionPos,
    SpatialKey,
};

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

struct RegionSlot {
    epoch: u64,
    region: RwLock<Arc<LodRegion>>,
}

impl RegionSlot {
    fn new(pos: RegionPos, region_detail: u8) -> Self {
        Self {
            epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
            region: RwLock::new(Arc::new(LodRegion::new(pos, region_detail))),
        }
    }

    fn snapshot(&self) -> Arc<LodRegion> {
        Arc::clone(&self.region.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update<R>(&self, f: impl FnOnce(&mut LodRegion) -> R) -> R {
        let mut guard = self.region.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut guard))
    }
}

/// Handle to a live region. Cheap to clone.
#[derive(Clone)]
pub struct RegionHandle {
    pos: RegionPos,
    slot: Arc<RegionSlot>,
}

impl RegionHandle {
    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    /// Identity of this incarnation of the region.
    pub fn epoch(&self) -> u64 {
        self.slot.epoch
    }

    /// Immutable snapshot of the current region state.
    pub fn snapshot(&self) -> Arc<LodRegion> {
        self.slot.snapshot()
    }
}

impl std::fmt::Debug for RegionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionHandle")
            .field("pos", &self.pos)
            .field("epoch", &self.slot.epoch)
            .finish()
    }
}

/// The four neighbors of a region at one detail level, indexed by
/// [`Direction::index`]. A missing entry is a normal input, not an error.
#[derive(Clone, Debug, Default)]
pub struct Neighbors(pub [Option<LevelView>; 4]);

impl Neighbors {
    pub fn get(&self, dir: Direction) -> Option<&LevelView> {
        self.0[dir.index()].as_ref()
    }

    pub fn set(&mut self, dir: Direction, view: Option<LevelView>) {
        self.0[dir.index()] = view;
    }

    /// Number of neighbors present.
    pub fn present(&self) -> usize {
        self.0.iter().filter(|n| n.is_some()).count()
    }
}

/// Result of [`SpatialStore::merge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Points were replaced; `version` is the region's new version.
    Merged { changed: usize, version: u64 },
    /// Nothing differed from what was already stored.
    Unchanged,
    /// The region was evicted (or re-created) while the task ran.
    Discarded,
}

/// Arena of regions addressed by position.
pub struct SpatialStore {
    regions: DashMap<RegionPos, Arc<RegionSlot>>,
    region_detail: u8,
}

impl SpatialStore {
    /// A store whose regions are `2^region_detail` blocks wide.
    pub fn new(region_detail: u8) -> Self {
        Self {
            regions: DashMap::new(),
            region_detail: region_detail.min(MAX_REGION_DETAIL),
        }
    }

    pub fn region_detail(&self) -> u8 {
        self.region_detail
    }

    /// Return the region at `pos`, creating an empty one if needed.
    pub fn get_or_create(&self, pos: RegionPos) -> RegionHandle {
        let entry = self.regions.entry(pos).or_insert_with(|| {
            tracing::debug!("creating region ({}, {})", pos.x, pos.z);
            Arc::new(RegionSlot::new(pos, self.region_detail))
        });
        let slot = Arc::clone(entry.value());
        RegionHandle { pos, slot }
    }

    pub fn get(&self, pos: RegionPos) -> Option<RegionHandle> {
        self.regions.get(&pos).map(|slot| RegionHandle {
            pos,
            slot: Arc::clone(slot.value()),
        })
    }

    pub fn snapshot(&self, pos: RegionPos) -> Option<Arc<LodRegion>> {
        self.regions.get(&pos).map(|slot| slot.snapshot())
    }

    /// View of one level, `None` if the region is absent or has no data
    /// at that level.
    pub fn view(&self, key: SpatialKey) -> Option<LevelView> {
        let region = self.snapshot(key.region)?;
        region
            .has_data(key.detail_level)
            .then(|| LevelView::new(region, key.detail_level))
    }

    /// Snapshots of the four regions adjacent to `pos` at `detail_level`.
    pub fn get_neighbors(&self, pos: RegionPos, detail_level: u8) -> Neighbors {
        let mut neighbors = Neighbors::default();
        for dir in Direction::ALL {
            let key = SpatialKey::new(pos.neighbor(dir), detail_level);
            neighbors.set(dir, self.view(key));
        }
        neighbors
    }

    /// Mark a region dirty so the next request regenerates it. Returns
    /// `false` if the region is not loaded.
    pub fn invalidate(&self, pos: RegionPos) -> bool {
        let Some(slot) = self.regions.get(&pos).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        slot.update(LodRegion::mark_dirty);
        true
    }

    pub fn is_dirty(&self, pos: RegionPos) -> bool {
        self.snapshot(pos).is_some_and(|r| r.is_dirty())
    }

    /// Remove a region. Snapshots already handed out stay valid.
    pub fn evict(&self, pos: RegionPos) -> Option<Arc<LodRegion>> {
        let (_, slot) = self.regions.remove(&pos)?;
        tracing::debug!("evicted region ({}, {})", pos.x, pos.z);
        Some(slot.snapshot())
    }

    /// Merge generated level-0 points into the region at `pos`, provided
    /// it is still the incarnation identified by `epoch`. Never creates a
    /// region. `invalidations` is the region's invalidation count when the
    /// pass was queued; see [`LodRegion::merge_level0`].
    pub fn merge(
        &self,
        pos: RegionPos,
        epoch: u64,
        invalidations: u64,
        points: &[LodDataPoint],
        mode: GenerationMode,
        policy: AggregatePolicy,
    ) -> MergeOutcome {
        let Some(slot) = self.regions.get(&pos).map(|s| Arc::clone(s.value())) else {
            return MergeOutcome::Discarded;
        };
        if slot.epoch != epoch {
            return MergeOutcome::Discarded;
        }

        let expected = 1usize << (2 * self.region_detail as usize);
        if points.len() != expected {
            tracing::warn!(
                "merge into ({}, {}) carried {} points, expected {expected}",
                pos.x,
                pos.z,
                points.len()
            );
            return MergeOutcome::Discarded;
        }

        slot.update(|region| {
            let changed = region.merge_level0(points, mode, policy, invalidations);
            if changed > 0 {
                MergeOutcome::Merged {
                    changed,
                    version: region.version(),
                }
            } else {
                MergeOutcome::Unchanged
            }
        })
    }

    /// Number of loaded regions, for caller-side back-pressure.
    pub fn loaded_count(&self) -> usize {
        self.regions.len()
    }

    pub fn loaded_positions(&self) -> Vec<RegionPos> {
        self.regions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn contains(&self, pos: RegionPos) -> bool {
        self.regions.contains_key(&pos)
    }
}

impl Default for SpatialStore {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_DETAIL)
    }
}
