//! Regions: square areas of the world holding a full LOD pyramid.
//!
//! A region of detail `N` is `2^N` blocks wide. Level 0 stores one point
//! per block column; each level above halves the grid width, down to a
//! single point at level `N`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregatePolicy, aggregate};
use crate::data_point::LodDataPoint;
use crate::generation_mode::GenerationMode;

/// Region detail used when nothing else is configured: 512-block regions.
pub const DEFAULT_REGION_DETAIL: u8 = 9;

/// Largest region detail accepted. Level 0 of a region this size already
/// holds a million points.
pub const MAX_REGION_DETAIL: u8 = 10;

/// Horizontal region coordinates. Region `(x, z)` covers blocks
/// `[x * width, (x + 1) * width)` on each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The adjacent region in `dir`.
    pub const fn neighbor(self, dir: Direction) -> Self {
        let (dx, dz) = dir.offset();
        Self::new(self.x + dx, self.z + dz)
    }

    /// World block coordinates of the region's minimum corner.
    pub const fn block_origin(self, region_detail: u8) -> (i64, i64) {
        ((self.x as i64) << region_detail, (self.z as i64) << region_detail)
    }

    /// Squared distance in region units, used to order requests.
    pub const fn distance_sq(self, other: RegionPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }
}

/// The four horizontal neighbors. North is −Z, east is +X.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// `(dx, dz)` step towards this neighbor.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Index into [`Direction::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Address of one level of one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpatialKey {
    pub region: RegionPos,
    pub detail_level: u8,
}

impl SpatialKey {
    pub const fn new(region: RegionPos, detail_level: u8) -> Self {
        Self {
            region,
            detail_level,
        }
    }
}

/// LOD data for one region at every detail level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodRegion {
    pos: RegionPos,
    region_detail: u8,
    /// `levels[l]` is a `width(l)²` grid indexed `x + z * width(l)`.
    levels: Vec<Vec<LodDataPoint>>,
    /// Highest mode a generation pass has completed for this region.
    mode: GenerationMode,
    dirty: bool,
    version: u64,
    /// Count of `mark_dirty` calls over the region's lifetime.
    #[serde(default)]
    invalidations: u64,
}

impl LodRegion {
    /// An empty region. `region_detail` is clamped to [`MAX_REGION_DETAIL`].
    pub fn new(pos: RegionPos, region_detail: u8) -> Self {
        let region_detail = region_detail.min(MAX_REGION_DETAIL);
        let levels = (0..=region_detail)
            .map(|level| {
                let width = 1usize << (region_detail - level);
                vec![LodDataPoint::EMPTY; width * width]
            })
            .collect();
        Self {
            pos,
            region_detail,
            levels,
            mode: GenerationMode::None,
            dirty: false,
            version: 0,
            invalidations: 0,
        }
    }

    /// Build a region directly from level-0 points, e.g. a persisted
    /// snapshot or a test fixture. Points beyond the grid are ignored.
    pub fn with_level0(
        pos: RegionPos,
        region_detail: u8,
        points: &[LodDataPoint],
        policy: AggregatePolicy,
    ) -> Self {
        let mut region = Self::new(pos, region_detail);
        for (slot, point) in region.levels[0].iter_mut().zip(points) {
            *slot = *point;
        }
        region.mode = region.levels[0]
            .iter()
            .map(|p| p.mode())
            .min()
            .unwrap_or_default();
        region.rebuild_pyramid(policy);
        region
    }

    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    pub fn region_detail(&self) -> u8 {
        self.region_detail
    }

    /// Width of the region in blocks.
    pub fn width_blocks(&self) -> u32 {
        1 << self.region_detail
    }

    /// Grid width at `level`, 0 if the level does not exist.
    pub fn level_width(&self, level: u8) -> usize {
        if level > self.region_detail {
            return 0;
        }
        1usize << (self.region_detail - level)
    }

    /// All points at `level`, or an empty slice for an unknown level.
    pub fn level(&self, level: u8) -> &[LodDataPoint] {
        self.levels
            .get(level as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Point at grid coordinates `(x, z)` of `level`. Out of range reads
    /// return [`LodDataPoint::EMPTY`].
    pub fn get(&self, level: u8, x: usize, z: usize) -> LodDataPoint {
        let width = self.level_width(level);
        if x >= width || z >= width {
            tracing::warn!(
                "LodRegion::get out of bounds: level={level}, ({x}, {z}), width={width}"
            );
            return LodDataPoint::EMPTY;
        }
        self.levels[level as usize][x + z * width]
    }

    /// `true` if any point at `level` has been generated.
    pub fn has_data(&self, level: u8) -> bool {
        self.level(level).iter().any(|p| !p.is_empty())
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bumped on every observable change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Incremented by every [`LodRegion::mark_dirty`], dirty or not. A
    /// generation pass records it when queued so that an invalidation
    /// landing while it runs is not cleared by its merge.
    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    pub fn mark_dirty(&mut self) {
        self.invalidations += 1;
        if !self.dirty {
            self.dirty = true;
            self.version += 1;
        }
    }

    /// Merge freshly generated level-0 points and rebuild the pyramid.
    ///
    /// A point replaces the stored one only if its mode is at least the
    /// stored mode and its payload differs, so data is never downgraded
    /// and unchanged columns keep their existing tag. Returns the number
    /// of replaced points.
    ///
    /// `seen_invalidations` is the [`LodRegion::invalidations`] count the
    /// pass started from. The dirty flag is cleared only if no
    /// invalidation arrived since.
    pub fn merge_level0(
        &mut self,
        points: &[LodDataPoint],
        mode: GenerationMode,
        policy: AggregatePolicy,
        seen_invalidations: u64,
    ) -> usize {
        let mut changed = 0;
        for (slot, &new) in self.levels[0].iter_mut().zip(points) {
            let fills_gap = slot.is_empty() && !new.is_empty();
            if fills_gap || (new.mode() >= slot.mode() && !new.same_payload(*slot)) {
                *slot = new;
                changed += 1;
            }
        }

        if changed > 0 {
            self.rebuild_pyramid(policy);
        }

        let mode_changed = mode > self.mode;
        if mode >= self.mode {
            self.mode = mode;
            if seen_invalidations == self.invalidations {
                self.dirty = false;
            }
        }
        if changed > 0 || mode_changed {
            self.version += 1;
        }
        changed
    }

    /// Recompute every level above 0 from the level below it.
    pub fn rebuild_pyramid(&mut self, policy: AggregatePolicy) {
        for level in 1..=self.region_detail as usize {
            let child_width = 1usize << (self.region_detail as usize - level + 1);
            let width = child_width / 2;
            let (lower, upper) = self.levels.split_at_mut(level);
            let children = &lower[level - 1];
            let parents = &mut upper[0];

            for z in 0..width {
                for x in 0..width {
                    let cx = x * 2;
                    let cz = z * 2;
                    let block = [
                        children[cx + cz * child_width],
                        children[cx + 1 + cz * child_width],
                        children[cx + (cz + 1) * child_width],
                        children[cx + 1 + (cz + 1) * child_width],
                    ];
                    parents[x + z * width] = aggregate(&block, policy);
                }
            }
        }
    }
}

/// Read-only view of one level of a region snapshot.
#[derive(Clone, Debug)]
pub struct LevelView {
    region: Arc<LodRegion>,
    level: u8,
}

impl LevelView {
    pub fn new(region: Arc<LodRegion>, level: u8) -> Self {
        Self { region, level }
    }

    pub fn region(&self) -> &LodRegion {
        &self.region
    }

    pub fn pos(&self) -> RegionPos {
        self.region.pos()
    }

    pub fn detail_level(&self) -> u8 {
        self.level
    }

    /// Grid width of this level.
    pub fn width(&self) -> usize {
        self.region.level_width(self.level)
    }

    /// Blocks covered by one point along each axis.
    pub fn point_size(&self) -> u32 {
        1 << self.level
    }

    /// Point at `(x, z)`. Callers stay inside `[0, width)`.
    pub fn get(&self, x: usize, z: usize) -> LodDataPoint {
        self.region.get(self.level, x, z)
    }

    pub fn points(&self) -> &[LodDataPoint] {
        self.region.level(self.level)
    }
}
