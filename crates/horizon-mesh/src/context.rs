//! Per-build inputs shared by every strategy.

use glam::Vec3;
use horizon_lod::color::{adjust_saturation_brightness, detail_level_color};
use horizon_lod::{Direction, LodDataPoint, LodRegion, Neighbors, Shade};

use crate::fog::FogConfig;
use crate::settings::{DebugMode, MeshSettings};
use crate::vertex::LodVertex;

/// One detail level of one region, borrowed for the length of a build.
#[derive(Clone, Copy, Debug)]
pub struct Grid<'a> {
    points: &'a [LodDataPoint],
    width: usize,
    point_size: u32,
}

impl<'a> Grid<'a> {
    pub fn new(region: &'a LodRegion, detail_level: u8) -> Self {
        Self {
            points: region.level(detail_level),
            width: region.level_width(detail_level),
            point_size: 1 << detail_level,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Blocks covered by one point along each axis.
    pub fn point_size(&self) -> u32 {
        self.point_size
    }

    pub fn get(&self, x: usize, z: usize) -> LodDataPoint {
        self.points
            .get(x + z * self.width)
            .copied()
            .unwrap_or(LodDataPoint::EMPTY)
    }

    /// Region-local block span `[x0, x1)` and `[z0, z1)` of a point.
    pub fn cell_bounds(&self, x: usize, z: usize) -> (f32, f32, f32, f32) {
        let s = self.point_size as f32;
        (x as f32 * s, (x + 1) as f32 * s, z as f32 * s, (z + 1) as f32 * s)
    }
}

/// Everything a strategy reads while emitting one region.
pub struct MeshContext<'a> {
    pub grid: Grid<'a>,
    /// Same-level neighbour grids indexed by [`Direction::index`]. Missing
    /// regions and neighbours at another level are `None`.
    pub neighbors: [Option<Grid<'a>>; 4],
    pub detail_level: u8,
    pub settings: &'a MeshSettings,
    pub fog: &'a FogConfig,
    pub debug: DebugMode,
    /// World-space position of the region's local origin.
    pub world_origin: Vec3,
}

impl<'a> MeshContext<'a> {
    pub fn new(
        region: &'a LodRegion,
        neighbors: &'a Neighbors,
        detail_level: u8,
        settings: &'a MeshSettings,
        fog: &'a FogConfig,
        debug: DebugMode,
    ) -> Self {
        let grid = Grid::new(region, detail_level);
        let mut side: [Option<Grid<'a>>; 4] = [None; 4];
        for dir in Direction::ALL {
            side[dir.index()] = neighbors
                .get(dir)
                .filter(|view| view.detail_level() == detail_level && view.width() == grid.width())
                .map(|view| Grid::new(view.region(), detail_level));
        }
        let (ox, oz) = region.pos().block_origin(region.region_detail());
        Self {
            grid,
            neighbors: side,
            detail_level,
            settings,
            fog,
            debug,
            world_origin: Vec3::new(ox as f32, 0.0, oz as f32),
        }
    }

    /// The point across the given side of `(x, z)`.
    ///
    /// `None` when the side is a region edge with no usable neighbour, so
    /// callers draw a full wall there.
    pub fn across(&self, x: usize, z: usize, dir: Direction) -> Option<LodDataPoint> {
        let w = self.grid.width();
        let (dx, dz) = dir.offset();
        let nx = x as isize + dx as isize;
        let nz = z as isize + dz as isize;
        if (0..w as isize).contains(&nx) && (0..w as isize).contains(&nz) {
            return Some(self.grid.get(nx as usize, nz as usize));
        }
        let neighbor = self.neighbors[dir.index()]?;
        let wrap = |v: isize| v.rem_euclid(w as isize) as usize;
        Some(neighbor.get(wrap(nx), wrap(nz)))
    }

    /// Neighbour grid across a region edge.
    pub fn neighbor_grid(&self, dir: Direction) -> Option<Grid<'a>> {
        self.neighbors[dir.index()]
    }

    /// Resolve a vertex. Color goes through saturation, shade, light and
    /// fog; debug modes replace it with the detail palette and skip light
    /// and fog.
    pub fn vertex(
        &self,
        local: Vec3,
        point: LodDataPoint,
        shade: Shade,
        light_sky: u8,
        normal: [i8; 3],
    ) -> LodVertex {
        let light_block = point.light_block();
        let color = if self.debug.shows_detail() {
            shade.apply(detail_level_color(self.detail_level))
        } else {
            let mut base = point.color();
            if self.settings.adjusts_color() {
                base = adjust_saturation_brightness(
                    base,
                    self.settings.saturation,
                    self.settings.brightness,
                );
            }
            let lightmap = self.settings.bake_light.then_some(&self.settings.lightmap);
            let lit = horizon_lod::color::resolve_vertex_color(
                base,
                shade,
                light_sky,
                light_block,
                lightmap,
            );
            self.fog.apply(lit, self.world_origin + local)
        };
        LodVertex::new(local, color, light_block, light_sky, normal)
    }

    /// Sky light for a side face: the open column's light when there is
    /// one, else the face owner's.
    pub fn side_light(&self, owner: LodDataPoint, across: Option<LodDataPoint>) -> u8 {
        match across {
            Some(p) if !p.is_empty() => p.light_sky(),
            _ => owner.light_sky(),
        }
    }
}
