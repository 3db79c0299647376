//! Smoothed-top meshing for the triangular and dynamic strategies.
//!
//! Each solid point is a prism with a flat bottom and a top whose four
//! corners are averaged over the points meeting at that corner. Two
//! points share a corner height only when the edge between them is
//! smooth; the dynamic strategy treats steps above its threshold as hard
//! and keeps them stepped. Walls fill whatever the top surfaces leave open
//! between neighbouring prisms.
//!
//! Corner averaging reads one point into each same-level edge neighbour,
//! so both regions along a seam derive the same edge profile and their
//! tops meet. A corner shared by four regions takes the point's own top:
//! neither side sees the diagonal region. Edges without a usable
//! neighbour keep a full wall.

use glam::Vec3;
use horizon_lod::{Direction, LodDataPoint, Shade};

use crate::buffer::VertexBuffer;
use crate::builder::MeshStrategy;
use crate::context::{Grid, MeshContext};
use crate::face::Face;
use crate::settings::StrategyKind;

/// Channel offset per unit of slope, `1 - normal.y`.
const SLOPE_SHADE: f32 = 96.0;

/// Corner offsets in `Face::Up` template order.
const CORNERS: [(usize, usize); 4] = [(0, 0), (0, 1), (1, 1), (1, 0)];

#[derive(Clone, Copy, Debug)]
pub struct SmoothStrategy {
    /// `None` smooths every edge between solid points.
    threshold: Option<i32>,
}

impl SmoothStrategy {
    pub fn triangular() -> Self {
        Self { threshold: None }
    }

    pub fn dynamic(threshold: i32) -> Self {
        Self {
            threshold: Some(threshold.max(0)),
        }
    }
}

impl MeshStrategy for SmoothStrategy {
    fn kind(&self) -> StrategyKind {
        match self.threshold {
            None => StrategyKind::Triangular,
            Some(_) => StrategyKind::Dynamic,
        }
    }

    fn emit(&self, ctx: &MeshContext<'_>, out: &mut VertexBuffer) {
        let w = ctx.grid.width();
        let surface = Surface::of(ctx);
        let heights: Vec<Option<[f32; 4]>> = (0..w * w)
            .map(|i| cell_corners(&surface, i % w, i / w, self.threshold))
            .collect();

        for z in 0..w {
            for x in 0..w {
                let Some(corners) = heights[x + z * w] else {
                    continue;
                };
                let point = ctx.grid.get(x, z);
                emit_top(ctx, out, point, x, z, corners);
                emit_bottom(ctx, out, point, x, z);
                for dir in Direction::ALL {
                    let across = self.across_prism(ctx, &heights, x, z, dir);
                    emit_wall(ctx, out, point, x, z, corners, dir, across);
                }
            }
        }
    }
}

impl SmoothStrategy {
    /// Bottom and edge profile of the prism across `dir`, or `None` when
    /// nothing solid is there.
    fn across_prism(
        &self,
        ctx: &MeshContext<'_>,
        heights: &[Option<[f32; 4]>],
        x: usize,
        z: usize,
        dir: Direction,
    ) -> Option<(f32, (f32, f32))> {
        let w = ctx.grid.width();
        let (dx, dz) = dir.offset();
        let nx = x as isize + dx as isize;
        let nz = z as isize + dz as isize;
        let inside = (0..w as isize).contains(&nx) && (0..w as isize).contains(&nz);

        let (point, corners) = if inside {
            let (nx, nz) = (nx as usize, nz as usize);
            (ctx.grid.get(nx, nz), heights[nx + nz * w]?)
        } else {
            // Only the corners on the shared side are read, and those see
            // nothing beyond this region and the one across.
            let across = Surface::across(ctx, dir)?;
            let wrap = |v: isize| v.rem_euclid(w as isize) as usize;
            let (nx, nz) = (wrap(nx), wrap(nz));
            (across.grid.get(nx, nz), cell_corners(&across, nx, nz, self.threshold)?)
        };
        Some((
            point.render_extent().0 as f32,
            edge_profile(corners, dir.opposite()),
        ))
    }
}

/// Solid tops of a region grid plus one ring of points from its edge
/// neighbours.
#[derive(Clone, Copy)]
struct Surface<'a> {
    grid: Grid<'a>,
    neighbors: [Option<Grid<'a>>; 4],
}

impl<'a> Surface<'a> {
    fn of(ctx: &MeshContext<'a>) -> Self {
        Self {
            grid: ctx.grid,
            neighbors: ctx.neighbors,
        }
    }

    /// The region across `dir`, with the region being meshed as its only
    /// neighbour.
    fn across(ctx: &MeshContext<'a>, dir: Direction) -> Option<Self> {
        let grid = ctx.neighbor_grid(dir)?;
        let mut neighbors = [None; 4];
        neighbors[dir.opposite().index()] = Some(ctx.grid);
        Some(Self { grid, neighbors })
    }

    /// Top of the solid point at `(x, z)`, one step outside the grid at
    /// most. Diagonal regions are never read.
    fn top_at(&self, x: isize, z: isize) -> Option<i32> {
        let w = self.grid.width() as isize;
        let side = |v: isize, low: Direction, high: Direction| {
            if v < 0 {
                Some(low)
            } else if v >= w {
                Some(high)
            } else {
                None
            }
        };
        let grid = match (
            side(x, Direction::West, Direction::East),
            side(z, Direction::North, Direction::South),
        ) {
            (None, None) => self.grid,
            (Some(dir), None) | (None, Some(dir)) => self.neighbors[dir.index()]?,
            (Some(_), Some(_)) => return None,
        };
        let p = grid.get(x.rem_euclid(w) as usize, z.rem_euclid(w) as usize);
        p.is_solid().then(|| p.render_extent().1)
    }
}

/// Corner heights of a solid point, `None` for empty and void points.
fn cell_corners(
    surface: &Surface<'_>,
    x: usize,
    z: usize,
    threshold: Option<i32>,
) -> Option<[f32; 4]> {
    let point = surface.grid.get(x, z);
    if !point.is_solid() {
        return None;
    }
    let (bottom, top) = point.render_extent();
    let w = surface.grid.width();

    let mut out = [0.0; 4];
    for (slot, (ox, oz)) in CORNERS.into_iter().enumerate() {
        let (gx, gz) = (x + ox, z + oz);
        if (gx == 0 || gx == w) && (gz == 0 || gz == w) {
            out[slot] = top as f32;
            continue;
        }
        let (cx, cz) = (gx as isize, gz as isize);
        // Points around the corner: slot = dx + 2 * dz.
        let around = [
            surface.top_at(cx - 1, cz - 1),
            surface.top_at(cx, cz - 1),
            surface.top_at(cx - 1, cz),
            surface.top_at(cx, cz),
        ];
        let own = (1 - ox) + 2 * (1 - oz);
        let group = connected(&around, own, threshold);
        let (sum, count) = (0..4)
            .filter(|&i| group[i])
            .filter_map(|i| around[i])
            .fold((0i64, 0i64), |(s, c), t| (s + t as i64, c + 1));
        let avg = sum as f32 / count.max(1) as f32;
        out[slot] = avg.max(bottom as f32);
    }
    Some(out)
}

/// Points around a corner reachable from `own` over smooth edges.
fn connected(around: &[Option<i32>; 4], own: usize, threshold: Option<i32>) -> [bool; 4] {
    const EDGES: [(usize, usize); 4] = [(0, 1), (2, 3), (0, 2), (1, 3)];
    let smooth = |a: usize, b: usize| match (around[a], around[b]) {
        (Some(ta), Some(tb)) => threshold.is_none_or(|t| (ta - tb).abs() <= t),
        _ => false,
    };
    let mut group = [false; 4];
    group[own] = true;
    // Four points, so two sweeps reach the far corner.
    for _ in 0..2 {
        for (a, b) in EDGES {
            if smooth(a, b) && (group[a] || group[b]) {
                group[a] = true;
                group[b] = true;
            }
        }
    }
    group
}

/// Top heights along a side, from the low end of its axis to the high end.
/// East and west sides run along Z, north and south along X.
fn edge_profile(c: [f32; 4], side: Direction) -> (f32, f32) {
    match side {
        Direction::East => (c[3], c[2]),
        Direction::West => (c[0], c[1]),
        Direction::South => (c[1], c[2]),
        Direction::North => (c[0], c[3]),
    }
}

fn slope_shade(normal: Vec3) -> Shade {
    Shade::Add(-((1.0 - normal.y) * SLOPE_SHADE).round() as i32)
}

fn quantize_normal(n: Vec3) -> [i8; 3] {
    (n * 127.0).round().to_array().map(|c| c as i8)
}

fn emit_top(
    ctx: &MeshContext<'_>,
    out: &mut VertexBuffer,
    point: LodDataPoint,
    x: usize,
    z: usize,
    corners: [f32; 4],
) {
    let (x0, x1, z0, z1) = ctx.grid.cell_bounds(x, z);
    let xs = [x0, x1];
    let zs = [z0, z1];
    let pos: [Vec3; 4] = std::array::from_fn(|i| {
        let (ox, oz) = CORNERS[i];
        Vec3::new(xs[ox], corners[i], zs[oz])
    });
    for tri in [[0, 1, 2], [0, 2, 3]] {
        let [a, b, c] = tri.map(|i| pos[i]);
        let normal = (b - a).cross(c - a).normalize_or(Vec3::Y);
        let shade = slope_shade(normal);
        let n = quantize_normal(normal);
        out.push_triangle(
            [a, b, c].map(|p| ctx.vertex(p, point, shade, point.light_sky(), n)),
        );
    }
}

fn emit_bottom(ctx: &MeshContext<'_>, out: &mut VertexBuffer, point: LodDataPoint, x: usize, z: usize) {
    let (x0, x1, z0, z1) = ctx.grid.cell_bounds(x, z);
    let y = point.render_extent().0 as f32;
    let xs = [x0, x1];
    let zs = [z0, z1];
    let shade = Shade::Add(Face::Down.shade_offset());
    let normal = Face::Down.packed_normal();
    let quad = Face::Down.template().map(|[cx, _, cz]| {
        let p = Vec3::new(xs[cx as usize], y, zs[cz as usize]);
        ctx.vertex(p, point, shade, point.light_sky(), normal)
    });
    out.push_quad(quad);
}

/// A wall piece between two lines over `t0..t1` of a side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct WallPiece {
    pub t0: f32,
    pub t1: f32,
    pub lo: (f32, f32),
    pub hi: (f32, f32),
}

/// Parts of the prism side `[bottom, top(t)]` not covered by the prism
/// across, `[cover_bottom, cover_top(t)]`. Tops are linear in `t`.
pub(crate) fn wall_pieces(
    bottom: f32,
    top: (f32, f32),
    cover: Option<(f32, (f32, f32))>,
) -> Vec<WallPiece> {
    let lerp = |(a, b): (f32, f32), t: f32| a + (b - a) * t;
    let Some((cb, ct)) = cover else {
        return vec![WallPiece {
            t0: 0.0,
            t1: 1.0,
            lo: (bottom, bottom),
            hi: top,
        }];
    };

    let mut breaks = vec![0.0, 1.0];
    let pairs = [
        (top.0 - cb, top.1 - cb),
        (ct.0 - bottom, ct.1 - bottom),
        (top.0 - ct.0, top.1 - ct.1),
    ];
    for (d0, d1) in pairs {
        if (d0 < 0.0 && d1 > 0.0) || (d0 > 0.0 && d1 < 0.0) {
            breaks.push(d0 / (d0 - d1));
        }
    }
    breaks.sort_by(f32::total_cmp);
    breaks.dedup();

    // Below the piece across, and above it.
    let below = |t: f32| (bottom, lerp(top, t).min(cb));
    let above = |t: f32| (lerp(ct, t).max(bottom), lerp(top, t));

    let mut pieces = Vec::new();
    for span in breaks.windows(2) {
        let (t0, t1) = (span[0], span[1]);
        let tm = (t0 + t1) * 0.5;
        for part in [&below as &dyn Fn(f32) -> (f32, f32), &above] {
            let (lo_m, hi_m) = part(tm);
            if hi_m <= lo_m {
                continue;
            }
            let (lo0, hi0) = part(t0);
            let (lo1, hi1) = part(t1);
            pieces.push(WallPiece {
                t0,
                t1,
                lo: (lo0, lo1),
                hi: (hi0.max(lo0), hi1.max(lo1)),
            });
        }
    }
    pieces
}

#[allow(clippy::too_many_arguments)]
fn emit_wall(
    ctx: &MeshContext<'_>,
    out: &mut VertexBuffer,
    point: LodDataPoint,
    x: usize,
    z: usize,
    corners: [f32; 4],
    dir: Direction,
    cover: Option<(f32, (f32, f32))>,
) {
    let face = Face::from_direction(dir);
    let (x0, x1, z0, z1) = ctx.grid.cell_bounds(x, z);
    let bottom = point.render_extent().0 as f32;
    let light = ctx.side_light(point, ctx.across(x, z, dir));
    let shade = Shade::Add(face.shade_offset());
    let normal = face.packed_normal();

    let at = |t: f32, y: f32| match dir {
        Direction::East => Vec3::new(x1, y, z0 + (z1 - z0) * t),
        Direction::West => Vec3::new(x0, y, z0 + (z1 - z0) * t),
        Direction::South => Vec3::new(x0 + (x1 - x0) * t, y, z1),
        Direction::North => Vec3::new(x0 + (x1 - x0) * t, y, z0),
    };

    for piece in wall_pieces(bottom, edge_profile(corners, dir), cover) {
        let a = at(piece.t0, piece.lo.0);
        let b = at(piece.t0, piece.hi.0);
        let c = at(piece.t1, piece.hi.1);
        let d = at(piece.t1, piece.lo.1);
        // Up the wall first on east and north, along it first on west and
        // south, so every wall winds outward.
        let ordered = match dir {
            Direction::East | Direction::North => [a, b, c, d],
            Direction::West | Direction::South => [a, d, c, b],
        };
        out.push_quad(ordered.map(|p| ctx.vertex(p, point, shade, light, normal)));
    }
}
