//! Axis-aligned box meshing.
//!
//! Each solid point becomes a box spanning its render extent. Side faces
//! only cover the part of the wall the column across does not, so two
//! regions meshed separately meet without gaps or doubled faces.

use glam::Vec3;
use horizon_lod::{Direction, LodDataPoint, Shade};

use crate::buffer::VertexBuffer;
use crate::builder::MeshStrategy;
use crate::context::MeshContext;
use crate::face::Face;
use crate::settings::StrategyKind;

#[derive(Clone, Copy, Debug, Default)]
pub struct CubicStrategy;

impl MeshStrategy for CubicStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Cubic
    }

    fn emit(&self, ctx: &MeshContext<'_>, out: &mut VertexBuffer) {
        let w = ctx.grid.width();
        for z in 0..w {
            let mut run_start: Option<usize> = None;
            for x in 0..w {
                let point = ctx.grid.get(x, z);
                if !point.is_solid() {
                    flush_top_run(ctx, out, &mut run_start, x, z);
                    continue;
                }
                if ctx.settings.merge_top_faces {
                    if let Some(start) = run_start
                        && !same_top(ctx.grid.get(start, z), point)
                    {
                        flush_top_run(ctx, out, &mut run_start, x, z);
                    }
                    run_start.get_or_insert(x);
                } else {
                    let (x0, x1, z0, z1) = ctx.grid.cell_bounds(x, z);
                    emit_top(ctx, out, point, x0, x1, z0, z1);
                }
                emit_column_sides(ctx, out, point, x, z);
            }
            flush_top_run(ctx, out, &mut run_start, w, z);
        }
    }
}

fn same_top(a: LodDataPoint, b: LodDataPoint) -> bool {
    a.render_extent().1 == b.render_extent().1
        && a.color() == b.color()
        && a.light_sky() == b.light_sky()
        && a.light_block() == b.light_block()
}

/// Emit the merged top face for cells `start..end` of row `z`.
fn flush_top_run(
    ctx: &MeshContext<'_>,
    out: &mut VertexBuffer,
    run_start: &mut Option<usize>,
    end: usize,
    z: usize,
) {
    let Some(start) = run_start.take() else {
        return;
    };
    let point = ctx.grid.get(start, z);
    let (x0, _, z0, z1) = ctx.grid.cell_bounds(start, z);
    let (_, x1, _, _) = ctx.grid.cell_bounds(end - 1, z);
    emit_top(ctx, out, point, x0, x1, z0, z1);
}

fn emit_top(
    ctx: &MeshContext<'_>,
    out: &mut VertexBuffer,
    point: LodDataPoint,
    x0: f32,
    x1: f32,
    z0: f32,
    z1: f32,
) {
    let (bottom, top) = point.render_extent();
    emit_box_face(
        ctx,
        out,
        Face::Up,
        point,
        point.light_sky(),
        [x0, x1],
        [bottom as f32, top as f32],
        [z0, z1],
    );
}

fn emit_column_sides(
    ctx: &MeshContext<'_>,
    out: &mut VertexBuffer,
    point: LodDataPoint,
    x: usize,
    z: usize,
) {
    let (x0, x1, z0, z1) = ctx.grid.cell_bounds(x, z);
    let (bottom, top) = point.render_extent();

    emit_box_face(
        ctx,
        out,
        Face::Down,
        point,
        point.light_sky(),
        [x0, x1],
        [bottom as f32, top as f32],
        [z0, z1],
    );

    for dir in Direction::ALL {
        let across = ctx.across(x, z, dir);
        let cover = across.filter(|p| p.is_solid()).map(|p| p.render_extent());
        let light = ctx.side_light(point, across);
        for (lo, hi) in exposed_spans((bottom, top), cover) {
            emit_box_face(
                ctx,
                out,
                Face::from_direction(dir),
                point,
                light,
                [x0, x1],
                [lo as f32, hi as f32],
                [z0, z1],
            );
        }
    }
}

/// Parts of `own` not covered by `cover`, bottom first.
pub(crate) fn exposed_spans(own: (i32, i32), cover: Option<(i32, i32)>) -> Vec<(i32, i32)> {
    let (b, t) = own;
    let Some((nb, nt)) = cover else {
        return vec![(b, t)];
    };
    let mut spans = Vec::with_capacity(2);
    if b < nb {
        spans.push((b, t.min(nb)));
    }
    if nt < t {
        spans.push((b.max(nt), t));
    }
    spans
}

/// Emit one face of the box spanning the given ranges.
#[allow(clippy::too_many_arguments)]
fn emit_box_face(
    ctx: &MeshContext<'_>,
    out: &mut VertexBuffer,
    face: Face,
    point: LodDataPoint,
    light_sky: u8,
    xs: [f32; 2],
    ys: [f32; 2],
    zs: [f32; 2],
) {
    let shade = Shade::Mul(face.shade_factor());
    let normal = face.packed_normal();
    let quad = face.template().map(|[cx, cy, cz]| {
        let pos = Vec3::new(xs[cx as usize], ys[cy as usize], zs[cz as usize]);
        ctx.vertex(pos, point, shade, light_sky, normal)
    });
    out.push_quad(quad);
}
