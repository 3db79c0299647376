use std::sync::Arc;

use glam::{DVec3, Vec3};
use horizon_lod::color::{apply_shade_mul, detail_level_color};
use horizon_lod::{
    AggregatePolicy, Direction, GenerationMode, LevelView, LightMap, LodDataPoint, LodRegion,
    PointFlags, RegionPos, Rgba,
};

use super::*;
use crate::face::Face;
use crate::fog::FogFalloff;

const DETAIL: u8 = 3;
const ALL_KINDS: [StrategyKind; 3] = [
    StrategyKind::Cubic,
    StrategyKind::Triangular,
    StrategyKind::Dynamic,
];

// --- Fixtures ---

fn solid(top: i32, bottom: i32) -> LodDataPoint {
    LodDataPoint::new(
        top,
        bottom,
        Rgba::GREEN,
        0,
        15,
        GenerationMode::Surface,
        PointFlags::NONE,
    )
}

/// Deterministic rough terrain by global point coordinates, with voids,
/// floating spans and single-layer points mixed in.
fn terrain(gx: i64, gz: i64) -> LodDataPoint {
    if (gx * 3 + gz * 5).rem_euclid(17) == 0 {
        return LodDataPoint::void(GenerationMode::Surface, 15);
    }
    let top = 55 + (gx * 7 + gz * 13).rem_euclid(11) as i32;
    let bottom = 40 + (gx * 5 + gz * 3).rem_euclid(7) as i32 * 3;
    solid(top, bottom)
}

fn region_from(pos: RegionPos, f: impl Fn(i64, i64) -> LodDataPoint) -> Arc<LodRegion> {
    let w = 1i64 << DETAIL;
    let points: Vec<_> = (0..w * w)
        .map(|i| f(pos.x as i64 * w + i % w, pos.z as i64 * w + i / w))
        .collect();
    Arc::new(LodRegion::with_level0(
        pos,
        DETAIL,
        &points,
        AggregatePolicy::Average,
    ))
}

fn flat(pos: RegionPos, top: i32) -> Arc<LodRegion> {
    region_from(pos, |_, _| solid(top, top))
}

fn builder(kind: StrategyKind) -> MeshBuilder {
    MeshBuilder::new(kind, MeshSettings::default())
}

fn build_isolated(kind: StrategyKind, region: &LodRegion, level: u8) -> VertexBuffer {
    builder(kind).build(
        region,
        &Neighbors::default(),
        level,
        &FogConfig::default(),
        DebugMode::Off,
    )
}

fn triangles(buf: &VertexBuffer, offset: Vec3) -> Vec<[Vec3; 3]> {
    buf.triangles().map(|t| t.map(|p| p + offset)).collect()
}

// --- Geometry checks ---

struct Line {
    dir: DVec3,
    base: DVec3,
    spans: Vec<(f64, f64, i32)>,
}

/// Every directed edge must be cancelled by edges running the other way
/// along the same line. Handles T-junctions, which the side walls create.
fn assert_closed(tris: &[[Vec3; 3]]) {
    let mut lines: Vec<Line> = Vec::new();
    for tri in tris {
        for k in 0..3 {
            let p = tri[k].as_dvec3();
            let q = tri[(k + 1) % 3].as_dvec3();
            let d = q - p;
            if d.length() < 1e-9 {
                continue;
            }
            let mut dir = d.normalize();
            let lead = dir.to_array().into_iter().find(|c| c.abs() > 1e-9).unwrap();
            if lead < 0.0 {
                dir = -dir;
            }
            let base = p - dir * p.dot(dir);
            let (sp, sq) = (p.dot(dir), q.dot(dir));
            let span = if sp < sq { (sp, sq, 1) } else { (sq, sp, -1) };
            match lines
                .iter_mut()
                .find(|l| (l.dir - dir).length() < 1e-6 && (l.base - base).length() < 1e-3)
            {
                Some(line) => line.spans.push(span),
                None => lines.push(Line {
                    dir,
                    base,
                    spans: vec![span],
                }),
            }
        }
    }

    for line in &lines {
        let mut cuts: Vec<f64> = line.spans.iter().flat_map(|s| [s.0, s.1]).collect();
        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-4);
        for w in cuts.windows(2) {
            if w[1] - w[0] < 1e-4 {
                continue;
            }
            let mid = (w[0] + w[1]) * 0.5;
            let net: i32 = line
                .spans
                .iter()
                .filter(|s| s.0 < mid && mid < s.1)
                .map(|s| s.2)
                .sum();
            assert_eq!(
                net,
                0,
                "open edge along {:?} through {:?} at {mid}",
                line.dir,
                line.base
            );
        }
    }
}

/// Signed volume; positive when every triangle winds outward.
fn signed_volume(tris: &[[Vec3; 3]]) -> f64 {
    tris.iter()
        .map(|[a, b, c]| a.as_dvec3().dot(b.as_dvec3().cross(c.as_dvec3())) / 6.0)
        .sum()
}

fn prism_volume(region: &LodRegion, level: u8) -> f64 {
    let s = (1u64 << level) as f64;
    region
        .level(level)
        .iter()
        .filter(|p| p.is_solid())
        .map(|p| {
            let (b, t) = p.render_extent();
            s * s * (t - b) as f64
        })
        .sum()
}

/// Triangles lying in the plane `x = plane` whose projection contains
/// `(z, y)`.
fn plane_coverage(tris: &[[Vec3; 3]], plane: f32, z: f32, y: f32) -> usize {
    let inside = |[a, b, c]: [Vec3; 3]| {
        let cross = |p: Vec3, q: Vec3| (q.z - p.z) * (y - p.y) - (q.y - p.y) * (z - p.z);
        let (d0, d1, d2) = (cross(a, b), cross(b, c), cross(c, a));
        (d0 > 0.0 && d1 > 0.0 && d2 > 0.0) || (d0 < 0.0 && d1 < 0.0 && d2 < 0.0)
    };
    tris.iter()
        .filter(|t| t.iter().all(|p| (p.x - plane).abs() < 1e-4))
        .filter(|t| inside(**t))
        .count()
}

// --- Tests ---

#[test]
fn test_isolated_region_is_watertight() {
    let region = region_from(RegionPos::new(0, 0), terrain);
    for kind in ALL_KINDS {
        for level in [0, 1, 2] {
            let buf = build_isolated(kind, &region, level);
            assert!(!buf.is_empty(), "{kind:?} level {level}");
            assert_closed(&triangles(&buf, Vec3::ZERO));
        }
    }
}

#[test]
fn test_cubic_volume_matches_columns() {
    let region = region_from(RegionPos::new(2, -1), terrain);
    for level in [0, 1, 3] {
        let buf = build_isolated(StrategyKind::Cubic, &region, level);
        let volume = signed_volume(&triangles(&buf, Vec3::ZERO));
        let expected = prism_volume(&region, level);
        assert!(
            (volume - expected).abs() < 1e-3,
            "level {level}: {volume} vs {expected}"
        );
    }
}

#[test]
fn test_every_strategy_winds_outward() {
    let region = region_from(RegionPos::new(0, 0), terrain);
    for kind in ALL_KINDS {
        let buf = build_isolated(kind, &region, 0);
        let volume = signed_volume(&triangles(&buf, Vec3::ZERO));
        assert!(volume > 0.0, "{kind:?} has inward winding: {volume}");
    }
}

#[test]
fn test_cubic_normals_match_winding() {
    let region = region_from(RegionPos::new(0, 0), terrain);
    let buf = build_isolated(StrategyKind::Cubic, &region, 0);
    for tri in buf.vertices.chunks_exact(3) {
        let [a, b, c] = [tri[0].position(), tri[1].position(), tri[2].position()];
        let n = (b - a).cross(c - a).normalize();
        let stored = tri[0].normal.map(|c| c as f32 / 127.0);
        assert!((n - Vec3::from_array(stored)).length() < 1e-5);
    }
}

#[test]
fn test_seam_between_regions_has_no_gap_or_overlap() {
    let a = region_from(RegionPos::new(0, 0), terrain);
    let b = region_from(RegionPos::new(1, 0), terrain);
    let width = a.width_blocks() as f32;

    for kind in ALL_KINDS {
        let builder = builder(kind);
        let mut na = Neighbors::default();
        na.set(Direction::East, Some(LevelView::new(Arc::clone(&b), 0)));
        let mut nb = Neighbors::default();
        nb.set(Direction::West, Some(LevelView::new(Arc::clone(&a), 0)));

        let fog = FogConfig::default();
        let ma = builder.build(&a, &na, 0, &fog, DebugMode::Off);
        let mb = builder.build(&b, &nb, 0, &fog, DebugMode::Off);

        let mut all = triangles(&ma, Vec3::ZERO);
        all.extend(triangles(&mb, Vec3::new(width, 0.0, 0.0)));
        assert_closed(&all);

        for zi in 0..a.width_blocks() {
            let z = zi as f32 + 0.3719;
            for yi in 30..80 {
                let y = yi as f32 + 0.137;
                let hits = plane_coverage(&all, width, z, y);
                assert!(hits <= 1, "{kind:?}: {hits} faces at z={z} y={y}");
            }
        }
    }
}

/// Vertices of faces facing `face` that lie in the plane `x = plane`.
fn wall_vertices_at(buf: &VertexBuffer, face: Face, plane: f32) -> Vec<Vec3> {
    buf.vertices
        .iter()
        .filter(|v| v.normal == face.packed_normal())
        .map(|v| v.position())
        .filter(|p| (p.x - plane).abs() < 1e-4)
        .collect()
}

#[test]
fn test_smooth_tops_continue_across_a_seam() {
    let ramp = |gx: i64, _| solid(40 + gx as i32, 0);
    let a = region_from(RegionPos::new(0, 0), ramp);
    let b = region_from(RegionPos::new(1, 0), ramp);
    let width = a.width_blocks() as f32;
    let fog = FogConfig::default();

    for kind in [StrategyKind::Triangular, StrategyKind::Dynamic] {
        let builder = builder(kind);
        let mut na = Neighbors::default();
        na.set(Direction::East, Some(LevelView::new(Arc::clone(&b), 0)));
        let mut nb = Neighbors::default();
        nb.set(Direction::West, Some(LevelView::new(Arc::clone(&a), 0)));
        let ma = builder.build(&a, &na, 0, &fog, DebugMode::Off);
        let mb = builder.build(&b, &nb, 0, &fog, DebugMode::Off);

        // Only the cells touching a region corner keep a sliver of wall.
        let seam = wall_vertices_at(&mb, Face::West, 0.0);
        assert!(
            seam.iter().all(|p| p.z <= 1.0 + 1e-4 || p.z >= width - 1.0 - 1e-4),
            "{kind:?}: stepped wall inside the seam: {seam:?}"
        );
        let isolated = build_isolated(kind, &b, 0);
        assert_eq!(wall_vertices_at(&isolated, Face::West, 0.0).len(), 8 * 6);
        assert!(seam.len() < 8 * 6);

        let mut all = triangles(&ma, Vec3::ZERO);
        all.extend(triangles(&mb, Vec3::new(width, 0.0, 0.0)));
        assert_closed(&all);
    }
}

#[test]
fn test_seam_between_levels_is_closed() {
    let a = region_from(RegionPos::new(0, 0), terrain);
    let b = region_from(RegionPos::new(1, 0), terrain);
    let width = a.width_blocks() as f32;
    let fog = FogConfig::default();

    for kind in ALL_KINDS {
        let builder = builder(kind);
        // Each side is given the other at the level it is drawn at.
        let mut na = Neighbors::default();
        na.set(Direction::East, Some(LevelView::new(Arc::clone(&b), 1)));
        let mut nb = Neighbors::default();
        nb.set(Direction::West, Some(LevelView::new(Arc::clone(&a), 0)));
        let ma = builder.build(&a, &na, 0, &fog, DebugMode::Off);
        let mb = builder.build(&b, &nb, 1, &fog, DebugMode::Off);

        assert_eq!(ma, build_isolated(kind, &a, 0), "{kind:?}");
        assert_eq!(mb, build_isolated(kind, &b, 1), "{kind:?}");
        let mut all = triangles(&ma, Vec3::ZERO);
        all.extend(triangles(&mb, Vec3::new(width, 0.0, 0.0)));
        assert_closed(&all);
    }
}

#[test]
fn test_identical_flat_neighbors_hide_the_seam() {
    let a = flat(RegionPos::new(0, 0), 64);
    let b = flat(RegionPos::new(1, 0), 64);
    let mut na = Neighbors::default();
    na.set(Direction::East, Some(LevelView::new(b, 0)));

    let buf = builder(StrategyKind::Cubic).build(&a, &na, 0, &FogConfig::default(), DebugMode::Off);
    let east_faces = buf
        .vertices
        .iter()
        .filter(|v| v.normal == [127, 0, 0])
        .count();
    assert_eq!(east_faces, 0);

    let isolated = build_isolated(StrategyKind::Cubic, &a, 0);
    let east_walls = isolated
        .vertices
        .iter()
        .filter(|v| v.normal == [127, 0, 0])
        .count();
    // One quad per edge point.
    assert_eq!(east_walls, 8 * 6);
}

#[test]
fn test_neighbor_at_other_level_is_ignored() {
    let a = region_from(RegionPos::new(0, 0), terrain);
    let b = region_from(RegionPos::new(1, 0), terrain);
    let mut wrong_level = Neighbors::default();
    wrong_level.set(Direction::East, Some(LevelView::new(b, 1)));

    let fog = FogConfig::default();
    let builder = builder(StrategyKind::Cubic);
    let with = builder.build(&a, &wrong_level, 0, &fog, DebugMode::Off);
    let without = builder.build(&a, &Neighbors::default(), 0, &fog, DebugMode::Off);
    assert_eq!(with, without);
}

#[test]
fn test_flat_region_smooth_matches_cubic_top() {
    let region = flat(RegionPos::new(0, 0), 64);
    for kind in ALL_KINDS {
        let buf = build_isolated(kind, &region, 0);
        let tops: Vec<_> = buf.vertices.iter().filter(|v| v.normal[1] > 0).collect();
        assert!(!tops.is_empty());
        // Single-layer points render one block thick.
        assert!(tops.iter().all(|v| v.position[1] == 65.0), "{kind:?}");
    }
}

#[test]
fn test_dynamic_keeps_steep_steps() {
    // Left half at 50, right half at 80: a 30 block cliff.
    let region = region_from(RegionPos::new(0, 0), |gx, _| {
        if gx < 4 { solid(50, 0) } else { solid(80, 0) }
    });
    let cliff_walls = |kind| {
        build_isolated(kind, &region, 0)
            .vertices
            .iter()
            .filter(|v| v.normal == [127, 0, 0] || v.normal == [-127, 0, 0])
            .filter(|v| (v.position[0] - 4.0).abs() < 1e-6)
            .count()
    };
    let loose = MeshSettings {
        dynamic_threshold: 64,
        ..Default::default()
    };
    let smoothed = MeshBuilder::new(StrategyKind::Dynamic, loose)
        .build(&region, &Neighbors::default(), 0, &FogConfig::default(), DebugMode::Off)
        .vertices
        .iter()
        .filter(|v| (v.position[0] - 4.0).abs() < 1e-6 && v.normal[1] == 0 && v.normal[0] != 0)
        .count();

    assert!(cliff_walls(StrategyKind::Dynamic) > 0);
    assert_eq!(cliff_walls(StrategyKind::Dynamic), cliff_walls(StrategyKind::Cubic));
    assert_eq!(smoothed, 0, "a loose threshold smooths the cliff away");
}

#[test]
fn test_merge_top_faces_keeps_the_shape() {
    let region = region_from(RegionPos::new(0, 0), |_, gz| solid(60 + (gz % 2) as i32, 0));
    let merged = build_isolated(StrategyKind::Cubic, &region, 0);
    let plain = MeshBuilder::new(
        StrategyKind::Cubic,
        MeshSettings {
            merge_top_faces: false,
            ..Default::default()
        },
    )
    .build(&region, &Neighbors::default(), 0, &FogConfig::default(), DebugMode::Off);

    assert!(merged.triangle_count() < plain.triangle_count());
    let tops = |b: &VertexBuffer| b.vertices.iter().filter(|v| v.normal == [0, 127, 0]).count();
    // One run per row, against one quad per point.
    assert_eq!(tops(&merged), 8 * 6);
    assert_eq!(tops(&plain), 8 * 8 * 6);

    let tris = triangles(&merged, Vec3::ZERO);
    assert_closed(&tris);
    assert!((signed_volume(&tris) - prism_volume(&region, 0)).abs() < 1e-3);
}

#[test]
fn test_empty_and_void_regions_produce_nothing() {
    let empty = LodRegion::new(RegionPos::new(0, 0), DETAIL);
    let void = region_from(RegionPos::new(0, 0), |_, _| {
        LodDataPoint::void(GenerationMode::Full, 15)
    });
    for kind in ALL_KINDS {
        assert!(build_isolated(kind, &empty, 0).is_empty());
        assert!(build_isolated(kind, &void, 0).is_empty());
    }
}

#[test]
fn test_show_detail_uses_palette() {
    let region = region_from(RegionPos::new(0, 0), terrain);
    let fog = FogConfig {
        falloff: FogFalloff::Linear,
        start: 0.0,
        end: 1.0,
        color: Rgba::BLUE,
        ..Default::default()
    };
    let builder = builder(StrategyKind::Cubic);
    for level in 0..3 {
        let buf = builder.build(&region, &Neighbors::default(), level, &fog, DebugMode::ShowDetail);
        assert!(!buf.wireframe);
        let palette = detail_level_color(level);
        for v in &buf.vertices {
            let face = match v.normal {
                [0, 127, 0] => Face::Up,
                [0, -127, 0] => Face::Down,
                [0, 0, _] => Face::North,
                _ => Face::East,
            };
            assert_eq!(v.color(), apply_shade_mul(palette, face.shade_factor()));
        }
    }

    let wire = builder.build(
        &region,
        &Neighbors::default(),
        0,
        &FogConfig::default(),
        DebugMode::ShowDetailWireframe,
    );
    assert!(wire.wireframe);
}

#[test]
fn test_fog_blends_far_vertices() {
    let region = flat(RegionPos::new(4, 4), 64);
    let fog = FogConfig {
        falloff: FogFalloff::Linear,
        start: 0.0,
        end: 1.0,
        color: Rgba::BLUE,
        ..Default::default()
    };
    let buf = builder(StrategyKind::Cubic).build(&region, &Neighbors::default(), 0, &fog, DebugMode::Off);
    assert!(buf.vertices.iter().all(|v| v.color() == Rgba::BLUE));
}

#[test]
fn test_light_baking() {
    let region = flat(RegionPos::new(0, 0), 64);
    let up_color = |settings: MeshSettings| {
        let buf = MeshBuilder::new(StrategyKind::Cubic, settings).build(
            &region,
            &Neighbors::default(),
            0,
            &FogConfig::default(),
            DebugMode::Off,
        );
        let v = buf
            .vertices
            .iter()
            .find(|v| v.normal == [0, 127, 0])
            .copied()
            .unwrap();
        (v.color(), v.light_uv)
    };

    let (unlit, uv) = up_color(MeshSettings {
        bake_light: false,
        ..Default::default()
    });
    assert_eq!(unlit, Rgba::GREEN);
    assert_eq!(uv, [8, 248]);

    let (lit, _) = up_color(MeshSettings {
        lightmap: LightMap::uniform(Rgba::opaque(128, 128, 128)),
        ..Default::default()
    });
    assert_eq!(lit, Rgba::new(0, 128, 0, 255));
}

#[test]
fn test_build_is_safe_across_threads() {
    let region = region_from(RegionPos::new(0, 0), terrain);
    let builder = builder(StrategyKind::Triangular);
    let reference = build_isolated(StrategyKind::Triangular, &region, 0);
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    builder.build(
                        &region,
                        &Neighbors::default(),
                        0,
                        &FogConfig::default(),
                        DebugMode::Off,
                    )
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), reference);
        }
    });
}

#[test]
fn test_buffer_key_matches_request() {
    let region = flat(RegionPos::new(3, -2), 10);
    let buf = build_isolated(StrategyKind::Dynamic, &region, 2);
    assert_eq!(buf.key.region, RegionPos::new(3, -2));
    assert_eq!(buf.key.detail_level, 2);
    assert_eq!(builder(StrategyKind::Dynamic).kind(), StrategyKind::Dynamic);
}
