//! Frame-driven orchestration of generation and meshing.

use std::sync::Arc;
use std::time::Duration;

use horizon_config::Config;
use horizon_lod::{
    Direction, GenerationMode, MutationEventBuffer, Neighbors, PointFlags, RegionMutationEvent,
    RegionPos, SpatialKey, SpatialStore, apply_mutations,
};
use horizon_mesh::{
    DebugMode, FogConfig, MeshBuilder, MeshSettings, MeshTracker, MeshingPipeline, MeshingTask,
    VertexBuffer,
};
use horizon_terrain::{
    ColumnSampler, GenerationEvent, GenerationScheduler, RequestOutcome, SchedulerConfig,
};
use rustc_hash::FxHashMap;

/// Running totals since the pipeline started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub merged: u64,
    pub unchanged: u64,
    pub discarded: u64,
    pub failed: u64,
    pub meshes_built: u64,
    pub meshes_stale: u64,
    pub mutations_applied: u64,
    pub evicted: u64,
}

/// What happened during one [`LodPipeline::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub queued: usize,
    pub generation_events: usize,
    pub meshes_submitted: usize,
    pub meshes_received: usize,
}

#[derive(Clone, Copy, Debug)]
struct ViewSettings {
    radius: i32,
    full_detail_radius: i32,
    min_detail_level: u8,
    lod_falloff: i32,
    target_mode: GenerationMode,
    preview_mode: GenerationMode,
}

/// Keeps the regions around a viewer generated and meshed.
///
/// Call [`tick`](Self::tick) once per frame. Each tick applies remote
/// mutations from the previous frame, requests generation nearest first,
/// fans merged changes out to the meshes that depend on them, and
/// collects finished meshes.
pub struct LodPipeline {
    store: Arc<SpatialStore>,
    scheduler: GenerationScheduler,
    meshing: MeshingPipeline,
    tracker: MeshTracker,
    meshes: FxHashMap<RegionPos, VertexBuffer>,
    mutations: MutationEventBuffer,
    fog: FogConfig,
    debug: DebugMode,
    view: ViewSettings,
    center: RegionPos,
    /// Queued generation tasks whose event has not been drained yet.
    generating: usize,
    /// Submitted mesh tasks whose result has not been collected yet.
    meshing_outstanding: usize,
    stats: PipelineStats,
}

impl LodPipeline {
    pub fn new(config: &Config, sampler: Arc<dyn ColumnSampler>) -> Self {
        let store = Arc::new(SpatialStore::new(config.world.region_detail));

        let gen_cfg = &config.generation;
        let mut flags = PointFlags::NONE;
        if gen_cfg.avoid_non_full {
            flags = flags | PointFlags::AVOID_NON_FULL;
        }
        if gen_cfg.avoid_no_collision {
            flags = flags | PointFlags::AVOID_NO_COLLISION;
        }
        let scheduler = GenerationScheduler::new(
            Arc::clone(&store),
            sampler,
            SchedulerConfig {
                worker_count: gen_cfg.worker_count,
                max_in_flight: gen_cfg.max_in_flight,
                retry_base: Duration::from_millis(gen_cfg.retry_base_ms),
                retry_max: Duration::from_millis(gen_cfg.retry_max_ms),
                policy: gen_cfg.aggregate_policy,
                flags,
            },
        );

        let mesh_cfg = &config.mesh;
        let builder = MeshBuilder::new(
            mesh_cfg.strategy,
            MeshSettings {
                bake_light: mesh_cfg.bake_light,
                merge_top_faces: mesh_cfg.merge_top_faces,
                dynamic_threshold: mesh_cfg.dynamic_threshold,
                saturation: mesh_cfg.saturation,
                brightness: mesh_cfg.brightness,
                ..Default::default()
            },
        );
        let meshing =
            MeshingPipeline::new(mesh_cfg.worker_count, mesh_cfg.budget, Arc::new(builder));

        let world = &config.world;
        let view = ViewSettings {
            radius: world.view_radius as i32,
            full_detail_radius: world.full_detail_radius as i32,
            min_detail_level: world.min_detail_level.min(store.region_detail()),
            lod_falloff: world.lod_falloff.max(1) as i32,
            target_mode: gen_cfg.target_mode,
            preview_mode: gen_cfg.preview_mode.min(gen_cfg.target_mode),
        };

        Self {
            store,
            scheduler,
            meshing,
            tracker: MeshTracker::new(),
            meshes: FxHashMap::default(),
            mutations: MutationEventBuffer::new(),
            fog: config.fog,
            debug: config.debug.debug_mode,
            view,
            center: RegionPos::default(),
            generating: 0,
            meshing_outstanding: 0,
            stats: PipelineStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<SpatialStore> {
        &self.store
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn center(&self) -> RegionPos {
        self.center
    }

    /// Current mesh of a region, possibly at an older detail level while
    /// the new one is being built.
    pub fn mesh(&self, pos: RegionPos) -> Option<&VertexBuffer> {
        self.meshes.get(&pos)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Total vertices across all current meshes.
    pub fn vertex_count(&self) -> usize {
        self.meshes.values().map(|m| m.vertices.len()).sum()
    }

    /// Queue a notification that terrain in `region` changed elsewhere.
    /// Applied at the start of the next tick.
    pub fn on_remote_mutation(&mut self, region: RegionPos) {
        self.mutations.send(RegionMutationEvent { region });
    }

    /// Move the viewer. Regions beyond the view radius plus one are
    /// evicted along with their meshes. Regions whose detail level or
    /// visibility changes get their neighbours remeshed, since each seam
    /// depends on how both sides are drawn.
    pub fn set_view(&mut self, center: RegionPos) {
        let previous = std::mem::replace(&mut self.center, center);
        let keep = self.view.radius + 1;
        for pos in self.store.loaded_positions() {
            if chebyshev(pos, center) <= keep {
                let level_changed =
                    self.level_around(pos, previous) != self.level_around(pos, center);
                let shown_changed = self.in_view(pos, previous) != self.in_view(pos, center);
                if level_changed || shown_changed {
                    self.tracker.invalidate(pos);
                }
                continue;
            }
            self.scheduler.evict(pos);
            // Neighbours lose their seam partner and need full walls.
            self.tracker.invalidate(pos);
            self.tracker.forget(pos);
            self.meshes.remove(&pos);
            self.stats.evicted += 1;
        }
    }

    pub fn set_fog(&mut self, fog: FogConfig) {
        if fog != self.fog {
            self.fog = fog;
            self.tracker.invalidate_all();
        }
    }

    pub fn set_debug_mode(&mut self, debug: DebugMode) {
        if debug != self.debug {
            self.debug = debug;
            self.tracker.invalidate_all();
        }
    }

    /// Detail level a region is meshed at, coarser with distance.
    pub fn detail_level_for(&self, pos: RegionPos) -> u8 {
        self.level_around(pos, self.center)
    }

    fn level_around(&self, pos: RegionPos, center: RegionPos) -> u8 {
        let steps = chebyshev(pos, center) / self.view.lod_falloff;
        let level = self.view.min_detail_level as i32 + steps;
        level.min(self.store.region_detail() as i32) as u8
    }

    fn in_view(&self, pos: RegionPos, center: RegionPos) -> bool {
        chebyshev(pos, center) <= self.view.radius
    }

    /// Neighbour views at the level each neighbour is drawn at. Regions
    /// outside the view are not drawn and get no entry.
    fn mesh_neighbors(&self, pos: RegionPos) -> Neighbors {
        let mut neighbors = Neighbors::default();
        for dir in Direction::ALL {
            let npos = pos.neighbor(dir);
            if !self.in_view(npos, self.center) {
                continue;
            }
            let key = SpatialKey::new(npos, self.detail_level_for(npos));
            neighbors.set(dir, self.store.view(key));
        }
        neighbors
    }

    /// Generation mode a region should end up at.
    pub fn target_mode_for(&self, pos: RegionPos) -> GenerationMode {
        if chebyshev(pos, self.center) <= self.view.full_detail_radius {
            self.view.target_mode
        } else {
            self.view.preview_mode
        }
    }

    /// Advance one frame.
    pub fn tick(&mut self) -> TickReport {
        self.stats.ticks += 1;
        let mut report = TickReport::default();

        self.mutations.swap();
        let invalidated = apply_mutations(&self.store, self.mutations.previous());
        self.stats.mutations_applied += invalidated.len() as u64;

        let wanted = self.wanted_regions();
        report.queued = self.request_generation(&wanted);
        self.generating += report.queued;

        let events = self.scheduler.drain_events();
        report.generation_events = events.len();
        self.generating = self.generating.saturating_sub(events.len());
        for event in events {
            self.on_generation_event(event);
        }

        report.meshes_submitted = self.submit_meshes(&wanted);
        self.meshing_outstanding += report.meshes_submitted;
        report.meshes_received = self.collect_meshes();
        self.meshing_outstanding = self
            .meshing_outstanding
            .saturating_sub(report.meshes_received);
        report
    }

    /// `true` once every region in view is generated at its target mode,
    /// meshed against current data, and nothing is in flight.
    pub fn is_settled(&self) -> bool {
        // Every queued task reports back exactly once, so these counters
        // only reach zero once all results have been drained.
        if self.generating > 0 || self.meshing_outstanding > 0 {
            return false;
        }
        self.wanted_regions().into_iter().all(|pos| {
            let Some(region) = self.store.snapshot(pos) else {
                return false;
            };
            let key = SpatialKey::new(pos, self.detail_level_for(pos));
            region.mode() >= self.target_mode_for(pos)
                && !region.is_dirty()
                && self.tracker.get(key).is_some_and(|s| !s.is_stale())
                && self.meshes.get(&pos).is_some_and(|m| m.key == key)
        })
    }

    /// Stop accepting work and join every worker.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        self.meshing.shutdown();
    }

    fn wanted_regions(&self) -> Vec<RegionPos> {
        let r = self.view.radius;
        let c = self.center;
        let mut positions: Vec<_> = (-r..=r)
            .flat_map(|dz| (-r..=r).map(move |dx| RegionPos::new(c.x + dx, c.z + dz)))
            .collect();
        positions.sort_by_key(|p| p.distance_sq(c));
        positions
    }

    /// Request the next stage for each region: the preview mode first if
    /// the region has nothing yet, then its target.
    fn request_generation(&self, wanted: &[RegionPos]) -> usize {
        let mut queued = 0;
        for &pos in wanted {
            let target = self.target_mode_for(pos);
            let current = self
                .store
                .snapshot(pos)
                .map_or(GenerationMode::None, |r| r.mode());
            let preview = self.view.preview_mode;
            let mode = if current < preview && target > preview {
                preview
            } else {
                target
            };
            match self.scheduler.request(pos, mode) {
                RequestOutcome::Queued => queued += 1,
                RequestOutcome::AtCapacity => break,
                _ => {}
            }
        }
        queued
    }

    fn on_generation_event(&mut self, event: GenerationEvent) {
        match event {
            GenerationEvent::Merged {
                region, changed, ..
            } => {
                self.stats.merged += 1;
                if changed > 0 {
                    self.tracker.invalidate(region);
                }
            }
            GenerationEvent::Unchanged { .. } => self.stats.unchanged += 1,
            GenerationEvent::Discarded { .. } => self.stats.discarded += 1,
            GenerationEvent::Failed { region, error } => {
                self.stats.failed += 1;
                tracing::debug!("generation failed for ({}, {}): {error}", region.x, region.z);
            }
        }
    }

    fn submit_meshes(&mut self, wanted: &[RegionPos]) -> usize {
        let mut submitted = 0;
        for &pos in wanted {
            let level = self.detail_level_for(pos);
            let key = SpatialKey::new(pos, level);
            if !self.tracker.needs_remesh(key) {
                continue;
            }
            if !self.meshing.has_capacity() {
                break;
            }
            let Some(region) = self.store.snapshot(pos).filter(|r| r.has_data(level)) else {
                continue;
            };

            self.tracker.retain_level(pos, level);
            let data_version = self.tracker.begin(key);
            let task = MeshingTask {
                key,
                region,
                neighbors: self.mesh_neighbors(pos),
                fog: self.fog,
                debug: self.debug,
                data_version,
            };
            if !self.meshing.submit(task) {
                self.tracker.track(key).remesh_pending = false;
                break;
            }
            submitted += 1;
        }
        submitted
    }

    fn collect_meshes(&mut self) -> usize {
        let results = self.meshing.drain_results();
        let received = results.len();
        for result in results {
            let pos = result.key.region;
            if self.tracker.complete(result.key, result.data_version) && self.store.contains(pos) {
                self.meshes.insert(pos, result.buffer);
                self.stats.meshes_built += 1;
            } else {
                self.stats.meshes_stale += 1;
            }
        }
        received
    }
}

impl Drop for LodPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn chebyshev(a: RegionPos, b: RegionPos) -> i32 {
    (a.x - b.x).abs().max((a.z - b.z).abs())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
