//! Asynchronous meshing pipeline: builds region meshes on a thread pool
//! from snapshots and hands results back over a channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use horizon_lod::{LodRegion, Neighbors, SpatialKey};

use crate::buffer::VertexBuffer;
use crate::builder::MeshBuilder;
use crate::fog::FogConfig;
use crate::settings::DebugMode;

/// A self-contained meshing task that can run on any thread.
///
/// Region and neighbours are immutable snapshots, so meshing takes no
/// locks on the store.
pub struct MeshingTask {
    pub key: SpatialKey,
    pub region: Arc<LodRegion>,
    pub neighbors: Neighbors,
    pub fog: FogConfig,
    pub debug: DebugMode,
    /// Tracker version at submit time, echoed back in the result.
    pub data_version: u64,
}

/// The result of a completed meshing task.
pub struct MeshingResult {
    pub key: SpatialKey,
    pub buffer: VertexBuffer,
    pub data_version: u64,
}

/// Meshing thread pool.
///
/// The main thread submits [`MeshingTask`]s and collects
/// [`MeshingResult`]s each frame with [`drain_results`](Self::drain_results).
pub struct MeshingPipeline {
    task_sender: Option<crossbeam_channel::Sender<MeshingTask>>,
    result_receiver: crossbeam_channel::Receiver<MeshingResult>,
    worker_handles: Vec<JoinHandle<()>>,
    /// Maximum number of in-flight tasks.
    budget: usize,
    in_flight: Arc<AtomicUsize>,
}

impl MeshingPipeline {
    pub fn new(worker_count: usize, budget: usize, builder: Arc<MeshBuilder>) -> Self {
        let budget = budget.max(1);
        let (task_tx, task_rx) = crossbeam_channel::bounded(budget);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count.max(1) {
            let rx: crossbeam_channel::Receiver<MeshingTask> = task_rx.clone();
            let tx = result_tx.clone();
            let builder = Arc::clone(&builder);
            let flight = Arc::clone(&in_flight);

            let handle = std::thread::Builder::new()
                .name(format!("lod-mesh-worker-{i}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        let buffer = builder.build(
                            &task.region,
                            &task.neighbors,
                            task.key.detail_level,
                            &task.fog,
                            task.debug,
                        );
                        flight.fetch_sub(1, Ordering::Relaxed);
                        let _ = tx.send(MeshingResult {
                            key: task.key,
                            buffer,
                            data_version: task.data_version,
                        });
                    }
                })
                .expect("failed to spawn mesh worker thread");
            handles.push(handle);
        }

        tracing::info!(
            "Meshing pipeline started: {} workers, budget {budget}, strategy {:?}",
            handles.len(),
            builder.kind()
        );

        Self {
            task_sender: Some(task_tx),
            result_receiver: result_rx,
            worker_handles: handles,
            budget,
            in_flight,
        }
    }

    /// Submit a meshing task. Returns `false` if the budget is exhausted
    /// or the pipeline has been shut down.
    pub fn submit(&self, task: MeshingTask) -> bool {
        let Some(sender) = &self.task_sender else {
            return false;
        };
        if self.in_flight.load(Ordering::Relaxed) >= self.budget {
            return false;
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        if sender.send(task).is_err() {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Drain all completed results. Called once per frame.
    pub fn drain_results(&self) -> Vec<MeshingResult> {
        self.result_receiver.try_iter().collect()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn has_capacity(&self) -> bool {
        self.task_sender.is_some() && self.in_flight_count() < self.budget
    }

    /// Close the task channel and join every worker.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for MeshingPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StrategyKind;
    use horizon_lod::{
        AggregatePolicy, GenerationMode, LodDataPoint, PointFlags, RegionPos, Rgba,
    };
    use std::time::{Duration, Instant};

    fn hill(pos: RegionPos) -> Arc<LodRegion> {
        let points: Vec<_> = (0..64)
            .map(|i| {
                let top = 60 + (i % 8) as i32;
                LodDataPoint::new(
                    top,
                    0,
                    Rgba::GREEN,
                    0,
                    15,
                    GenerationMode::Surface,
                    PointFlags::NONE,
                )
            })
            .collect();
        Arc::new(LodRegion::with_level0(pos, 3, &points, AggregatePolicy::Average))
    }

    fn task(x: i32, version: u64) -> MeshingTask {
        let pos = RegionPos::new(x, 0);
        MeshingTask {
            key: SpatialKey::new(pos, 0),
            region: hill(pos),
            neighbors: Neighbors::default(),
            fog: FogConfig::default(),
            debug: DebugMode::Off,
            data_version: version,
        }
    }

    fn pipeline(workers: usize, budget: usize) -> MeshingPipeline {
        MeshingPipeline::new(workers, budget, Arc::new(MeshBuilder::default()))
    }

    fn wait_for(pipeline: &MeshingPipeline, count: usize) -> Vec<MeshingResult> {
        let mut received = Vec::new();
        let start = Instant::now();
        while received.len() < count {
            received.extend(pipeline.drain_results());
            assert!(start.elapsed().as_secs() < 10, "Timed out waiting for meshes");
            std::thread::sleep(Duration::from_millis(1));
        }
        received
    }

    #[test]
    fn test_meshing_task_produces_mesh() {
        let pipeline = pipeline(2, 8);
        assert!(pipeline.submit(task(0, 1)));

        let results = wait_for(&pipeline, 1);
        assert_eq!(results[0].key, SpatialKey::new(RegionPos::new(0, 0), 0));
        assert!(results[0].buffer.triangle_count() > 0);
        assert_eq!(results[0].data_version, 1);
    }

    #[test]
    fn test_concurrent_tasks_do_not_interfere() {
        let pipeline = pipeline(4, 16);
        for x in 0..8 {
            assert!(pipeline.submit(task(x, 7)));
        }

        let results = wait_for(&pipeline, 8);
        let mut xs: Vec<_> = results.iter().map(|r| r.key.region.x).collect();
        xs.sort();
        assert_eq!(xs, (0..8).collect::<Vec<_>>());

        // Same data, same geometry regardless of which worker built it.
        let first = &results[0].buffer.vertices;
        assert!(results.iter().all(|r| r.buffer.vertices == *first));
    }

    #[test]
    fn test_budget_limits_active_tasks() {
        let pipeline = pipeline(1, 2);
        let submitted = (0..10).filter(|&x| pipeline.submit(task(x, 1))).count();
        assert!(submitted <= 4, "Budget should limit submissions, got {submitted}");
    }

    #[test]
    fn test_in_flight_returns_to_zero() {
        let pipeline = pipeline(2, 4);
        assert!(pipeline.submit(task(0, 1)));
        assert!(pipeline.submit(task(1, 1)));
        wait_for(&pipeline, 2);
        assert_eq!(pipeline.in_flight_count(), 0);
        assert!(pipeline.has_capacity());
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut pipeline = pipeline(1, 4);
        pipeline.shutdown();
        assert!(!pipeline.submit(task(0, 1)));
        assert!(!pipeline.has_capacity());
    }

    #[test]
    fn test_uses_configured_strategy() {
        let builder = Arc::new(MeshBuilder::new(StrategyKind::Triangular, Default::default()));
        let pipeline = MeshingPipeline::new(1, 2, Arc::clone(&builder));
        assert!(pipeline.submit(task(3, 1)));
        let results = wait_for(&pipeline, 1);

        let t = task(3, 1);
        let expected = builder.build(&t.region, &t.neighbors, 0, &t.fog, t.debug);
        assert_eq!(results[0].buffer, expected);
    }
}
