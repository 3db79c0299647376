//! Staged, concurrency-aware LOD generation.
//!
//! Requests below [`GenerationMode::Full`] run on a shared worker pool.
//! `Full` requests run on one dedicated thread per scheduler, since hosts
//! cannot run their full generator concurrently. Workers sample, encode,
//! and merge into the [`SpatialStore`] themselves; the main thread only
//! drains [`GenerationEvent`]s once per frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use horizon_lod::{
    AggregatePolicy, GenerationMode, LodDataPoint, MergeOutcome, PointFlags, RegionPos,
    SpatialStore, encode,
};

use crate::error::GenerationError;
use crate::sampler::{ColumnSampler, SampleRequest};

/// Scheduler tuning.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Shared pool size. 0 picks a value from the CPU count.
    pub worker_count: usize,
    /// Cap on queued plus running tasks. 0 means eight per worker.
    pub max_in_flight: usize,
    /// First retry delay after the sampler reports it is unavailable.
    pub retry_base: Duration,
    /// Upper bound for the retry delay.
    pub retry_max: Duration,
    pub policy: AggregatePolicy,
    pub flags: PointFlags,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            max_in_flight: 0,
            retry_base: Duration::from_millis(250),
            retry_max: Duration::from_secs(30),
            policy: AggregatePolicy::Average,
            flags: PointFlags::NONE,
        }
    }
}

impl SchedulerConfig {
    /// Shared pool size after resolving the automatic setting.
    pub fn resolved_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        // Leave room for the main thread and the FULL worker.
        num_cpus::get().saturating_sub(2).max(1)
    }

    pub fn resolved_max_in_flight(&self) -> usize {
        if self.max_in_flight > 0 {
            return self.max_in_flight;
        }
        self.resolved_worker_count() * 8
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_base.saturating_mul(factor).min(self.retry_max)
    }
}

/// What happened to a generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A task was queued.
    Queued,
    /// The region already holds data at this mode or better and is clean.
    UpToDate,
    /// A task at the same or a higher mode is already pending.
    AlreadyPending,
    /// A lower-mode task for this region is still running. Ask again
    /// once it has merged so merges stay in increasing-mode order.
    Deferred,
    /// The in-flight cap is reached.
    AtCapacity,
    /// The sampler failed recently; the region is retried after the delay.
    BackingOff { retry_in: Duration },
    /// The region is out of bounds.
    Rejected,
}

/// Reported by workers, drained once per frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Points changed; meshes of the region and its neighbors are stale.
    Merged {
        region: RegionPos,
        mode: GenerationMode,
        changed: usize,
        version: u64,
    },
    /// Generation finished without changing any point.
    Unchanged {
        region: RegionPos,
        mode: GenerationMode,
    },
    /// The region was evicted or the task cancelled before merging.
    Discarded { region: RegionPos },
    Failed {
        region: RegionPos,
        error: GenerationError,
    },
}

impl GenerationEvent {
    pub fn region(&self) -> RegionPos {
        match self {
            Self::Merged { region, .. }
            | Self::Unchanged { region, .. }
            | Self::Discarded { region }
            | Self::Failed { region, .. } => *region,
        }
    }
}

/// One unit of work.
#[derive(Clone, Debug)]
pub struct GenerationTask {
    pub region: RegionPos,
    /// Store epoch observed when the task was queued.
    pub epoch: u64,
    /// Region invalidation count observed when the task was queued.
    pub invalidations: u64,
    pub mode: GenerationMode,
    pub flags: PointFlags,
}

struct PendingTask {
    mode: GenerationMode,
    cancelled: Arc<AtomicBool>,
}

struct QueuedTask {
    task: GenerationTask,
    cancelled: Arc<AtomicBool>,
}

struct FailureState {
    attempts: u32,
    retry_at: Instant,
}

/// State shared by the scheduler and its workers.
struct Shared {
    store: Arc<SpatialStore>,
    sampler: Arc<dyn ColumnSampler>,
    config: SchedulerConfig,
    pending: DashMap<RegionPos, PendingTask>,
    failures: DashMap<RegionPos, FailureState>,
    rejected: DashMap<RegionPos, ()>,
    in_flight: AtomicUsize,
}

impl Shared {
    fn run(&self, queued: QueuedTask) -> GenerationEvent {
        let region = queued.task.region;
        let event = if queued.cancelled.load(Ordering::Relaxed) {
            GenerationEvent::Discarded { region }
        } else {
            self.execute(&queued)
        };

        self.pending
            .remove_if(&region, |_, p| Arc::ptr_eq(&p.cancelled, &queued.cancelled));
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        event
    }

    fn execute(&self, queued: &QueuedTask) -> GenerationEvent {
        let task = &queued.task;
        let region = task.region;
        let start = Instant::now();

        let outcome = sample_region(&self.store, self.sampler.as_ref(), task).map(|points| {
            if queued.cancelled.load(Ordering::Relaxed) {
                tracing::debug!(
                    "dropping cancelled result for ({}, {})",
                    region.x,
                    region.z
                );
                return MergeOutcome::Discarded;
            }
            merge_region(&self.store, task, &points, self.config.policy)
        });

        match outcome {
            Ok(MergeOutcome::Merged { changed, version }) => {
                self.failures.remove(&region);
                tracing::debug!(
                    "generated ({}, {}) at {:?}: {changed} point(s) changed in {:?}",
                    region.x,
                    region.z,
                    task.mode,
                    start.elapsed()
                );
                GenerationEvent::Merged {
                    region,
                    mode: task.mode,
                    changed,
                    version,
                }
            }
            Ok(MergeOutcome::Unchanged) => {
                self.failures.remove(&region);
                GenerationEvent::Unchanged {
                    region,
                    mode: task.mode,
                }
            }
            Ok(MergeOutcome::Discarded) => GenerationEvent::Discarded { region },
            Err(GenerationError::StaleRegion { .. }) => {
                tracing::debug!(
                    "discarded result for evicted region ({}, {})",
                    region.x,
                    region.z
                );
                GenerationEvent::Discarded { region }
            }
            Err(error) => {
                self.record_failure(&error);
                GenerationEvent::Failed { region, error }
            }
        }
    }

    fn record_failure(&self, error: &GenerationError) {
        let region = error.region();
        match error {
            GenerationError::SamplerUnavailable { reason, .. } => {
                let mut state = self.failures.entry(region).or_insert(FailureState {
                    attempts: 0,
                    retry_at: Instant::now(),
                });
                state.attempts += 1;
                let delay = self.config.backoff(state.attempts);
                state.retry_at = Instant::now() + delay;
                self.store.invalidate(region);
                tracing::warn!(
                    "sampler unavailable for ({}, {}), attempt {}, retrying in {delay:?}: {reason}",
                    region.x,
                    region.z,
                    state.attempts
                );
            }
            GenerationError::OutOfBounds { .. } => {
                self.rejected.insert(region, ());
                tracing::warn!("dropping out-of-bounds region ({}, {})", region.x, region.z);
            }
            GenerationError::StaleRegion { .. } => {}
        }
    }
}

/// Generation front end for one dimension.
pub struct GenerationScheduler {
    shared: Arc<Shared>,
    shared_sender: Option<Sender<QueuedTask>>,
    full_sender: Option<Sender<QueuedTask>>,
    event_receiver: Receiver<GenerationEvent>,
    worker_handles: Vec<JoinHandle<()>>,
    max_in_flight: usize,
}

impl GenerationScheduler {
    /// Spawn the shared pool and the FULL worker.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn a worker thread.
    pub fn new(
        store: Arc<SpatialStore>,
        sampler: Arc<dyn ColumnSampler>,
        config: SchedulerConfig,
    ) -> Self {
        let worker_count = config.resolved_worker_count();
        let max_in_flight = config.resolved_max_in_flight();

        let (shared_sender, shared_receiver) = bounded::<QueuedTask>(max_in_flight);
        let (full_sender, full_receiver) = bounded::<QueuedTask>(max_in_flight);
        let (event_sender, event_receiver) = unbounded();

        let shared = Arc::new(Shared {
            store,
            sampler,
            config,
            pending: DashMap::new(),
            failures: DashMap::new(),
            rejected: DashMap::new(),
            in_flight: AtomicUsize::new(0),
        });

        let mut worker_handles = Vec::with_capacity(worker_count + 1);
        for i in 0..worker_count {
            worker_handles.push(spawn_worker(
                format!("lod-gen-worker-{i}"),
                shared_receiver.clone(),
                event_sender.clone(),
                Arc::clone(&shared),
            ));
        }
        worker_handles.push(spawn_worker(
            "lod-gen-full".into(),
            full_receiver,
            event_sender,
            Arc::clone(&shared),
        ));

        tracing::info!(
            "generation scheduler started: {worker_count} shared worker(s) + 1 full worker, \
             max {max_in_flight} in flight"
        );

        Self {
            shared,
            shared_sender: Some(shared_sender),
            full_sender: Some(full_sender),
            event_receiver,
            worker_handles,
            max_in_flight,
        }
    }

    /// Scheduler with default tuning.
    pub fn with_defaults(store: Arc<SpatialStore>, sampler: Arc<dyn ColumnSampler>) -> Self {
        Self::new(store, sampler, SchedulerConfig::default())
    }

    pub fn store(&self) -> &Arc<SpatialStore> {
        &self.shared.store
    }

    /// Ask for `region` to be generated up to `mode`.
    ///
    /// Creates the region in the store if needed. A request at or below
    /// the mode the region already completed is a no-op unless the region
    /// is dirty.
    pub fn request(&self, region: RegionPos, mode: GenerationMode) -> RequestOutcome {
        if !mode.is_generating() {
            return RequestOutcome::UpToDate;
        }
        if self.shared.rejected.contains_key(&region) {
            return RequestOutcome::Rejected;
        }
        if let Some(failure) = self.shared.failures.get(&region) {
            let now = Instant::now();
            if now < failure.retry_at {
                return RequestOutcome::BackingOff {
                    retry_in: failure.retry_at - now,
                };
            }
        }

        let handle = self.shared.store.get_or_create(region);
        let snapshot = handle.snapshot();
        let mut up_to_date = !snapshot.is_dirty() && snapshot.mode() >= mode;

        let cancelled = Arc::new(AtomicBool::new(false));
        match self.shared.pending.entry(region) {
            Entry::Occupied(pending) => {
                return if mode > pending.get().mode {
                    RequestOutcome::Deferred
                } else {
                    RequestOutcome::AlreadyPending
                };
            }
            Entry::Vacant(slot) => {
                // A task may have merged between the snapshot and taking
                // the entry; re-check against the latest state.
                if !up_to_date {
                    let latest = handle.snapshot();
                    up_to_date = !latest.is_dirty() && latest.mode() >= mode;
                }
                if up_to_date {
                    return RequestOutcome::UpToDate;
                }
                if self.shared.in_flight.load(Ordering::Relaxed) >= self.max_in_flight {
                    return RequestOutcome::AtCapacity;
                }
                slot.insert(PendingTask {
                    mode,
                    cancelled: Arc::clone(&cancelled),
                });
            }
        }

        let task = GenerationTask {
            region,
            epoch: handle.epoch(),
            invalidations: handle.snapshot().invalidations(),
            mode,
            flags: self.shared.config.flags,
        };
        let sender = if mode.uses_shared_pool() {
            self.shared_sender.as_ref()
        } else {
            self.full_sender.as_ref()
        };
        let Some(sender) = sender else {
            self.shared.pending.remove(&region);
            return RequestOutcome::AtCapacity;
        };

        self.shared.in_flight.fetch_add(1, Ordering::Relaxed);
        match sender.try_send(QueuedTask { task, cancelled }) {
            Ok(()) => RequestOutcome::Queued,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.shared.in_flight.fetch_sub(1, Ordering::Relaxed);
                self.shared.pending.remove(&region);
                RequestOutcome::AtCapacity
            }
        }
    }

    /// Request every region within `radius` of `center`, nearest first.
    pub fn request_around(
        &self,
        center: RegionPos,
        radius: i32,
        mode: GenerationMode,
    ) -> Vec<(RegionPos, RequestOutcome)> {
        let mut positions = Vec::new();
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                positions.push(RegionPos::new(center.x + dx, center.z + dz));
            }
        }
        positions.sort_by_key(|p| p.distance_sq(center));
        positions
            .into_iter()
            .map(|pos| (pos, self.request(pos, mode)))
            .collect()
    }

    /// Cancel the pending task for `region`, if any. A task already
    /// sampling finishes sampling, but its points are never merged and it
    /// reports [`GenerationEvent::Discarded`]. A task already merging
    /// completes normally.
    pub fn cancel(&self, region: RegionPos) {
        if let Some((_, pending)) = self.shared.pending.remove(&region) {
            pending.cancelled.store(true, Ordering::Relaxed);
        }
    }

    /// Cancel work for `region`, forget its failure history, and remove it
    /// from the store.
    pub fn evict(&self, region: RegionPos) {
        self.cancel(region);
        self.shared.failures.remove(&region);
        self.shared.rejected.remove(&region);
        self.shared.store.evict(region);
    }

    /// Drain all events reported since the last call. Call once per frame.
    pub fn drain_events(&self) -> Vec<GenerationEvent> {
        self.event_receiver.try_iter().collect()
    }

    /// Tasks queued or running.
    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.load(Ordering::Relaxed)
    }

    pub fn is_pending(&self, region: RegionPos) -> bool {
        self.shared.pending.contains_key(&region)
    }

    /// Stop accepting work and join all workers. Queued tasks still run.
    pub fn shutdown(&mut self) {
        self.shared_sender.take();
        self.full_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for GenerationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker(
    name: String,
    receiver: Receiver<QueuedTask>,
    events: Sender<GenerationEvent>,
    shared: Arc<Shared>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            while let Ok(queued) = receiver.recv() {
                let event = shared.run(queued);
                let _ = events.send(event);
            }
        })
        .expect("failed to spawn LOD generation worker thread")
}

/// Sample, encode, and merge one region on the calling thread.
///
/// Workers run the same two steps with a cancellation check in between;
/// this is public so hosts and tests can generate synchronously.
pub fn generate_region_sync(
    store: &SpatialStore,
    sampler: &dyn ColumnSampler,
    task: &GenerationTask,
    policy: AggregatePolicy,
) -> Result<MergeOutcome, GenerationError> {
    let points = sample_region(store, sampler, task)?;
    match merge_region(store, task, &points, policy) {
        MergeOutcome::Discarded => Err(GenerationError::StaleRegion { region: task.region }),
        outcome => Ok(outcome),
    }
}

/// Sample and encode the level-0 points for `task` without touching the
/// store.
fn sample_region(
    store: &SpatialStore,
    sampler: &dyn ColumnSampler,
    task: &GenerationTask,
) -> Result<Vec<LodDataPoint>, GenerationError> {
    let region = task.region;
    match store.get(region) {
        Some(handle) if handle.epoch() == task.epoch => {}
        _ => return Err(GenerationError::StaleRegion { region }),
    }

    let request = SampleRequest {
        region,
        region_detail: store.region_detail(),
        mode: task.mode,
        flags: task.flags,
    };
    let raw = sampler
        .sample(&request)
        .map_err(|err| GenerationError::from_sample(region, err))?;

    let expected = request.width() * request.width();
    if raw.columns.len() != expected {
        return Err(GenerationError::SamplerUnavailable {
            region,
            reason: format!("returned {} columns, expected {expected}", raw.columns.len()),
        });
    }

    Ok(raw
        .columns
        .iter()
        .map(|column| encode(column, task.mode, task.flags))
        .collect())
}

fn merge_region(
    store: &SpatialStore,
    task: &GenerationTask,
    points: &[LodDataPoint],
    policy: AggregatePolicy,
) -> MergeOutcome {
    store.merge(
        task.region,
        task.epoch,
        task.invalidations,
        points,
        task.mode,
        policy,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
