//! Headless driver for the LOD pipeline.
//!
//! Generates and meshes the regions around the origin for a fixed number
//! of ticks, injects one remote terrain change halfway through, and logs
//! what happened. Settings come from `config.ron` and can be overridden
//! on the command line:
//!
//! `cargo run -p horizon-app -- --view-radius 6 --strategy dynamic`

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use horizon_app::LodPipeline;
use horizon_app::platform::PlatformDirs;
use horizon_config::{CliArgs, Config};
use horizon_lod::RegionPos;
use horizon_terrain::{NoiseColumnSampler, NoiseSamplerConfig};
use tracing::info;

const DEFAULT_TICKS: u32 = 200;
const TICK_INTERVAL: Duration = Duration::from_millis(16);

fn main() {
    let args = CliArgs::parse();

    let dirs = match &args.config {
        Some(root) => PlatformDirs::resolve_with_root(root),
        None => PlatformDirs::resolve().unwrap_or_else(|e| {
            eprintln!("Failed to resolve platform directories: {e}");
            std::process::exit(1);
        }),
    };
    if let Err(e) = dirs.create_dirs() {
        eprintln!("Failed to create platform directories: {e}");
        std::process::exit(1);
    }

    let mut config = Config::load_or_create(&dirs.config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    horizon_log::init_logging(
        Some(&dirs.log_dir),
        config.debug.log_to_file,
        Some(&config),
    );
    info!(
        "seed {} | view radius {} | strategy {:?}",
        config.world.seed, config.world.view_radius, config.mesh.strategy
    );

    let sampler = NoiseColumnSampler::new(NoiseSamplerConfig {
        seed: config.world.seed,
        sea_level: config.world.sea_level,
        world_radius_regions: config.world.world_radius_regions,
    });
    let mut pipeline = LodPipeline::new(&config, Arc::new(sampler));

    let ticks = args.ticks.unwrap_or(DEFAULT_TICKS);
    let start = Instant::now();
    let mut settled_at = None;
    for tick in 0..ticks {
        if tick == ticks / 2 {
            pipeline.on_remote_mutation(RegionPos::new(0, 0));
            settled_at = None;
        }

        let report = pipeline.tick();
        if report.queued > 0 || report.meshes_received > 0 {
            tracing::debug!(
                "tick {tick}: queued {} | events {} | meshes {}/{}",
                report.queued,
                report.generation_events,
                report.meshes_submitted,
                report.meshes_received
            );
        }
        if settled_at.is_none() && pipeline.is_settled() {
            settled_at = Some(tick);
            info!(
                "settled at tick {tick} after {:?}: {} meshes, {} vertices",
                start.elapsed(),
                pipeline.mesh_count(),
                pipeline.vertex_count()
            );
        }

        std::thread::sleep(TICK_INTERVAL);
    }

    let stats = pipeline.stats();
    info!(
        "{} ticks | merged {} | unchanged {} | failed {} | meshes {} built, {} stale",
        stats.ticks,
        stats.merged,
        stats.unchanged,
        stats.failed,
        stats.meshes_built,
        stats.meshes_stale
    );
    if settled_at.is_none() {
        tracing::warn!("pipeline did not settle within {ticks} ticks");
    }
    pipeline.shutdown();
}
