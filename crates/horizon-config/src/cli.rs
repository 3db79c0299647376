//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;
use horizon_mesh::{DebugMode, StrategyKind};

use crate::Config;

/// Horizon command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "horizon", about = "Headless LOD terrain pipeline")]
pub struct CliArgs {
    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// View radius in regions.
    #[arg(long)]
    pub view_radius: Option<u32>,

    /// Generation worker threads (0 = automatic).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Mesh strategy.
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<StrategyKind>,

    /// Detail-level debug view (off, detail, wireframe).
    #[arg(long, value_parser = parse_debug_mode)]
    pub debug_view: Option<DebugMode>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Number of pipeline ticks to run before exiting.
    #[arg(long)]
    pub ticks: Option<u32>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_strategy(s: &str) -> Result<StrategyKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "cubic" => Ok(StrategyKind::Cubic),
        "triangular" => Ok(StrategyKind::Triangular),
        "dynamic" => Ok(StrategyKind::Dynamic),
        other => Err(format!("unknown strategy `{other}`")),
    }
}

fn parse_debug_mode(s: &str) -> Result<DebugMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "off" => Ok(DebugMode::Off),
        "detail" => Ok(DebugMode::ShowDetail),
        "wireframe" => Ok(DebugMode::ShowDetailWireframe),
        other => Err(format!("unknown debug view `{other}`")),
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(radius) = args.view_radius {
            self.world.view_radius = radius;
        }
        if let Some(workers) = args.workers {
            self.generation.worker_count = workers;
        }
        if let Some(strategy) = args.strategy {
            self.mesh.strategy = strategy;
        }
        if let Some(mode) = args.debug_view {
            self.debug.debug_mode = mode;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
