//! Configuration structs with defaults and RON persistence.

use std::path::Path;

use horizon_lod::{AggregatePolicy, DEFAULT_REGION_DETAIL, GenerationMode, MAX_REGION_DETAIL};
use horizon_mesh::{DebugMode, FogConfig, StrategyKind};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub mesh: MeshConfig,
    pub fog: FogConfig,
    pub world: WorldConfig,
    pub debug: DebugConfig,
}

/// Generation scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Shared worker threads, 0 for automatic.
    pub worker_count: usize,
    /// In-flight task cap, 0 for automatic.
    pub max_in_flight: usize,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    /// Mode regions near the viewer are generated up to.
    pub target_mode: GenerationMode,
    /// Cheap first pass, and the final mode for distant regions.
    pub preview_mode: GenerationMode,
    pub aggregate_policy: AggregatePolicy,
    pub avoid_non_full: bool,
    pub avoid_no_collision: bool,
}

/// Mesh builder and meshing pool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeshConfig {
    pub strategy: StrategyKind,
    /// Height step in blocks the dynamic strategy keeps as a hard edge.
    pub dynamic_threshold: i32,
    pub bake_light: bool,
    /// Merge equal neighbouring top faces in the cubic strategy.
    pub merge_top_faces: bool,
    pub saturation: f32,
    pub brightness: f32,
    /// Meshing threads.
    pub worker_count: usize,
    /// Maximum in-flight meshing tasks.
    pub budget: usize,
}

/// World shape and view settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u64,
    /// Region width is `2^region_detail` blocks.
    pub region_detail: u8,
    pub sea_level: i32,
    /// Regions kept around the viewer, as a square radius.
    pub view_radius: u32,
    /// Regions within this radius are generated at the target mode.
    pub full_detail_radius: u32,
    /// Detail level of the regions nearest the viewer.
    pub min_detail_level: u8,
    /// Regions per detail level step as distance grows.
    pub lod_falloff: u32,
    /// Hard world edge in regions. `None` for an unbounded world.
    pub world_radius_regions: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter, e.g. "info" or "debug,horizon_terrain=trace".
    pub log_level: String,
    pub debug_mode: DebugMode,
    /// Also write JSON logs to the log directory.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            max_in_flight: 0,
            retry_base_ms: 250,
            retry_max_ms: 30_000,
            target_mode: GenerationMode::Features,
            preview_mode: GenerationMode::BiomeOnlySimulateHeight,
            aggregate_policy: AggregatePolicy::Average,
            avoid_non_full: false,
            avoid_no_collision: false,
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Cubic,
            dynamic_threshold: 8,
            bake_light: true,
            merge_top_faces: true,
            saturation: 1.0,
            brightness: 1.0,
            worker_count: 2,
            budget: 32,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            region_detail: DEFAULT_REGION_DETAIL,
            sea_level: 64,
            view_radius: 4,
            full_detail_radius: 2,
            min_detail_level: 3,
            lod_falloff: 1,
            world_radius_regions: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_mode: DebugMode::Off,
            log_to_file: false,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Reject combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = &self.world;
        if world.region_detail == 0 || world.region_detail > MAX_REGION_DETAIL {
            return Err(ConfigError::Invalid(format!(
                "world.region_detail must be in 1..={MAX_REGION_DETAIL}, got {}",
                world.region_detail
            )));
        }
        if world.min_detail_level > world.region_detail {
            return Err(ConfigError::Invalid(format!(
                "world.min_detail_level {} exceeds region_detail {}",
                world.min_detail_level, world.region_detail
            )));
        }
        if world.lod_falloff == 0 {
            return Err(ConfigError::Invalid("world.lod_falloff must be at least 1".into()));
        }

        let generation = &self.generation;
        if !generation.target_mode.is_generating() {
            return Err(ConfigError::Invalid(
                "generation.target_mode must be a generating mode".into(),
            ));
        }
        if generation.preview_mode > generation.target_mode {
            return Err(ConfigError::Invalid(format!(
                "generation.preview_mode {:?} is above target_mode {:?}",
                generation.preview_mode, generation.target_mode
            )));
        }
        if generation.retry_base_ms > generation.retry_max_ms {
            return Err(ConfigError::Invalid(
                "generation.retry_base_ms exceeds retry_max_ms".into(),
            ));
        }
        Ok(())
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_mesh::FogFalloff;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("region_detail: 9"));
        assert!(ron_str.contains("strategy: Cubic"));
        assert!(ron_str.contains("merge_top_faces: true"));
        assert!(ron_str.contains("target_mode: Features"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.mesh.strategy = StrategyKind::Dynamic;
        config.fog.falloff = FogFalloff::ExponentialSquared;
        config.world.world_radius_regions = Some(64);
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(generation: (), mesh: (strategy: Triangular))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.mesh.strategy, StrategyKind::Triangular);
        assert_eq!(config.mesh.budget, MeshConfig::default().budget);
        assert!(config.mesh.merge_top_faces);
        assert_eq!(config.world, WorldConfig::default());
        assert_eq!(config.fog, FogConfig::default());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_detail_levels() {
        let mut config = Config::default();
        config.world.region_detail = MAX_REGION_DETAIL + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.world.min_detail_level = config.world.region_detail + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_preview_above_target() {
        let mut config = Config::default();
        config.generation.target_mode = GenerationMode::Surface;
        config.generation.preview_mode = GenerationMode::Full;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "(world: (lod_falloff: 0))").unwrap();
        assert!(matches!(
            Config::load_or_create(dir.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.world.seed = 1234;
        config.generation.target_mode = GenerationMode::Full;
        config.debug.debug_mode = DebugMode::ShowDetailWireframe;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.world.view_radius = 12;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().world.view_radius, 12);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{not valid}}").unwrap();
        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
