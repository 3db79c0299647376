//! Noise-driven stand-in for a host world generator.
//!
//! [`NoiseColumnSampler`] answers every generation mode with progressively
//! more detail so the pipeline can run headless and in tests. Hosts that
//! embed the pipeline plug in their own [`ColumnSampler`].

use noise::{NoiseFn, Simplex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use horizon_lod::{GenerationMode, MAX_LIGHT, MIN_HEIGHT, PointFlags, RawColumn, RegionPos, Rgba};

use crate::heightmap::{HeightmapParams, HeightmapSampler};
use crate::sampler::{ColumnSampler, RawColumns, SampleError, SampleRequest};

/// Coarse climate classes, enough to give far terrain believable colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Biome {
    Ocean,
    Plains,
    Forest,
    Desert,
    Mountains,
    Tundra,
}

impl Biome {
    /// Untinted surface material.
    pub fn material(self) -> Rgba {
        match self {
            Biome::Ocean => Rgba::opaque(64, 96, 220),
            Biome::Plains | Biome::Forest => Rgba::opaque(200, 200, 200),
            Biome::Desert => Rgba::opaque(219, 207, 163),
            Biome::Mountains => Rgba::opaque(125, 125, 125),
            Biome::Tundra => Rgba::opaque(250, 250, 250),
        }
    }

    /// Grass tint. Only vegetated biomes are tinted.
    pub fn tint(self) -> Rgba {
        match self {
            Biome::Plains => Rgba::opaque(145, 189, 89),
            Biome::Forest => Rgba::opaque(89, 174, 48),
            _ => Rgba::WHITE,
        }
    }

    /// Height guess used when only the biome is known.
    pub fn simulated_height(self, sea_level: i32) -> i32 {
        sea_level
            + match self {
                Biome::Ocean => 0,
                Biome::Desert => 3,
                Biome::Plains => 4,
                Biome::Forest => 6,
                Biome::Tundra => 8,
                Biome::Mountains => 40,
            }
    }

    /// Chance per column of a tree.
    pub fn tree_density(self) -> f64 {
        match self {
            Biome::Forest => 0.08,
            Biome::Plains => 0.005,
            Biome::Tundra => 0.01,
            _ => 0.0,
        }
    }
}

const LEAVES: Rgba = Rgba::opaque(60, 120, 40);
const TALL_GRASS: Rgba = Rgba::opaque(110, 160, 70);
const SNOW: Rgba = Rgba::opaque(240, 245, 250);
const TREE_HEIGHT: i32 = 5;

/// Settings for [`NoiseColumnSampler`].
#[derive(Clone, Debug)]
pub struct NoiseSamplerConfig {
    pub seed: u64,
    pub sea_level: i32,
    /// Regions with `|x|` or `|z|` above this are out of bounds.
    pub world_radius_regions: Option<u32>,
}

impl Default for NoiseSamplerConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            sea_level: 64,
            world_radius_regions: None,
        }
    }
}

/// Deterministic column sampler built from simplex noise fields.
pub struct NoiseColumnSampler {
    config: NoiseSamplerConfig,
    heightmap: HeightmapSampler,
    detail: Simplex,
    continental: Simplex,
    temperature: Simplex,
    moisture: Simplex,
}

impl NoiseColumnSampler {
    pub fn new(config: NoiseSamplerConfig) -> Self {
        let seed = config.seed;
        let heightmap = HeightmapSampler::new(HeightmapParams {
            seed,
            base_height: config.sea_level as f64,
            ..Default::default()
        });
        Self {
            heightmap,
            detail: Simplex::new(seed.wrapping_add(0x5EED) as u32),
            continental: Simplex::new(seed.wrapping_add(0xC0FF_EE00) as u32),
            temperature: Simplex::new(seed.wrapping_add(0xDEAD_BEEF) as u32),
            moisture: Simplex::new(seed.wrapping_add(0xBADC_0DE5) as u32),
            config,
        }
    }

    pub fn config(&self) -> &NoiseSamplerConfig {
        &self.config
    }

    fn continentalness(&self, x: f64, z: f64) -> f64 {
        (self.continental.get([x * 0.0007, z * 0.0007]) + 1.0) * 0.5
    }

    /// Biome at a block column.
    pub fn biome_at(&self, x: i64, z: i64) -> Biome {
        let (fx, fz) = (x as f64, z as f64);
        let continental = self.continentalness(fx, fz);
        let temperature = (self.temperature.get([fx * 0.0005, fz * 0.0005]) + 1.0) * 0.5;
        let moisture = (self.moisture.get([fx * 0.0007, fz * 0.0007]) + 1.0) * 0.5;

        if continental < 0.35 {
            Biome::Ocean
        } else if continental > 0.75 {
            Biome::Mountains
        } else if temperature < 0.3 {
            Biome::Tundra
        } else if temperature > 0.7 && moisture < 0.35 {
            Biome::Desert
        } else if moisture > 0.55 {
            Biome::Forest
        } else {
            Biome::Plains
        }
    }

    /// Terrain surface ignoring water and decorations.
    pub fn terrain_height(&self, x: i64, z: i64) -> i32 {
        let continental = self.continentalness(x as f64, z as f64);
        self.heightmap.surface_height(x, z) + ((continental - 0.5) * 80.0) as i32
    }

    fn in_bounds(&self, region: RegionPos) -> bool {
        match self.config.world_radius_regions {
            Some(r) => region.x.unsigned_abs() <= r && region.z.unsigned_abs() <= r,
            None => true,
        }
    }

    fn column(
        &self,
        x: i64,
        z: i64,
        mode: GenerationMode,
        flags: PointFlags,
        rng: &mut ChaCha8Rng,
    ) -> RawColumn {
        let sea = self.config.sea_level;
        let biome = self.biome_at(x, z);
        let ground = |top: i32, biome: Biome| RawColumn {
            tint: biome.tint(),
            ..RawColumn::solid(top, MIN_HEIGHT, biome.material())
        };

        match mode {
            GenerationMode::None => RawColumn::void(),
            GenerationMode::BiomeOnly => ground(sea, biome),
            GenerationMode::BiomeOnlySimulateHeight => ground(biome.simulated_height(sea), biome),
            GenerationMode::Surface | GenerationMode::Features | GenerationMode::Full => {
                let mut top = self.terrain_height(x, z);
                if mode == GenerationMode::Full {
                    let bump = self.detail.get([x as f64 * 0.08, z as f64 * 0.08]) * 1.5;
                    top += bump.round() as i32;
                }
                if top < sea {
                    return ground(sea, Biome::Ocean);
                }

                let mut column = ground(top, biome);
                if mode >= GenerationMode::Features {
                    self.decorate(&mut column, biome, flags, rng);
                }
                column
            }
        }
    }

    /// Trees, tall grass and snow layers. The rng is advanced by the same
    /// amount whatever the flags, so flags never shift later columns.
    fn decorate(
        &self,
        column: &mut RawColumn,
        biome: Biome,
        flags: PointFlags,
        rng: &mut ChaCha8Rng,
    ) {
        let tree_roll: f64 = rng.random();
        let cover_roll: f64 = rng.random();

        if tree_roll < biome.tree_density() {
            column.height_top += TREE_HEIGHT;
            column.material = LEAVES;
            column.tint = Rgba::WHITE;
            return;
        }

        match biome {
            Biome::Plains | Biome::Forest
                if cover_roll < 0.25 && !flags.contains(PointFlags::AVOID_NO_COLLISION) =>
            {
                column.height_top += 1;
                column.material = TALL_GRASS;
                column.tint = Rgba::WHITE;
            }
            Biome::Tundra if !flags.contains(PointFlags::AVOID_NON_FULL) => {
                column.height_top += 1;
                column.material = SNOW;
                column.tint = Rgba::WHITE;
            }
            _ => {}
        }
    }
}

impl ColumnSampler for NoiseColumnSampler {
    fn sample(&self, request: &SampleRequest) -> Result<RawColumns, SampleError> {
        if !self.in_bounds(request.region) {
            return Err(SampleError::OutOfBounds(request.region));
        }

        let (ox, oz) = request.block_origin();
        let region_key = ((request.region.x as u32 as u64) << 32) | (request.region.z as u32 as u64);
        let region_seed = self.config.seed ^ region_key;
        let mut rng = ChaCha8Rng::seed_from_u64(region_seed);

        Ok(RawColumns::from_fn(request.width(), |x, z| {
            let mut column = self.column(
                ox + x as i64,
                oz + z as i64,
                request.mode,
                request.flags,
                &mut rng,
            );
            column.light_sky = MAX_LIGHT;
            column
        }))
    }
}
