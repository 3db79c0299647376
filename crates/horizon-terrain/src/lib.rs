//! LOD generation: the column sampler boundary, a noise-based reference
//! sampler, and the staged generation scheduler that fills the
//! [`SpatialStore`](horizon_lod::SpatialStore).

mod error;
mod heightmap;
mod noise_sampler;
mod sampler;
mod scheduler;

pub use error::GenerationError;
pub use heightmap::{HeightmapParams, HeightmapSampler};
pub use noise_sampler::{Biome, NoiseColumnSampler, NoiseSamplerConfig};
pub use sampler::{ColumnSampler, RawColumns, SampleError, SampleRequest};
pub use scheduler::{
    GenerationEvent, GenerationScheduler, GenerationTask, RequestOutcome, SchedulerConfig,
    generate_region_sync,
};
