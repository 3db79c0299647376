//! LOD terrain data: packed column points, region pyramids, and the
//! concurrent spatial store that owns them.
//!
//! Color and light resolution also lives here since both the generator
//! (tinting at encode time) and the mesh builder (shade and light per
//! vertex) need it.

pub mod aggregate;
pub mod color;
pub mod data_point;
pub mod events;
pub mod generation_mode;
pub mod light;
pub mod region;
pub mod store;

pub use aggregate::{AggregatePolicy, aggregate};
pub use color::{Rgba, Shade};
pub use data_point::{
    DecodedPoint, LodDataPoint, MAX_HEIGHT, MIN_HEIGHT, PointFlags, RawColumn, decode, encode,
};
pub use events::{MutationEventBuffer, RegionMutationEvent, apply_mutations};
pub use generation_mode::GenerationMode;
pub use light::{LightMap, MAX_LIGHT};
pub use region::{
    DEFAULT_REGION_DETAIL, Direction, LevelView, LodRegion, MAX_REGION_DETAIL, RegionPos,
    SpatialKey,
};
pub use store::{MergeOutcome, Neighbors, RegionHandle, SpatialStore};
