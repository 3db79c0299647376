//! Meshing for LOD terrain regions.
//!
//! A [`MeshBuilder`] turns one detail level of a region into a triangle
//! list using one of three strategies: cubic boxes, smoothed triangles,
//! or a dynamic mix of the two. Builds are pure and run on the
//! [`MeshingPipeline`] thread pool; [`MeshTracker`] decides what needs
//! rebuilding when region data changes.

mod async_mesh;
mod buffer;
mod builder;
mod context;
mod cubic;
mod face;
mod fog;
mod invalidation;
mod settings;
mod smooth;
mod vertex;
mod vertex_format;

pub use async_mesh::{MeshingPipeline, MeshingResult, MeshingTask};
pub use buffer::VertexBuffer;
pub use builder::{MeshBuilder, MeshStrategy};
pub use context::{Grid, MeshContext};
pub use cubic::CubicStrategy;
pub use face::Face;
pub use fog::{FogConfig, FogFalloff};
pub use invalidation::{MeshInvalidator, MeshTracker, RegionMeshState};
pub use settings::{DebugMode, MeshSettings, StrategyKind};
pub use smooth::SmoothStrategy;
pub use vertex::{LodVertex, light_uv};
pub use vertex_format::{LOD_VERTEX_ATTRIBUTES, LOD_VERTEX_LAYOUT};
