//! Host-side wiring for the Horizon LOD pipeline.
//!
//! [`LodPipeline`] drives generation and meshing for the regions around a
//! viewer; [`platform`] resolves where config and logs live.

pub mod platform;
mod pipeline;

pub use pipeline::{LodPipeline, PipelineStats, TickReport};
