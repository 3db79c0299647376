//! Boundary to the host world generator.
//!
//! The pipeline never generates terrain itself. It asks a
//! [`ColumnSampler`] for one region's worth of raw columns at a given
//! fidelity and packs the answer into LOD points.

use horizon_lod::{GenerationMode, PointFlags, RawColumn, RegionPos};

/// What a sampler is asked to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRequest {
    pub region: RegionPos,
    /// Regions are `2^region_detail` blocks wide.
    pub region_detail: u8,
    pub mode: GenerationMode,
    /// Blocks the sampler should skip when locating the surface.
    pub flags: PointFlags,
}

impl SampleRequest {
    /// Columns along each axis.
    pub fn width(&self) -> usize {
        1 << self.region_detail
    }

    /// World block coordinates of the region's minimum corner.
    pub fn block_origin(&self) -> (i64, i64) {
        self.region.block_origin(self.region_detail)
    }
}

/// One region of sampled columns, indexed `x + z * width`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawColumns {
    pub width: usize,
    pub columns: Vec<RawColumn>,
}

impl RawColumns {
    pub fn from_fn(width: usize, mut f: impl FnMut(usize, usize) -> RawColumn) -> Self {
        let mut columns = Vec::with_capacity(width * width);
        for z in 0..width {
            for x in 0..width {
                columns.push(f(x, z));
            }
        }
        Self { width, columns }
    }

    /// Every column identical.
    pub fn uniform(width: usize, column: RawColumn) -> Self {
        Self {
            width,
            columns: vec![column; width * width],
        }
    }
}

/// Why a sampler could not answer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// The host cannot serve the request right now (world not loaded,
    /// generator busy). Worth retrying later.
    #[error("sampler unavailable: {0}")]
    Unavailable(String),

    /// The region lies outside the world. Retrying will not help.
    #[error("region ({}, {}) is out of bounds", .0.x, .0.z)]
    OutOfBounds(RegionPos),
}

/// Produces raw columns for a region.
///
/// Called from generation worker threads, so implementations must be
/// thread safe. Requests in [`GenerationMode::Full`] are only ever issued
/// from a single thread at a time.
pub trait ColumnSampler: Send + Sync {
    fn sample(&self, request: &SampleRequest) -> Result<RawColumns, SampleError>;
}

/// Any matching closure is a sampler.
impl<F> ColumnSampler for F
where
    F: Fn(&SampleRequest) -> Result<RawColumns, SampleError> + Send + Sync,
{
    fn sample(&self, request: &SampleRequest) -> Result<RawColumns, SampleError> {
        self(request)
    }
}
