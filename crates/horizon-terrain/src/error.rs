//! Generation error types.

use horizon_lod::RegionPos;

use crate::sampler::SampleError;

/// Errors a generation task can end with. None of them is fatal to the
/// pipeline.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The sampler could not serve the region. The region is marked stale
    /// and retried with exponential backoff.
    #[error("sampler unavailable for region ({}, {}): {reason}", .region.x, .region.z)]
    SamplerUnavailable { region: RegionPos, reason: String },

    /// The region is outside the world. Further requests are rejected
    /// until the region is evicted.
    #[error("region ({}, {}) is out of bounds", .region.x, .region.z)]
    OutOfBounds { region: RegionPos },

    /// The region was evicted or re-created while the task ran.
    #[error("region ({}, {}) changed identity while generating", .region.x, .region.z)]
    StaleRegion { region: RegionPos },
}

impl GenerationError {
    pub fn from_sample(region: RegionPos, err: SampleError) -> Self {
        match err {
            SampleError::Unavailable(reason) => Self::SamplerUnavailable { region, reason },
            SampleError::OutOfBounds(_) => Self::OutOfBounds { region },
        }
    }

    pub fn region(&self) -> RegionPos {
        match self {
            Self::SamplerUnavailable { region, .. }
            | Self::OutOfBounds { region }
            | Self::StaleRegion { region } => *region,
        }
    }

    /// `true` if asking again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SamplerUnavailable { .. })
    }
}
