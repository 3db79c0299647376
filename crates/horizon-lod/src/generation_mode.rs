//! Fidelity stages a region passes through while being generated.

use serde::{Deserialize, Serialize};

/// How much of the world generator ran to produce a data point.
///
/// Variants are ordered by increasing fidelity, so `a < b` means `b`
/// carries strictly more information than `a`. The discriminant is the
/// 3-bit value stored inside a packed [`LodDataPoint`](crate::LodDataPoint).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum GenerationMode {
    /// Nothing generated yet.
    #[default]
    None = 0,
    /// Only the biome is known; height is a flat sea-level guess.
    BiomeOnly = 1,
    /// Biome plus a per-biome height estimate.
    BiomeOnlySimulateHeight = 2,
    /// Real surface shape without decorations.
    Surface = 3,
    /// Surface plus trees and other features.
    Features = 4,
    /// Everything the host world generator produces. Not thread safe on
    /// the host side, so it gets a dedicated worker.
    Full = 5,
}

impl GenerationMode {
    /// Every generating mode, lowest fidelity first.
    pub const GENERATING: [GenerationMode; 5] = [
        GenerationMode::BiomeOnly,
        GenerationMode::BiomeOnlySimulateHeight,
        GenerationMode::Surface,
        GenerationMode::Features,
        GenerationMode::Full,
    ];

    /// Decode from the packed 3-bit field. Unknown values read as `None`.
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::BiomeOnly,
            2 => Self::BiomeOnlySimulateHeight,
            3 => Self::Surface,
            4 => Self::Features,
            5 => Self::Full,
            _ => Self::None,
        }
    }

    /// The packed 3-bit value.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// `true` for every mode that actually runs a generator.
    pub const fn is_generating(self) -> bool {
        !matches!(self, Self::None)
    }

    /// `true` if tasks in this mode may share the general worker pool.
    pub const fn uses_shared_pool(self) -> bool {
        !matches!(self, Self::Full)
    }
}
