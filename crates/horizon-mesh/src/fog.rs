//! Distance fog baked into vertex colors.

use glam::Vec3;
use horizon_lod::Rgba;
use horizon_lod::color::lerp;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FogFalloff {
    #[default]
    Off,
    Linear,
    Exponential,
    ExponentialSquared,
}

/// Fog parameters for a mesh build. Distances are in blocks from `origin`,
/// measured horizontally.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub falloff: FogFalloff,
    pub color: Rgba,
    pub start: f32,
    pub end: f32,
    pub density: f32,
    /// Upper bound on the fog blend, `0.0..=1.0`.
    pub max_opacity: f32,
    /// World-space camera position.
    #[serde(skip)]
    pub origin: Vec3,
}

impl FogConfig {
    pub fn is_enabled(&self) -> bool {
        self.falloff != FogFalloff::Off && self.max_opacity > 0.0
    }

    /// Fog amount at `distance`, in `0.0..=max_opacity`.
    pub fn factor(&self, distance: f32) -> f32 {
        let raw = match self.falloff {
            FogFalloff::Off => 0.0,
            FogFalloff::Linear => {
                if self.end <= self.start {
                    if distance >= self.start { 1.0 } else { 0.0 }
                } else {
                    (distance - self.start) / (self.end - self.start)
                }
            }
            FogFalloff::Exponential => {
                let d = (distance - self.start).max(0.0);
                1.0 - (-self.density * d).exp()
            }
            FogFalloff::ExponentialSquared => {
                let d = (distance - self.start).max(0.0) * self.density;
                1.0 - (-d * d).exp()
            }
        };
        raw.clamp(0.0, 1.0) * self.max_opacity.clamp(0.0, 1.0)
    }

    /// Blend `color` towards the fog color for a vertex at `world_pos`.
    pub fn apply(&self, color: Rgba, world_pos: Vec3) -> Rgba {
        if !self.is_enabled() {
            return color;
        }
        let dx = world_pos.x - self.origin.x;
        let dz = world_pos.z - self.origin.z;
        let f = self.factor((dx * dx + dz * dz).sqrt());
        let mut fogged = lerp(color, self.color, f);
        fogged.a = color.a;
        fogged
    }
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            falloff: FogFalloff::Off,
            color: Rgba::opaque(192, 216, 255),
            start: 2048.0,
            end: 8192.0,
            density: 0.0005,
            max_opacity: 1.0,
            origin: Vec3::ZERO,
        }
    }
}
