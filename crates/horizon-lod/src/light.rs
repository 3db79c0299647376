//! 16×16 light-map lookup table indexed by (sky light, block light).

use crate::color::Rgba;

/// Highest light level either channel can hold.
pub const MAX_LIGHT: u8 = 15;

const LIGHT_LEVELS: usize = MAX_LIGHT as usize + 1;

/// Color modulation for every combination of sky and block light.
///
/// Hosts usually refresh this every frame from their own light-map
/// texture. [`LightMap::default`] is a daylight curve for headless use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightMap {
    texels: [[Rgba; LIGHT_LEVELS]; LIGHT_LEVELS],
}

impl LightMap {
    /// Build a map from a function of `(sky, block)`.
    pub fn from_fn(mut f: impl FnMut(u8, u8) -> Rgba) -> Self {
        let mut texels = [[Rgba::WHITE; LIGHT_LEVELS]; LIGHT_LEVELS];
        for (sky, row) in texels.iter_mut().enumerate() {
            for (block, texel) in row.iter_mut().enumerate() {
                *texel = f(sky as u8, block as u8);
            }
        }
        Self { texels }
    }

    /// Every texel set to `color`.
    pub fn uniform(color: Rgba) -> Self {
        Self::from_fn(|_, _| color)
    }

    /// Look up a texel. Light levels above 15 are clamped.
    pub fn lookup(&self, light_sky: u8, light_block: u8) -> Rgba {
        let sky = light_sky.min(MAX_LIGHT) as usize;
        let block = light_block.min(MAX_LIGHT) as usize;
        self.texels[sky][block]
    }

    pub fn set(&mut self, light_sky: u8, light_block: u8, color: Rgba) {
        let sky = light_sky.min(MAX_LIGHT) as usize;
        let block = light_block.min(MAX_LIGHT) as usize;
        self.texels[sky][block] = color;
    }
}

impl Default for LightMap {
    fn default() -> Self {
        // Same falloff shape as a vanilla block-game light map, with a
        // small ambient floor so unlit caves are not pitch black.
        fn curve(level: u8) -> f32 {
            let f = level as f32 / MAX_LIGHT as f32;
            0.05 + 0.95 * (f / (4.0 - 3.0 * f))
        }
        Self::from_fn(|sky, block| {
            let s = curve(sky);
            let b = curve(block);
            let channel = |warmth: f32| (s.max(b * warmth) * 255.0).round() as u8;
            Rgba::opaque(channel(1.0), channel(0.88), channel(0.72))
        })
    }
}
