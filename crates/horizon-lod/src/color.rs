//! Color arithmetic used when resolving the final color of a vertex.
//!
//! The full chain is material color × biome tint (applied once, when a
//! column is encoded) × directional shade × light-map texel (applied per
//! vertex by the mesh builder). Every function here is pure.

use serde::{Deserialize, Serialize};

use crate::light::LightMap;

/// An 8-bit-per-channel color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const GRAY: Rgba = Rgba::opaque(128, 128, 128);
    pub const RED: Rgba = Rgba::opaque(255, 0, 0);
    pub const ORANGE: Rgba = Rgba::opaque(255, 200, 0);
    pub const YELLOW: Rgba = Rgba::opaque(255, 255, 0);
    pub const GREEN: Rgba = Rgba::opaque(0, 255, 0);
    pub const CYAN: Rgba = Rgba::opaque(0, 255, 255);
    pub const BLUE: Rgba = Rgba::opaque(0, 0, 255);
    pub const MAGENTA: Rgba = Rgba::opaque(255, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// A fully opaque color.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Unpack from `0xRRGGBBAA`.
    pub const fn from_u32(packed: u32) -> Self {
        Self::new(
            (packed >> 24) as u8,
            (packed >> 16) as u8,
            (packed >> 8) as u8,
            packed as u8,
        )
    }

    /// Pack as `0xRRGGBBAA`.
    pub const fn to_u32(self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8) | self.a as u32
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Directional shading applied to a face color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shade {
    /// Signed offset added to each RGB channel.
    Add(i32),
    /// Factor multiplied into each RGB channel.
    Mul(f32),
}

impl Shade {
    pub fn apply(self, color: Rgba) -> Rgba {
        match self {
            Shade::Add(offset) => apply_shade_add(color, offset),
            Shade::Mul(factor) => apply_shade_mul(color, factor),
        }
    }
}

// --- Channel operations ---

/// Per-channel product, `a * b / 255`. Alpha is multiplied too.
pub fn multiply(a: Rgba, b: Rgba) -> Rgba {
    let mul = |x: u8, y: u8| ((x as u16 * y as u16) / 255) as u8;
    Rgba::new(mul(a.r, b.r), mul(a.g, b.g), mul(a.b, b.b), mul(a.a, b.a))
}

/// Tint a material color by a biome color.
pub fn tint(material: Rgba, biome_tint: Rgba) -> Rgba {
    multiply(material, biome_tint)
}

/// Add `shade` to each RGB channel, clamping to `[0, 255]`.
pub fn apply_shade_add(color: Rgba, shade: i32) -> Rgba {
    let add = |c: u8| (c as i32 + shade).clamp(0, 255) as u8;
    Rgba::new(add(color.r), add(color.g), add(color.b), color.a)
}

/// Multiply each RGB channel by `shade`, clamping to `[0, 255]`.
pub fn apply_shade_mul(color: Rgba, shade: f32) -> Rgba {
    let mul = |c: u8| (c as f32 * shade).round().clamp(0.0, 255.0) as u8;
    Rgba::new(mul(color.r), mul(color.g), mul(color.b), color.a)
}

/// Modulate a color by the light-map texel for the given light levels.
pub fn apply_light(color: Rgba, light_sky: u8, light_block: u8, lightmap: &LightMap) -> Rgba {
    let texel = lightmap.lookup(light_sky, light_block);
    let lit = multiply(color, texel);
    Rgba { a: color.a, ..lit }
}

/// Linear interpolation, `t = 0` gives `from`, `t = 1` gives `to`.
pub fn lerp(from: Rgba, to: Rgba, t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Rgba::new(
        mix(from.r, to.r),
        mix(from.g, to.g),
        mix(from.b, to.b),
        mix(from.a, to.a),
    )
}

/// Scale saturation and brightness in HSV space. Used to keep far terrain
/// from looking washed out next to full-detail terrain.
pub fn adjust_saturation_brightness(color: Rgba, saturation: f32, brightness: f32) -> Rgba {
    let (h, s, v) = rgb_to_hsv(color);
    let (r, g, b) = hsv_to_rgb(
        h,
        (s * saturation).clamp(0.0, 1.0),
        (v * brightness).clamp(0.0, 1.0),
    );
    Rgba::new(r, g, b, color.a)
}

/// Full per-vertex resolution: shade, then light.
///
/// `base` is the already-tinted color stored in the data point. Passing no
/// light map skips lighting, which is what callers that bake light
/// elsewhere want.
pub fn resolve_vertex_color(
    base: Rgba,
    shade: Shade,
    light_sky: u8,
    light_block: u8,
    lightmap: Option<&LightMap>,
) -> Rgba {
    let shaded = shade.apply(base);
    match lightmap {
        Some(map) => apply_light(shaded, light_sky, light_block, map),
        None => shaded,
    }
}

/// Palette used by the detail-level debug view, finest level first.
pub const DETAIL_PALETTE: [Rgba; 10] = [
    Rgba::RED,
    Rgba::ORANGE,
    Rgba::YELLOW,
    Rgba::GREEN,
    Rgba::CYAN,
    Rgba::BLUE,
    Rgba::MAGENTA,
    Rgba::WHITE,
    Rgba::GRAY,
    Rgba::BLACK,
];

/// Debug color for a detail level. Levels past the palette are black.
pub fn detail_level_color(detail_level: u8) -> Rgba {
    DETAIL_PALETTE
        .get(detail_level as usize)
        .copied()
        .unwrap_or(Rgba::BLACK)
}

// --- HSV helpers ---

fn rgb_to_hsv(color: Rgba) -> (f32, f32, f32) {
    let r = color.r as f32 / 255.0;
    let g = color.g as f32 / 255.0;
    let b = color.b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_u8 = |f: f32| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_u8(r), to_u8(g), to_u8(b))
}
