//! Compact packed representation of one LOD column.
//!
//! A [`LodDataPoint`] summarises a vertical column of terrain in a single
//! `u64`. Bit layout, least significant bit first:
//!
//! | Bits  | Field                                   |
//! |-------|-----------------------------------------|
//! | 0-2   | generation mode (0 = empty)             |
//! | 3     | void                                    |
//! | 4-5   | point flags                             |
//! | 6-9   | sky light                               |
//! | 10-13 | block light                             |
//! | 14-22 | bottom height, offset by [`MIN_HEIGHT`] |
//! | 23-31 | top height, offset by [`MIN_HEIGHT`]    |
//! | 32-63 | color, `0xRRGGBBAA`                     |

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::color::{self, Rgba};
use crate::generation_mode::GenerationMode;
use crate::light::MAX_LIGHT;

/// Lowest representable height.
pub const MIN_HEIGHT: i32 = -64;
/// Highest representable height.
pub const MAX_HEIGHT: i32 = MIN_HEIGHT + HEIGHT_MASK as i32;

const MODE_MASK: u64 = 0b111;
const VOID_SHIFT: u32 = 3;
const FLAGS_SHIFT: u32 = 4;
const FLAGS_MASK: u64 = 0b11;
const SKY_SHIFT: u32 = 6;
const BLOCK_SHIFT: u32 = 10;
const LIGHT_MASK: u64 = 0xF;
const BOTTOM_SHIFT: u32 = 14;
const TOP_SHIFT: u32 = 23;
const HEIGHT_MASK: u64 = 0x1FF;
const COLOR_SHIFT: u32 = 32;

/// Sampling options recorded on every point they were applied to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointFlags(u8);

impl PointFlags {
    pub const NONE: PointFlags = PointFlags(0);
    /// Non-full blocks (slabs, flowers) were ignored when finding the surface.
    pub const AVOID_NON_FULL: PointFlags = PointFlags(0b01);
    /// Blocks without collision (tall grass) were ignored.
    pub const AVOID_NO_COLLISION: PointFlags = PointFlags(0b10);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits_truncate(bits: u8) -> Self {
        PointFlags(bits & FLAGS_MASK as u8)
    }

    pub const fn contains(self, other: PointFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PointFlags {
    type Output = PointFlags;

    fn bitor(self, rhs: Self) -> Self {
        PointFlags(self.0 | rhs.0)
    }
}

/// One column as delivered by a column sampler, before packing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawColumn {
    /// Y of the top surface.
    pub height_top: i32,
    /// Y where the solid part of the column starts.
    pub height_bottom: i32,
    /// Untinted color of the surface material.
    pub material: Rgba,
    /// Biome tint, [`Rgba::WHITE`] when the material is not tinted.
    pub tint: Rgba,
    pub light_block: u8,
    pub light_sky: u8,
    /// The column holds no solid terrain at all.
    pub void: bool,
}

impl RawColumn {
    /// A solid, untinted column lit by full sky light.
    pub fn solid(height_top: i32, height_bottom: i32, material: Rgba) -> Self {
        Self {
            height_top,
            height_bottom,
            material,
            tint: Rgba::WHITE,
            light_block: 0,
            light_sky: MAX_LIGHT,
            void: false,
        }
    }

    /// A column with nothing in it.
    pub fn void() -> Self {
        Self {
            height_top: MIN_HEIGHT,
            height_bottom: MIN_HEIGHT,
            material: Rgba::TRANSPARENT,
            tint: Rgba::WHITE,
            light_block: 0,
            light_sky: MAX_LIGHT,
            void: true,
        }
    }
}

/// Unpacked view of a point's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedPoint {
    pub height_top: i32,
    pub height_bottom: i32,
    pub color: Rgba,
    pub light_block: u8,
    pub light_sky: u8,
}

/// A packed LOD column. See the module docs for the layout.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LodDataPoint(u64);

impl LodDataPoint {
    /// A point that was never generated.
    pub const EMPTY: LodDataPoint = LodDataPoint(0);

    /// Pack a solid point. Heights are clamped into
    /// `[MIN_HEIGHT, MAX_HEIGHT]`, an inverted pair is fixed by raising the
    /// top to the bottom, and light levels are capped at 15.
    pub fn new(
        height_top: i32,
        height_bottom: i32,
        color: Rgba,
        light_block: u8,
        light_sky: u8,
        mode: GenerationMode,
        flags: PointFlags,
    ) -> Self {
        let bottom = height_bottom.clamp(MIN_HEIGHT, MAX_HEIGHT);
        let top = height_top.clamp(MIN_HEIGHT, MAX_HEIGHT).max(bottom);

        let mut bits = mode.bits() as u64 & MODE_MASK;
        bits |= (flags.bits() as u64 & FLAGS_MASK) << FLAGS_SHIFT;
        bits |= (light_sky.min(MAX_LIGHT) as u64) << SKY_SHIFT;
        bits |= (light_block.min(MAX_LIGHT) as u64) << BLOCK_SHIFT;
        bits |= ((bottom - MIN_HEIGHT) as u64 & HEIGHT_MASK) << BOTTOM_SHIFT;
        bits |= ((top - MIN_HEIGHT) as u64 & HEIGHT_MASK) << TOP_SHIFT;
        bits |= (color.to_u32() as u64) << COLOR_SHIFT;
        LodDataPoint(bits)
    }

    /// A generated column with no solid terrain.
    pub fn void(mode: GenerationMode, light_sky: u8) -> Self {
        let mut bits = mode.bits() as u64 & MODE_MASK;
        bits |= 1 << VOID_SHIFT;
        bits |= (light_sky.min(MAX_LIGHT) as u64) << SKY_SHIFT;
        LodDataPoint(bits)
    }

    pub const fn from_raw(bits: u64) -> Self {
        LodDataPoint(bits)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn mode(self) -> GenerationMode {
        GenerationMode::from_bits((self.0 & MODE_MASK) as u8)
    }

    /// Never generated.
    pub fn is_empty(self) -> bool {
        self.mode() == GenerationMode::None
    }

    /// Generated, but nothing solid is there.
    pub fn is_void(self) -> bool {
        !self.is_empty() && (self.0 >> VOID_SHIFT) & 1 == 1
    }

    /// Generated and solid.
    pub fn is_solid(self) -> bool {
        !self.is_empty() && !self.is_void()
    }

    pub fn flags(self) -> PointFlags {
        PointFlags::from_bits_truncate(((self.0 >> FLAGS_SHIFT) & FLAGS_MASK) as u8)
    }

    pub fn light_sky(self) -> u8 {
        ((self.0 >> SKY_SHIFT) & LIGHT_MASK) as u8
    }

    pub fn light_block(self) -> u8 {
        ((self.0 >> BLOCK_SHIFT) & LIGHT_MASK) as u8
    }

    pub fn height_bottom(self) -> i32 {
        ((self.0 >> BOTTOM_SHIFT) & HEIGHT_MASK) as i32 + MIN_HEIGHT
    }

    pub fn height_top(self) -> i32 {
        ((self.0 >> TOP_SHIFT) & HEIGHT_MASK) as i32 + MIN_HEIGHT
    }

    pub fn color(self) -> Rgba {
        Rgba::from_u32((self.0 >> COLOR_SHIFT) as u32)
    }

    /// Vertical span to draw, `(bottom, top)`. A point whose top equals its
    /// bottom is a single-layer surface and is drawn one block thick.
    pub fn render_extent(self) -> (i32, i32) {
        let bottom = self.height_bottom();
        (bottom, self.height_top().max(bottom + 1))
    }

    /// Same point tagged with a different generation mode.
    pub fn with_mode(self, mode: GenerationMode) -> Self {
        LodDataPoint((self.0 & !MODE_MASK) | (mode.bits() as u64 & MODE_MASK))
    }

    /// `true` if everything except the generation mode matches.
    pub fn same_payload(self, other: LodDataPoint) -> bool {
        self.0 & !MODE_MASK == other.0 & !MODE_MASK
    }
}

impl fmt::Debug for LodDataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "LodDataPoint(empty)");
        }
        if self.is_void() {
            return write!(f, "LodDataPoint(void, {:?})", self.mode());
        }
        f.debug_struct("LodDataPoint")
            .field("top", &self.height_top())
            .field("bottom", &self.height_bottom())
            .field("color", &self.color())
            .field("sky", &self.light_sky())
            .field("block", &self.light_block())
            .field("mode", &self.mode())
            .field("flags", &self.flags())
            .finish()
    }
}

// --- Encode / decode ---

/// Pack a sampled column. The biome tint is folded into the stored color
/// here; shade and light are applied later, per vertex.
pub fn encode(column: &RawColumn, mode: GenerationMode, flags: PointFlags) -> LodDataPoint {
    if column.void {
        return LodDataPoint::void(mode, column.light_sky);
    }
    LodDataPoint::new(
        column.height_top,
        column.height_bottom,
        color::tint(column.material, column.tint),
        column.light_block,
        column.light_sky,
        mode,
        flags,
    )
}

pub fn decode(point: LodDataPoint) -> DecodedPoint {
    DecodedPoint {
        height_top: point.height_top(),
        height_bottom: point.height_bottom(),
        color: point.color(),
        light_block: point.light_block(),
        light_sky: point.light_sky(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(top: i32, bottom: i32) -> RawColumn {
        RawColumn {
            light_block: 7,
            light_sky: 12,
            ..RawColumn::solid(top, bottom, Rgba::new(10, 20, 30, 255))
        }
    }

    #[test]
    fn test_empty_point() {
        let p = LodDataPoint::EMPTY;
        assert!(p.is_empty());
        assert!(!p.is_void());
        assert!(!p.is_solid());
        assert_eq!(p.mode(), GenerationMode::None);
    }

    #[test]
    fn test_decode_encode_in_range() {
        let raw = column(100, -20);
        let decoded = decode(encode(&raw, GenerationMode::Surface, PointFlags::NONE));
        assert_eq!(decoded.height_top, 100);
        assert_eq!(decoded.height_bottom, -20);
        assert_eq!(decoded.color, raw.material);
        assert_eq!(decoded.light_block, 7);
        assert_eq!(decoded.light_sky, 12);
    }

    #[test]
    fn test_out_of_range_heights_clamp() {
        let p = encode(&column(9000, -9000), GenerationMode::Full, PointFlags::NONE);
        assert_eq!(p.height_top(), MAX_HEIGHT);
        assert_eq!(p.height_bottom(), MIN_HEIGHT);
    }

    #[test]
    fn test_inverted_heights_are_fixed() {
        let p = encode(&column(10, 40), GenerationMode::Full, PointFlags::NONE);
        assert_eq!(p.height_bottom(), 40);
        assert_eq!(p.height_top(), 40);
        assert!(p.height_top() >= p.height_bottom());
    }

    #[test]
    fn test_encode_is_idempotent() {
        let flags = PointFlags::AVOID_NON_FULL | PointFlags::AVOID_NO_COLLISION;
        for (top, bottom) in [(0, 0), (447, -64), (600, 500), (-100, -200), (63, 64)] {
            let first = encode(&column(top, bottom), GenerationMode::Features, flags);
            let d = decode(first);
            let again = RawColumn {
                light_block: d.light_block,
                light_sky: d.light_sky,
                ..RawColumn::solid(d.height_top, d.height_bottom, d.color)
            };
            let second = encode(&again, first.mode(), first.flags());
            assert_eq!(first, second, "re-encoding ({top}, {bottom}) changed the point");
        }
    }

    #[test]
    fn test_light_is_capped() {
        let raw = RawColumn {
            light_block: 99,
            light_sky: 16,
            ..column(0, 0)
        };
        let p = encode(&raw, GenerationMode::Surface, PointFlags::NONE);
        assert_eq!(p.light_block(), 15);
        assert_eq!(p.light_sky(), 15);
    }

    #[test]
    fn test_tint_is_folded_into_color() {
        let raw = RawColumn {
            tint: Rgba::new(255, 0, 255, 255),
            ..RawColumn::solid(5, 0, Rgba::opaque(100, 100, 100))
        };
        let p = encode(&raw, GenerationMode::Surface, PointFlags::NONE);
        assert_eq!(p.color(), Rgba::opaque(100, 0, 100));
    }

    #[test]
    fn test_void_column() {
        let p = encode(&RawColumn::void(), GenerationMode::Surface, PointFlags::NONE);
        assert!(p.is_void());
        assert!(!p.is_solid());
        assert_eq!(p.mode(), GenerationMode::Surface);
    }

    #[test]
    fn test_flat_surface_is_solid_and_one_block_thick() {
        let p = encode(&column(64, 64), GenerationMode::Surface, PointFlags::NONE);
        assert!(p.is_solid());
        assert_eq!(p.render_extent(), (64, 65));
    }

    #[test]
    fn test_flags_survive_packing() {
        let p = encode(&column(1, 0), GenerationMode::Surface, PointFlags::AVOID_NO_COLLISION);
        assert!(p.flags().contains(PointFlags::AVOID_NO_COLLISION));
        assert!(!p.flags().contains(PointFlags::AVOID_NON_FULL));
    }

    #[test]
    fn test_with_mode_keeps_payload() {
        let p = encode(&column(30, 2), GenerationMode::Surface, PointFlags::NONE);
        let q = p.with_mode(GenerationMode::Full);
        assert_eq!(q.mode(), GenerationMode::Full);
        assert!(p.same_payload(q));
        assert_ne!(p, q);
    }

    #[test]
    fn test_serde_is_transparent() {
        let p = encode(&column(30, 2), GenerationMode::Surface, PointFlags::NONE);
        let text = ron::to_string(&p).unwrap();
        assert_eq!(text, p.raw().to_string());
        let back: LodDataPoint = ron::from_str(&text).unwrap();
        assert_eq!(back, p);
    }
}
