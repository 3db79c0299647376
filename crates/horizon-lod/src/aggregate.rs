//! Reduction of a 2×2 block of child points into one parent point.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::data_point::{LodDataPoint, PointFlags};
use crate::generation_mode::GenerationMode;
use crate::light::MAX_LIGHT;

/// How a parent point picks its color and light from its children.
///
/// The vertical extent is always the union of the children; only the
/// surface attributes depend on the policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregatePolicy {
    /// Mean of all solid children.
    #[default]
    Average,
    /// Taken from the tallest solid child. Ties go to the first child.
    Dominant,
}

/// Combine child points into their parent.
///
/// * all children empty → empty
/// * parent mode = lowest mode among generated children
/// * no solid child → void
/// * otherwise top = max top, bottom = min bottom over solid children
pub fn aggregate(children: &[LodDataPoint], policy: AggregatePolicy) -> LodDataPoint {
    let mut generated = children.iter().copied().filter(|p| !p.is_empty()).peekable();
    if generated.peek().is_none() {
        return LodDataPoint::EMPTY;
    }

    let mut mode: Option<GenerationMode> = None;
    let mut solid_count = 0u32;
    let mut top = i32::MIN;
    let mut bottom = i32::MAX;
    let mut flags = PointFlags::NONE;
    let mut sums = [0u32; 4];
    let mut light_sky_sum = 0u32;
    let mut light_block_sum = 0u32;
    let mut void_sky = 0u8;
    let mut dominant: Option<LodDataPoint> = None;

    for child in generated {
        mode = Some(mode.map_or(child.mode(), |m| m.min(child.mode())));
        if child.is_void() {
            void_sky = void_sky.max(child.light_sky());
            continue;
        }

        solid_count += 1;
        top = top.max(child.height_top());
        bottom = bottom.min(child.height_bottom());
        flags = flags | child.flags();

        let c = child.color().to_array();
        for (sum, channel) in sums.iter_mut().zip(c) {
            *sum += channel as u32;
        }
        light_sky_sum += child.light_sky() as u32;
        light_block_sum += child.light_block() as u32;

        if dominant.is_none_or(|d| child.height_top() > d.height_top()) {
            dominant = Some(child);
        }
    }

    let Some(mode) = mode else {
        return LodDataPoint::EMPTY;
    };

    let Some(dominant) = dominant else {
        return LodDataPoint::void(mode, void_sky);
    };

    let (color, light_block, light_sky) = match policy {
        AggregatePolicy::Average => {
            let avg = |sum: u32| ((sum + solid_count / 2) / solid_count) as u8;
            (
                Rgba::new(avg(sums[0]), avg(sums[1]), avg(sums[2]), avg(sums[3])),
                avg(light_block_sum).min(MAX_LIGHT),
                avg(light_sky_sum).min(MAX_LIGHT),
            )
        }
        AggregatePolicy::Dominant => (
            dominant.color(),
            dominant.light_block(),
            dominant.light_sky(),
        ),
    };

    LodDataPoint::new(top, bottom, color, light_block, light_sky, mode, flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(top: i32, bottom: i32, color: Rgba, mode: GenerationMode) -> LodDataPoint {
        LodDataPoint::new(top, bottom, color, 0, 15, mode, PointFlags::NONE)
    }

    #[test]
    fn test_all_empty_is_empty() {
        let children = [LodDataPoint::EMPTY; 4];
        assert!(aggregate(&children, AggregatePolicy::Average).is_empty());
    }

    #[test]
    fn test_extent_is_union() {
        let m = GenerationMode::Surface;
        let children = [
            solid(10, 0, Rgba::WHITE, m),
            solid(50, 20, Rgba::WHITE, m),
            solid(30, -10, Rgba::WHITE, m),
            solid(5, 4, Rgba::WHITE, m),
        ];
        let parent = aggregate(&children, AggregatePolicy::Average);
        assert_eq!(parent.height_top(), 50);
        assert_eq!(parent.height_bottom(), -10);
    }

    #[test]
    fn test_disjoint_spans_collapse_into_one() {
        // A floating slab over a low floor keeps one span covering the gap.
        let m = GenerationMode::Full;
        let children = [
            solid(12, 8, Rgba::WHITE, m),
            solid(12, 8, Rgba::WHITE, m),
            solid(90, 80, Rgba::WHITE, m),
            solid(90, 80, Rgba::WHITE, m),
        ];
        let parent = aggregate(&children, AggregatePolicy::Average);
        assert!(parent.is_solid());
        assert_eq!((parent.height_bottom(), parent.height_top()), (8, 90));
    }

    #[test]
    fn test_void_children_do_not_stretch_extent() {
        let m = GenerationMode::Surface;
        let children = [
            solid(10, 8, Rgba::WHITE, m),
            LodDataPoint::void(m, 15),
            LodDataPoint::EMPTY,
            LodDataPoint::void(m, 15),
        ];
        let parent = aggregate(&children, AggregatePolicy::Average);
        assert!(parent.is_solid());
        assert_eq!(parent.height_top(), 10);
        assert_eq!(parent.height_bottom(), 8);
    }

    #[test]
    fn test_all_void_is_void() {
        let m = GenerationMode::Features;
        let parent = aggregate(&[LodDataPoint::void(m, 15); 4], AggregatePolicy::Dominant);
        assert!(parent.is_void());
        assert_eq!(parent.mode(), m);
    }

    #[test]
    fn test_mode_is_minimum_of_generated_children() {
        let children = [
            solid(1, 0, Rgba::WHITE, GenerationMode::Full),
            solid(1, 0, Rgba::WHITE, GenerationMode::Surface),
            LodDataPoint::EMPTY,
            solid(1, 0, Rgba::WHITE, GenerationMode::Features),
        ];
        let parent = aggregate(&children, AggregatePolicy::Average);
        assert_eq!(parent.mode(), GenerationMode::Surface);
    }

    #[test]
    fn test_average_color() {
        let m = GenerationMode::Surface;
        let children = [
            solid(1, 0, Rgba::opaque(0, 0, 0), m),
            solid(1, 0, Rgba::opaque(100, 200, 40), m),
        ];
        let parent = aggregate(&children, AggregatePolicy::Average);
        assert_eq!(parent.color(), Rgba::opaque(50, 100, 20));
    }

    #[test]
    fn test_dominant_takes_tallest() {
        let m = GenerationMode::Surface;
        let children = [
            solid(5, 0, Rgba::RED, m),
            solid(90, 0, Rgba::BLUE, m),
            solid(90, 0, Rgba::GREEN, m),
            solid(10, 0, Rgba::RED, m),
        ];
        let parent = aggregate(&children, AggregatePolicy::Dominant);
        assert_eq!(parent.color(), Rgba::BLUE);
    }
}
