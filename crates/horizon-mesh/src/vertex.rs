//! GPU vertex for LOD meshes.

use glam::Vec3;
use horizon_lod::{MAX_LIGHT, Rgba};

/// One LOD mesh vertex, 24 bytes.
///
/// Layout:
///   - `[0..12]`  position `[f32; 3]`, region-local blocks
///   - `[12..16]` color `[u8; 4]`, RGBA with shade, light and fog applied
///   - `[16..20]` light-map UV `[i16; 2]`, block then sky, texel centers
///   - `[20..23]` normal `[i8; 3]`
///   - `[23]`     padding
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LodVertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub light_uv: [i16; 2],
    pub normal: [i8; 3],
    pub _pad: i8,
}

static_assertions::assert_eq_size!(LodVertex, [u8; 24]);

impl LodVertex {
    pub fn new(position: Vec3, color: Rgba, light_block: u8, light_sky: u8, normal: [i8; 3]) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
            light_uv: light_uv(light_block, light_sky),
            normal,
            _pad: 0,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn color(&self) -> Rgba {
        let [r, g, b, a] = self.color;
        Rgba::new(r, g, b, a)
    }
}

/// Light-map texture coordinate for a light pair, pointing at the center
/// of the texel in a 256×256 light-map texture.
pub fn light_uv(light_block: u8, light_sky: u8) -> [i16; 2] {
    let texel = |level: u8| level.min(MAX_LIGHT) as i16 * 16 + 8;
    [texel(light_block), texel(light_sky)]
}
