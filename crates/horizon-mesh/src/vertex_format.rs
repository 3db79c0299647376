//! Canonical `wgpu::VertexBufferLayout` for [`LodVertex`] buffers.
//!
//! | Location | Offset | Format     | Field    |
//! |----------|--------|------------|----------|
//! | 0        | 0      | Float32x3  | position |
//! | 1        | 12     | Unorm8x4   | color    |
//! | 2        | 16     | Sint16x2   | light UV |
//! | 3        | 20     | Snorm8x4   | normal   |

use std::mem;

use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

use crate::vertex::LodVertex;

pub const LOD_VERTEX_ATTRIBUTES: [VertexAttribute; 4] = [
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    VertexAttribute {
        format: VertexFormat::Unorm8x4,
        offset: 12,
        shader_location: 1,
    },
    VertexAttribute {
        format: VertexFormat::Sint16x2,
        offset: 16,
        shader_location: 2,
    },
    // The fourth byte is padding; shaders ignore `w`.
    VertexAttribute {
        format: VertexFormat::Snorm8x4,
        offset: 20,
        shader_location: 3,
    },
];

/// Layout shared by every LOD render pipeline.
pub const LOD_VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: mem::size_of::<LodVertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &LOD_VERTEX_ATTRIBUTES,
};

static_assertions::assert_eq_size!(LodVertex, [u8; 24]);
static_assertions::const_assert_eq!(
    LOD_VERTEX_ATTRIBUTES[1].offset,
    mem::offset_of!(LodVertex, color) as u64
);
static_assertions::const_assert_eq!(
    LOD_VERTEX_ATTRIBUTES[2].offset,
    mem::offset_of!(LodVertex, light_uv) as u64
);
static_assertions::const_assert_eq!(
    LOD_VERTEX_ATTRIBUTES[3].offset,
    mem::offset_of!(LodVertex, normal) as u64
);
