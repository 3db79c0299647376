//! Triangle-list vertex buffer produced by a mesh build.

use glam::Vec3;
use horizon_lod::SpatialKey;

use crate::vertex::LodVertex;

/// Non-indexed triangle list for one region at one detail level.
///
/// Every three consecutive vertices form a counter-clockwise triangle seen
/// from outside the terrain.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexBuffer {
    pub key: SpatialKey,
    pub vertices: Vec<LodVertex>,
    /// Set when the build ran in wireframe debug mode. The renderer swaps
    /// to a line-polygon pipeline for these buffers.
    pub wireframe: bool,
}

impl VertexBuffer {
    pub fn new(key: SpatialKey) -> Self {
        Self {
            key,
            vertices: Vec::new(),
            wireframe: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Push one triangle. Triangles with a collapsed edge are dropped.
    pub fn push_triangle(&mut self, tri: [LodVertex; 3]) {
        let [a, b, c] = tri.map(|v| v.position());
        if a == b || b == c || c == a {
            return;
        }
        self.vertices.extend_from_slice(&tri);
    }

    /// Push a quad given in counter-clockwise order as the triangles
    /// `(0, 1, 2)` and `(0, 2, 3)`.
    pub fn push_quad(&mut self, quad: [LodVertex; 4]) {
        self.push_triangle([quad[0], quad[1], quad[2]]);
        self.push_triangle([quad[0], quad[2], quad[3]]);
    }

    /// Raw bytes for upload with `LOD_VERTEX_LAYOUT`.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Triangle positions, mostly for tests and tooling.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.vertices
            .chunks_exact(3)
            .map(|t| [t[0].position(), t[1].position(), t[2].position()])
    }
}
