//! Entry point for turning a region's detail level into triangles.

use horizon_lod::{LodRegion, Neighbors, SpatialKey};

use crate::buffer::VertexBuffer;
use crate::context::MeshContext;
use crate::cubic::CubicStrategy;
use crate::fog::FogConfig;
use crate::settings::{DebugMode, MeshSettings, StrategyKind};
use crate::smooth::SmoothStrategy;

/// A way of emitting geometry for one region.
///
/// Strategies are stateless; all inputs arrive through the context so a
/// single instance can serve many worker threads.
pub trait MeshStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn emit(&self, ctx: &MeshContext<'_>, out: &mut VertexBuffer);
}

/// Builds vertex buffers with a fixed strategy and settings.
pub struct MeshBuilder {
    strategy: Box<dyn MeshStrategy>,
    settings: MeshSettings,
}

impl MeshBuilder {
    pub fn new(kind: StrategyKind, settings: MeshSettings) -> Self {
        let strategy: Box<dyn MeshStrategy> = match kind {
            StrategyKind::Cubic => Box::new(CubicStrategy),
            StrategyKind::Triangular => Box::new(SmoothStrategy::triangular()),
            StrategyKind::Dynamic => Box::new(SmoothStrategy::dynamic(settings.dynamic_threshold)),
        };
        Self { strategy, settings }
    }

    pub fn with_strategy(strategy: Box<dyn MeshStrategy>, settings: MeshSettings) -> Self {
        Self { strategy, settings }
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    /// Mesh `region` at `detail_level`.
    ///
    /// Neighbours at a different level, or missing ones, are treated as
    /// open, so their edge gets a full wall. Pure: callable from any
    /// number of threads at once.
    pub fn build(
        &self,
        region: &LodRegion,
        neighbors: &Neighbors,
        detail_level: u8,
        fog: &FogConfig,
        debug: DebugMode,
    ) -> VertexBuffer {
        let key = SpatialKey::new(region.pos(), detail_level);
        let mut out = VertexBuffer::new(key);
        out.wireframe = debug.wireframe();

        if !region.has_data(detail_level) {
            tracing::trace!(region = ?region.pos(), detail_level, "nothing to mesh");
            return out;
        }

        let ctx = MeshContext::new(region, neighbors, detail_level, &self.settings, fog, debug);
        self.strategy.emit(&ctx, &mut out);

        tracing::trace!(
            region = ?region.pos(),
            detail_level,
            strategy = ?self.strategy.kind(),
            triangles = out.triangle_count(),
            "built LOD mesh"
        );
        out
    }
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new(StrategyKind::Cubic, MeshSettings::default())
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
