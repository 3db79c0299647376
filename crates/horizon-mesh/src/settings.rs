//! Knobs that shape a mesh build.

use horizon_lod::LightMap;
use serde::{Deserialize, Serialize};

/// Which meshing strategy a [`crate::MeshBuilder`] uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Axis-aligned boxes.
    #[default]
    Cubic,
    /// Smoothed tops with corners shared between neighbours.
    Triangular,
    /// Smooth where slopes are gentle, stepped where they are steep.
    Dynamic,
}

/// Debug visualisation of the detail levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebugMode {
    #[default]
    Off,
    /// Color by detail level.
    ShowDetail,
    /// Color by detail level and draw as wireframe.
    ShowDetailWireframe,
}

impl DebugMode {
    pub fn shows_detail(self) -> bool {
        self != DebugMode::Off
    }

    pub fn wireframe(self) -> bool {
        self == DebugMode::ShowDetailWireframe
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshSettings {
    pub lightmap: LightMap,
    /// Multiply colors by the light map at build time. When off the shader
    /// samples the light map using each vertex's light UV.
    pub bake_light: bool,
    /// Merge runs of identical top faces along X in the cubic strategy.
    /// On by default; turn off to get one top quad per point.
    pub merge_top_faces: bool,
    /// Height step in blocks above which the dynamic strategy keeps a hard
    /// edge.
    pub dynamic_threshold: i32,
    pub saturation: f32,
    pub brightness: f32,
}

impl MeshSettings {
    pub(crate) fn adjusts_color(&self) -> bool {
        self.saturation != 1.0 || self.brightness != 1.0
    }
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            lightmap: LightMap::default(),
            bake_light: true,
            merge_top_faces: true,
            dynamic_threshold: 8,
            saturation: 1.0,
            brightness: 1.0,
        }
    }
}
