// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Renderer configuration, loadable from RON.

use super::error::RenderError;
use crate::math::DepthConvention;
use serde::{Deserialize, Serialize};

/// Number of frames the CPU may record ahead of the GPU.
pub const DEFAULT_FRAME_RESOURCE_COUNT: usize = 3;

/// How lights are binned in screen space. Fixed for a renderer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LightBinning {
    /// 2D screen tiles.
    Tiled,
    /// 3D clusters: screen tiles further split into depth slices.
    #[default]
    Clustered,
}

/// Which occlusion test runs after the frustum pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcclusionMode {
    /// Only frustum culling.
    Disabled,
    /// Tests every covered texel of the reprojected depth buffer.
    #[default]
    Dense,
    /// Tests a coarse tile mask built from the reprojected depth buffer.
    Masked,
}

/// Renderer construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frame slots in the resource ring.
    pub frame_resource_count: usize,
    /// Initial surface width in pixels.
    pub width: u32,
    /// Initial surface height in pixels.
    pub height: u32,
    /// Whether depth is stored reversed (near = 1, far = 0).
    pub reverse_z: bool,
    /// Light binning mode.
    pub light_binning: LightBinning,
    /// Occlusion test strategy.
    pub occlusion: OcclusionMode,
    /// Width of the downsampled depth buffer read back for occlusion.
    pub depth_readback_width: u32,
    /// Height of the downsampled depth buffer read back for occlusion.
    pub depth_readback_height: u32,
    /// View-space depth range covered by the occlusion buffer.
    pub occlusion_depth_range: (f32, f32),
    /// Capacity of the dynamic texture pool.
    pub max_texture_count: u32,
    /// Maximum number of scene objects with constants.
    pub max_scene_objects: u32,
    /// Maximum number of materials.
    pub max_materials: u32,
    /// Maximum number of meshes with a baked distance field.
    pub max_meshes: u32,
    /// Number of pre-filtered environment mip levels.
    pub prefilter_levels: u32,
    /// Voxels per axis of baked mesh distance fields.
    pub sdf_resolution: u32,
    /// Rays cast per voxel when baking distance fields.
    pub sdf_ray_count: u32,
    /// Smallest chunk of objects handed to a culling worker.
    pub min_cull_chunk: usize,
    /// Worker thread count; `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frame_resource_count: DEFAULT_FRAME_RESOURCE_COUNT,
            width: 1280,
            height: 720,
            reverse_z: true,
            light_binning: LightBinning::Clustered,
            occlusion: OcclusionMode::Dense,
            depth_readback_width: 256,
            depth_readback_height: 128,
            occlusion_depth_range: (1.0, 50_000.0),
            max_texture_count: 1024,
            max_scene_objects: 4096,
            max_materials: 512,
            max_meshes: 256,
            prefilter_levels: 5,
            sdf_resolution: 64,
            sdf_ray_count: 128,
            min_cull_chunk: 100,
            worker_threads: None,
        }
    }
}

impl RendererConfig {
    /// Parses a configuration from RON. Missing fields take their defaults.
    pub fn from_ron_str(source: &str) -> Result<Self, RenderError> {
        let config: Self =
            ron::from_str(source).map_err(|e| RenderError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The depth convention implied by `reverse_z`.
    pub fn depth_convention(&self) -> DepthConvention {
        DepthConvention::from_reverse_z(self.reverse_z)
    }

    /// Rejects configurations the renderer cannot be built from.
    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = |msg: &str| Err(RenderError::InvalidConfig(msg.to_string()));
        if self.frame_resource_count == 0 {
            return invalid("frame_resource_count must be at least 1");
        }
        if self.width == 0 || self.height == 0 {
            return invalid("surface size must be non-zero");
        }
        if self.depth_readback_width == 0 || self.depth_readback_height == 0 {
            return invalid("depth readback size must be non-zero");
        }
        let (near, far) = self.occlusion_depth_range;
        if !(near > 0.0 && far > near) {
            return invalid("occlusion_depth_range must satisfy 0 < near < far");
        }
        if self.max_scene_objects == 0 || self.max_materials == 0 {
            return invalid("object and material capacities must be non-zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_resource_count, 3);
        assert_eq!(config.depth_convention(), DepthConvention::Reversed);
    }

    #[test]
    fn ron_overrides_only_named_fields() {
        let config = RendererConfig::from_ron_str(
            "(width: 640, height: 480, light_binning: Tiled, occlusion: Masked)",
        )
        .unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.light_binning, LightBinning::Tiled);
        assert_eq!(config.occlusion, OcclusionMode::Masked);
        assert_eq!(config.max_texture_count, 1024);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = RendererConfig::from_ron_str("(frame_resource_count: 0)").unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
        assert!(RendererConfig::from_ron_str("(width: ").is_err());
    }
}
