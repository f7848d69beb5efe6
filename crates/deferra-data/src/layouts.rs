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

//! GPU-visible constant layouts.
//!
//! Every struct here is `#[repr(C)]` and `Pod` so it can be copied byte-for-byte
//! into an upload buffer. Matrices are stored column-major.

use bytemuck::{Pod, Zeroable};
use deferra_core::math::{inverse_transpose, to_gpu_matrix, Mat4, Vec3};
use deferra_core::scene::{LightSet, MaterialAsset};
use deferra_core::RenderError;

/// Texture slots per material.
pub const MATERIAL_MAX_TEXTURE_NUM: usize = 16;
/// Scalar parameters per material.
pub const MATERIAL_MAX_SCALAR_NUM: usize = 16;
/// Vector parameters per material.
pub const MATERIAL_MAX_VECTOR_NUM: usize = 16;
/// Directional lights in the light block.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
/// Point lights in the light block.
pub const MAX_POINT_LIGHTS: usize = 256;

/// Alignment of every constant-buffer element.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Rounds `size` up to the constant-buffer alignment.
///
/// # Examples
///
/// ```
/// use deferra_data::layouts::constant_buffer_byte_size;
/// assert_eq!(constant_buffer_byte_size(1), 256);
/// assert_eq!(constant_buffer_byte_size(256), 256);
/// assert_eq!(constant_buffer_byte_size(300), 512);
/// ```
pub const fn constant_buffer_byte_size(size: u64) -> u64 {
    (size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// Per-object constants.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    /// Object-to-world.
    pub world: [[f32; 4]; 4],
    /// Object-to-world of the previous frame.
    pub prev_world: [[f32; 4]; 4],
    /// Inverse-transpose of `world`, for normals.
    pub inv_trans_world: [[f32; 4]; 4],
    /// Texture-coordinate transform.
    pub tex_transform: [[f32; 4]; 4],
}

impl ObjectConstants {
    /// Assembles the block from an object's transforms.
    pub fn new(world: &Mat4, prev_world: &Mat4, tex_transform: &Mat4) -> Self {
        Self {
            world: to_gpu_matrix(world),
            prev_world: to_gpu_matrix(prev_world),
            inv_trans_world: to_gpu_matrix(&inverse_transpose(world)),
            tex_transform: to_gpu_matrix(tex_transform),
        }
    }
}

/// Camera and frame constants shared by every pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    /// World-to-view.
    pub view: [[f32; 4]; 4],
    /// View-to-world.
    pub inv_view: [[f32; 4]; 4],
    /// View-to-clip, jittered.
    pub proj: [[f32; 4]; 4],
    /// Clip-to-view.
    pub inv_proj: [[f32; 4]; 4],
    /// World-to-clip, jittered.
    pub view_proj: [[f32; 4]; 4],
    /// World-to-clip without jitter.
    pub unjittered_view_proj: [[f32; 4]; 4],
    /// Clip-to-world.
    pub inv_view_proj: [[f32; 4]; 4],
    /// Previous frame's unjittered world-to-clip.
    pub prev_view_proj: [[f32; 4]; 4],
    /// World-to-texture-space of the screen.
    pub view_proj_tex: [[f32; 4]; 4],
    /// World-to-shadow-map texture space.
    pub shadow_transform: [[f32; 4]; 4],
    /// Eye position.
    pub eye_pos_w: [f32; 3],
    /// Padding.
    pub _pad0: f32,
    /// Render target size in pixels.
    pub render_target_size: [f32; 2],
    /// Reciprocal of `render_target_size`.
    pub inv_render_target_size: [f32; 2],
    /// Near clip distance.
    pub near_z: f32,
    /// Far clip distance.
    pub far_z: f32,
    /// Seconds since start.
    pub total_time: f32,
    /// Seconds since the last frame.
    pub delta_time: f32,
    /// Sub-pixel jitter in pixels.
    pub jitter: [f32; 2],
    /// Frames rendered so far.
    pub frame_count: u32,
    /// Padding.
    pub _pad1: u32,
    /// Ambient light.
    pub ambient_light: [f32; 4],
    /// Direction of the main directional light.
    pub main_light_direction: [f32; 4],
}

/// Constants of the sky pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SkyPassConstants {
    /// World-to-clip, jittered.
    pub view_proj: [[f32; 4]; 4],
    /// World-to-clip without jitter.
    pub unjittered_view_proj: [[f32; 4]; 4],
    /// Previous frame's world-to-clip.
    pub prev_view_proj: [[f32; 4]; 4],
    /// Eye position.
    pub eye_pos_w: [f32; 3],
    /// Padding.
    pub _pad0: f32,
    /// Previous eye position.
    pub prev_pos: [f32; 3],
    /// Padding.
    pub _pad1: f32,
}

/// One row of the material buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialData {
    /// UV transform.
    pub mat_transform: [[f32; 4]; 4],
    /// Texture indices relative to the texture pool base; `-1` when unused.
    pub texture_index: [i32; MATERIAL_MAX_TEXTURE_NUM],
    /// Scalar parameters.
    pub scalar_params: [f32; MATERIAL_MAX_SCALAR_NUM],
    /// Vector parameters.
    pub vector_params: [[f32; 4]; MATERIAL_MAX_VECTOR_NUM],
}

impl MaterialData {
    /// Serializes a material.
    ///
    /// `resolve_texture` maps a texture name to its index within the texture pool.
    ///
    /// # Errors
    ///
    /// [`RenderError::MaterialLimitExceeded`] when a parameter list is longer than
    /// the layout allows, [`RenderError::MissingTexture`] when a texture name
    /// cannot be resolved.
    pub fn from_asset(
        material: &MaterialAsset,
        resolve_texture: impl Fn(&str) -> Option<u32>,
    ) -> Result<Self, RenderError> {
        let check = |kind: &'static str, count: usize, limit: usize| {
            if count > limit {
                Err(RenderError::MaterialLimitExceeded {
                    material: material.name.clone(),
                    kind,
                    count,
                    limit,
                })
            } else {
                Ok(())
            }
        };
        check("textures", material.textures.len(), MATERIAL_MAX_TEXTURE_NUM)?;
        check("scalars", material.scalars.len(), MATERIAL_MAX_SCALAR_NUM)?;
        check("vectors", material.vectors.len(), MATERIAL_MAX_VECTOR_NUM)?;

        let mut data = Self::zeroed();
        data.mat_transform = to_gpu_matrix(&Mat4::from_scale(material.texture_scale.extend(1.0)));
        data.texture_index = [-1; MATERIAL_MAX_TEXTURE_NUM];
        for (slot, name) in data.texture_index.iter_mut().zip(&material.textures) {
            let index = resolve_texture(name)
                .ok_or_else(|| RenderError::MissingTexture(name.clone()))?;
            *slot = index as i32;
        }
        for (slot, value) in data.scalar_params.iter_mut().zip(&material.scalars) {
            *slot = *value;
        }
        for (slot, value) in data.vector_params.iter_mut().zip(&material.vectors) {
            *slot = value.to_array();
        }
        Ok(data)
    }
}

/// A directional light as laid out in the light block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DirectionalLightData {
    /// Travel direction.
    pub direction: [f32; 3],
    /// Intensity.
    pub intensity: f32,
    /// Color.
    pub color: [f32; 3],
    /// Padding.
    pub _pad: f32,
}

/// A point light as laid out in the light block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightData {
    /// Position.
    pub position: [f32; 3],
    /// Range.
    pub range: f32,
    /// Color.
    pub color: [f32; 3],
    /// Intensity.
    pub intensity: f32,
}

/// All lights of a frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightConstants {
    /// Eye position, for specular terms.
    pub camera_position: [f32; 3],
    /// Number of valid entries in `directional`.
    pub directional_count: u32,
    /// Number of valid entries in `point`.
    pub point_count: u32,
    /// Padding.
    pub _pad: [u32; 3],
    /// Directional lights.
    pub directional: [DirectionalLightData; MAX_DIRECTIONAL_LIGHTS],
    /// Point lights.
    pub point: [PointLightData; MAX_POINT_LIGHTS],
}

impl LightConstants {
    /// Packs a light set. Lights beyond the block's capacity are dropped with a warning.
    pub fn from_lights(lights: &LightSet, camera_position: Vec3) -> Self {
        if lights.directional.len() > MAX_DIRECTIONAL_LIGHTS
            || lights.point.len() > MAX_POINT_LIGHTS
        {
            log::warn!(
                "Light set truncated to {MAX_DIRECTIONAL_LIGHTS} directional / {MAX_POINT_LIGHTS} point lights"
            );
        }
        let mut block = Self::zeroed();
        block.camera_position = camera_position.to_array();
        for (slot, light) in block.directional.iter_mut().zip(&lights.directional) {
            *slot = DirectionalLightData {
                direction: light.direction.normalize_or_zero().to_array(),
                intensity: light.intensity,
                color: light.color.to_array(),
                _pad: 0.0,
            };
            block.directional_count += 1;
        }
        for (slot, light) in block.point.iter_mut().zip(&lights.point) {
            *slot = PointLightData {
                position: light.position.to_array(),
                range: light.range,
                color: light.color.to_array(),
                intensity: light.intensity,
            };
            block.point_count += 1;
        }
        block
    }
}

/// Distance-field placement of one scene object.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneObjectSdfDescriptor {
    /// Object-to-world.
    pub obj_world: [[f32; 4]; 4],
    /// World-to-object.
    pub obj_inv_world: [[f32; 4]; 4],
    /// Transpose of `obj_inv_world`.
    pub obj_inv_world_transpose: [[f32; 4]; 4],
    /// Row of the mesh's field in the distance-field region.
    pub sdf_index: i32,
    /// Padding.
    pub _pad: [i32; 3],
}

impl SceneObjectSdfDescriptor {
    /// Builds the descriptor of an object placed at `world`.
    pub fn new(world: &Mat4, sdf_index: u32) -> Self {
        let inv = world.inverse();
        Self {
            obj_world: to_gpu_matrix(world),
            obj_inv_world: to_gpu_matrix(&inv),
            obj_inv_world_transpose: to_gpu_matrix(&inv.transpose()),
            sdf_index: sdf_index as i32,
            _pad: [0; 3],
        }
    }
}

/// Parameters of one mesh's baked field.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshSdfDescriptor {
    /// Half of the covered cube side.
    pub half_extent: f32,
    /// Radius of the mesh's bounding sphere.
    pub radius: f32,
    /// Voxels per axis.
    pub resolution: i32,
    /// Padding.
    pub _pad: f32,
}
