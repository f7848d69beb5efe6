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

//! Assembly of the per-frame constant blocks from the camera and lights.

use deferra_core::math::{to_gpu_matrix, Mat4, Vec4};
use deferra_core::scene::{Camera, LightSet};
use deferra_data::layouts::{PassConstants, SkyPassConstants};

/// Frame timing fed to the shaders.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Seconds since start.
    pub total: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
}

/// Maps clip space to screen texture space, row 0 at the top.
const NDC_TO_TEXTURE: Mat4 = Mat4::from_cols(
    Vec4::new(0.5, 0.0, 0.0, 0.0),
    Vec4::new(0.0, -0.5, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
);

/// Builds the block shared by every pass.
pub fn pass_constants(
    camera: &dyn Camera,
    lights: &LightSet,
    size: (u32, u32),
    time: FrameTime,
    frame_count: u64,
) -> PassConstants {
    let view = camera.view();
    let proj = camera.proj();
    let view_proj = proj * view;
    let (near_z, far_z) = camera.near_far();
    let (width, height) = (size.0.max(1) as f32, size.1.max(1) as f32);
    let main_light = lights
        .directional
        .first()
        .map(|light| light.direction.normalize_or_zero().extend(0.0))
        .unwrap_or(Vec4::ZERO);

    PassConstants {
        view: to_gpu_matrix(&view),
        inv_view: to_gpu_matrix(&view.inverse()),
        proj: to_gpu_matrix(&proj),
        inv_proj: to_gpu_matrix(&proj.inverse()),
        view_proj: to_gpu_matrix(&view_proj),
        unjittered_view_proj: to_gpu_matrix(&camera.unjittered_view_proj()),
        inv_view_proj: to_gpu_matrix(&view_proj.inverse()),
        prev_view_proj: to_gpu_matrix(&camera.prev_view_proj()),
        view_proj_tex: to_gpu_matrix(&(NDC_TO_TEXTURE * view_proj)),
        // The sequence has no shadow-map pass; shadows come from distance fields.
        shadow_transform: to_gpu_matrix(&Mat4::IDENTITY),
        eye_pos_w: camera.position().to_array(),
        _pad0: 0.0,
        render_target_size: [width, height],
        inv_render_target_size: [1.0 / width, 1.0 / height],
        near_z,
        far_z,
        total_time: time.total,
        delta_time: time.delta,
        jitter: camera.jitter().to_array(),
        frame_count: frame_count as u32,
        _pad1: 0,
        ambient_light: lights.ambient.to_array(),
        main_light_direction: main_light.to_array(),
    }
}

/// Builds the sky pass block.
pub fn sky_constants(camera: &dyn Camera) -> SkyPassConstants {
    SkyPassConstants {
        view_proj: to_gpu_matrix(&(camera.proj() * camera.view())),
        unjittered_view_proj: to_gpu_matrix(&camera.unjittered_view_proj()),
        prev_view_proj: to_gpu_matrix(&camera.prev_view_proj()),
        eye_pos_w: camera.position().to_array(),
        _pad0: 0.0,
        prev_pos: camera.prev_position().to_array(),
        _pad1: 0.0,
    }
}
