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

//! Reprojection of the previous frame's downsampled depth into the current view.

use deferra_core::math::{DepthConvention, Mat4, Vec2, Vec4, EPSILON};

/// Downsampled depth read back from an earlier frame, with the camera it was rendered from.
#[derive(Debug, Clone, Copy)]
pub struct DepthHistory<'a> {
    /// Device depth, row-major, `width * height` texels.
    pub depth: &'a [f32],
    /// Texels per row.
    pub width: u32,
    /// Rows.
    pub height: u32,
    /// Unjittered view-projection of the frame that produced `depth`.
    pub view_proj: Mat4,
}

/// A low-resolution device-depth buffer expressed in the current frame's view.
///
/// Texels nothing reprojected onto keep the far value, so they can never
/// hide an object.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectedDepthBuffer {
    width: u32,
    height: u32,
    convention: DepthConvention,
    depth: Vec<f32>,
}

impl ReprojectedDepthBuffer {
    /// A buffer where every texel is at the far plane.
    pub fn cleared(width: u32, height: u32, convention: DepthConvention) -> Self {
        Self {
            width,
            height,
            convention,
            depth: vec![convention.far_value(); (width as usize) * (height as usize)],
        }
    }

    /// Wraps depths that are already in the current view.
    ///
    /// Returns `None` when `depth` does not hold exactly `width * height` texels.
    pub fn from_depths(width: u32, height: u32, convention: DepthConvention, depth: Vec<f32>) -> Option<Self> {
        (depth.len() == (width as usize) * (height as usize)).then_some(Self {
            width,
            height,
            convention,
            depth,
        })
    }

    /// Scatters every history texel into the current view.
    ///
    /// Each texel center is unprojected with the inverse of the history's
    /// view-projection and projected again with `view_proj`. Samples whose
    /// current view-space depth falls outside `depth_range` are dropped, as are
    /// far-plane samples. When several samples land on one texel the farther
    /// one is kept.
    pub fn reproject(
        history: &DepthHistory<'_>,
        view_proj: &Mat4,
        convention: DepthConvention,
        depth_range: (f32, f32),
    ) -> Self {
        let mut out = Self::cleared(history.width, history.height, convention);
        let expected = (history.width as usize) * (history.height as usize);
        if history.depth.len() < expected {
            log::warn!(
                "Depth history holds {} texels, expected {expected}; skipping reprojection",
                history.depth.len()
            );
            return out;
        }

        let inv_prev = history.view_proj.inverse();
        let size = Vec2::new(history.width as f32, history.height as f32);
        let (near, far) = depth_range;
        let mut written = vec![false; expected];

        for y in 0..history.height {
            for x in 0..history.width {
                let d = history.depth[(y * history.width + x) as usize];
                if d == convention.far_value() || !d.is_finite() {
                    continue;
                }
                let ndc = texel_center_to_ndc(x, y, size);
                let world = inv_prev * Vec4::new(ndc.x, ndc.y, d, 1.0);
                if world.w.abs() <= f32::EPSILON {
                    continue;
                }
                // Clip w of a perspective projection is the view-space depth.
                let current = *view_proj * (world / world.w);
                if current.w <= EPSILON || current.w < near || current.w > far {
                    continue;
                }
                let ndc_now = current.truncate() / current.w;
                let Some((tx, ty)) = ndc_to_texel(Vec2::new(ndc_now.x, ndc_now.y), size) else {
                    continue;
                };
                let index = (ty * history.width + tx) as usize;
                if written[index] {
                    out.depth[index] = convention.farther(out.depth[index], ndc_now.z);
                } else {
                    out.depth[index] = ndc_now.z;
                    written[index] = true;
                }
            }
        }
        out
    }

    /// Texels per row.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The depth convention of the stored values.
    pub fn convention(&self) -> DepthConvention {
        self.convention
    }

    /// Depth at texel `(x, y)`.
    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[(y * self.width + x) as usize]
    }

    /// Every texel, row-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.depth
    }
}

/// Reinterprets a readback byte stream as `f32` texels.
pub fn depth_from_readback(bytes: &[u8]) -> Vec<f32> {
    bytemuck::pod_collect_to_vec(&bytes[..bytes.len() - bytes.len() % 4])
}

/// NDC position of a texel center. Row 0 is the top of the screen.
pub(crate) fn texel_center_to_ndc(x: u32, y: u32, size: Vec2) -> Vec2 {
    let u = (x as f32 + 0.5) / size.x;
    let v = (y as f32 + 0.5) / size.y;
    Vec2::new(u * 2.0 - 1.0, 1.0 - v * 2.0)
}

/// Continuous texel coordinates of an NDC position.
pub(crate) fn ndc_to_pixel(ndc: Vec2, size: Vec2) -> Vec2 {
    Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y)
}

fn ndc_to_texel(ndc: Vec2, size: Vec2) -> Option<(u32, u32)> {
    let p = ndc_to_pixel(ndc, size);
    if p.x < 0.0 || p.y < 0.0 || p.x >= size.x || p.y >= size.y {
        return None;
    }
    Some((p.x as u32, p.y as u32))
}
