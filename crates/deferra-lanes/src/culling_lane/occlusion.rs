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

//! Software occlusion tests against a [`ReprojectedDepthBuffer`].
//!
//! # Strategies
//!
//! Both strategies answer the same question: is every texel covered by the
//! object's screen rectangle nearer than the object's nearest point?
//!
//! - [`DenseOcclusion`] walks every covered texel.
//! - [`MaskedOcclusion`] walks 8x8 tiles holding the farthest depth of their
//!   texels. It is cheaper and strictly more conservative.

use super::reprojection::{ndc_to_pixel, ReprojectedDepthBuffer};
use deferra_core::math::{Aabb, DepthConvention, Mat4, Vec2, Vec4, EPSILON};
use std::fmt::Debug;

/// Screen footprint of a projected box, in occlusion-buffer texels (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    /// Leftmost covered column.
    pub min_x: u32,
    /// Topmost covered row.
    pub min_y: u32,
    /// Rightmost covered column.
    pub max_x: u32,
    /// Bottom covered row.
    pub max_y: u32,
    /// Device depth of the box's nearest corner.
    pub nearest_depth: f32,
}

impl ScreenRect {
    /// Projects the eight corners of `bounds` with `world_view_proj`.
    ///
    /// Returns `None` when the box cannot be tested safely: a corner lies
    /// behind the camera or in front of the near plane, or the box covers no
    /// texel of the buffer. Callers treat `None` as visible.
    pub fn project(
        bounds: &Aabb,
        world_view_proj: &Mat4,
        width: u32,
        height: u32,
        convention: DepthConvention,
    ) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let size = Vec2::new(width as f32, height as f32);
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        let mut nearest = convention.far_value();

        for corner in bounds.corners() {
            let clip = *world_view_proj * Vec4::new(corner.x, corner.y, corner.z, 1.0);
            if clip.w <= EPSILON {
                return None;
            }
            let ndc = clip.truncate() / clip.w;
            if !convention.is_nearer(convention.near_value(), ndc.z) {
                return None;
            }
            let pixel = ndc_to_pixel(Vec2::new(ndc.x, ndc.y), size);
            min = min.min(pixel);
            max = max.max(pixel);
            nearest = convention.nearer(nearest, ndc.z);
        }

        if max.x < 0.0 || max.y < 0.0 || min.x >= size.x || min.y >= size.y {
            return None;
        }
        let clamp = |v: f32, limit: u32| (v.max(0.0) as u32).min(limit - 1);
        Some(Self {
            min_x: clamp(min.x, width),
            min_y: clamp(min.y, height),
            max_x: clamp(max.x, width),
            max_y: clamp(max.y, height),
            nearest_depth: nearest,
        })
    }

    /// Number of covered texels.
    pub fn area(&self) -> u32 {
        (self.max_x - self.min_x + 1) * (self.max_y - self.min_y + 1)
    }
}

/// An occlusion test built once per frame and shared read-only by the workers.
pub trait OcclusionStrategy: Send + Sync + Debug {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Width and height of the buffer the rectangles are expressed in.
    fn extent(&self) -> (u32, u32);

    /// Depth convention of the buffer.
    fn convention(&self) -> DepthConvention;

    /// Returns `true` only if the whole rectangle is hidden.
    fn is_occluded(&self, rect: &ScreenRect) -> bool;

    /// Projects `bounds` and tests it. Boxes that cannot be projected are visible.
    fn is_box_occluded(&self, bounds: &Aabb, world_view_proj: &Mat4) -> bool {
        let (width, height) = self.extent();
        ScreenRect::project(bounds, world_view_proj, width, height, self.convention())
            .map(|rect| self.is_occluded(&rect))
            .unwrap_or(false)
    }
}

/// Tests every covered texel.
#[derive(Debug, Clone)]
pub struct DenseOcclusion {
    buffer: ReprojectedDepthBuffer,
}

impl DenseOcclusion {
    /// Wraps a reprojected buffer.
    pub fn new(buffer: ReprojectedDepthBuffer) -> Self {
        Self { buffer }
    }
}

impl OcclusionStrategy for DenseOcclusion {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn extent(&self) -> (u32, u32) {
        (self.buffer.width(), self.buffer.height())
    }

    fn convention(&self) -> DepthConvention {
        self.buffer.convention()
    }

    fn is_occluded(&self, rect: &ScreenRect) -> bool {
        let convention = self.buffer.convention();
        (rect.min_y..=rect.max_y).all(|y| {
            (rect.min_x..=rect.max_x)
                .all(|x| convention.is_nearer(self.buffer.depth_at(x, y), rect.nearest_depth))
        })
    }
}

/// Side of a mask tile, in texels.
pub const MASK_TILE_SIZE: u32 = 8;

/// Tests 8x8 tiles, each holding the farthest depth of its texels.
#[derive(Debug, Clone)]
pub struct MaskedOcclusion {
    width: u32,
    height: u32,
    tiles_x: u32,
    convention: DepthConvention,
    tiles: Vec<f32>,
}

impl MaskedOcclusion {
    /// Builds the tile mask from a reprojected buffer.
    pub fn new(buffer: &ReprojectedDepthBuffer) -> Self {
        let convention = buffer.convention();
        let tiles_x = buffer.width().div_ceil(MASK_TILE_SIZE);
        let tiles_y = buffer.height().div_ceil(MASK_TILE_SIZE);
        let mut tiles = vec![convention.near_value(); (tiles_x * tiles_y) as usize];
        for y in 0..buffer.height() {
            for x in 0..buffer.width() {
                let tile = ((y / MASK_TILE_SIZE) * tiles_x + x / MASK_TILE_SIZE) as usize;
                tiles[tile] = convention.farther(tiles[tile], buffer.depth_at(x, y));
            }
        }
        Self {
            width: buffer.width(),
            height: buffer.height(),
            tiles_x,
            convention,
            tiles,
        }
    }

    /// Farthest depth of tile `(tx, ty)`.
    pub fn tile_depth(&self, tx: u32, ty: u32) -> f32 {
        self.tiles[(ty * self.tiles_x + tx) as usize]
    }
}

impl OcclusionStrategy for MaskedOcclusion {
    fn name(&self) -> &'static str {
        "masked"
    }

    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn convention(&self) -> DepthConvention {
        self.convention
    }

    fn is_occluded(&self, rect: &ScreenRect) -> bool {
        let (tx0, tx1) = (rect.min_x / MASK_TILE_SIZE, rect.max_x / MASK_TILE_SIZE);
        let (ty0, ty1) = (rect.min_y / MASK_TILE_SIZE, rect.max_y / MASK_TILE_SIZE);
        (ty0..=ty1).all(|ty| {
            (tx0..=tx1).all(|tx| self.convention.is_nearer(self.tile_depth(tx, ty), rect.nearest_depth))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferra_core::math::Vec3;

    const W: u32 = 64;
    const H: u32 = 32;

    fn view_proj() -> Mat4 {
        Mat4::perspective_rh(1.0, 2.0, 100.0, 1.0) * Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y)
    }

    fn depth_at_distance(distance: f32) -> f32 {
        let clip = view_proj() * Vec4::new(0.0, 0.0, -distance, 1.0);
        clip.z / clip.w
    }

    fn wall(distance: f32) -> ReprojectedDepthBuffer {
        ReprojectedDepthBuffer::from_depths(
            W,
            H,
            DepthConvention::Reversed,
            vec![depth_at_distance(distance); (W * H) as usize],
        )
        .unwrap()
    }

    fn cube_at(distance: f32) -> Aabb {
        Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -distance), Vec3::splat(0.5))
    }

    #[test]
    fn test_box_behind_wall_is_occluded_by_both_strategies() {
        let buffer = wall(10.0);
        let strategies: [Box<dyn OcclusionStrategy>; 2] =
            [Box::new(MaskedOcclusion::new(&buffer)), Box::new(DenseOcclusion::new(buffer))];
        for strategy in &strategies {
            assert!(strategy.is_box_occluded(&cube_at(20.0), &view_proj()), "{}", strategy.name());
            assert!(!strategy.is_box_occluded(&cube_at(5.0), &view_proj()), "{}", strategy.name());
        }
    }

    #[test]
    fn test_one_far_texel_keeps_box_visible() {
        let mut depths = vec![depth_at_distance(10.0); (W * H) as usize];
        let rect = ScreenRect::project(&cube_at(20.0), &view_proj(), W, H, DepthConvention::Reversed).unwrap();
        depths[(rect.min_y * W + rect.min_x) as usize] = 0.0;
        let buffer = ReprojectedDepthBuffer::from_depths(W, H, DepthConvention::Reversed, depths).unwrap();
        assert!(!DenseOcclusion::new(buffer.clone()).is_occluded(&rect));
        assert!(!MaskedOcclusion::new(&buffer).is_occluded(&rect));
    }

    #[test]
    fn test_box_behind_camera_is_conservatively_visible() {
        let straddling = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -5.0), Vec3::new(1.0, 1.0, 5.0));
        assert!(ScreenRect::project(&straddling, &view_proj(), W, H, DepthConvention::Reversed).is_none());
        assert!(!DenseOcclusion::new(wall(2.0)).is_box_occluded(&straddling, &view_proj()));
    }

    #[test]
    fn test_projected_rect_is_centered_for_centered_box() {
        let rect = ScreenRect::project(&cube_at(10.0), &view_proj(), W, H, DepthConvention::Reversed).unwrap();
        assert_eq!(rect.min_x + rect.max_x, W - 1);
        assert_eq!(rect.min_y + rect.max_y, H - 1);
        assert!(rect.nearest_depth > depth_at_distance(10.0));
    }

    #[test]
    fn test_mask_tiles_hold_farthest_texel() {
        let mut depths = vec![0.9; (W * H) as usize];
        depths[3] = 0.2;
        let buffer = ReprojectedDepthBuffer::from_depths(W, H, DepthConvention::Reversed, depths).unwrap();
        let mask = MaskedOcclusion::new(&buffer);
        assert_eq!(mask.tile_depth(0, 0), 0.2);
        assert_eq!(mask.tile_depth(1, 0), 0.9);
    }

    #[test]
    fn test_empty_buffer_never_occludes() {
        let buffer = ReprojectedDepthBuffer::cleared(W, H, DepthConvention::Standard);
        let rect = ScreenRect {
            min_x: 0,
            min_y: 0,
            max_x: 3,
            max_y: 3,
            nearest_depth: 0.999,
        };
        assert!(!DenseOcclusion::new(buffer.clone()).is_occluded(&rect));
        assert!(!MaskedOcclusion::new(&buffer).is_occluded(&rect));
        assert_eq!(rect.area(), 16);
    }
}
