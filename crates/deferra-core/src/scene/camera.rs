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

use crate::math::{Mat4, Vec2, Vec3};

/// The viewpoint a frame is rendered from.
///
/// Projections map view space to clip space with a `[0, w]` depth range. When
/// the renderer is configured for reversed depth, the camera is expected to
/// supply a reversed projection.
pub trait Camera {
    /// World-to-view transform.
    fn view(&self) -> Mat4;

    /// View-to-clip transform, jitter included.
    fn proj(&self) -> Mat4;

    /// View-to-clip transform without sub-pixel jitter. Used for culling and reprojection.
    fn unjittered_proj(&self) -> Mat4 {
        self.proj()
    }

    /// Unjittered view-projection of the previous frame.
    fn prev_view_proj(&self) -> Mat4;

    /// Eye position in world space.
    fn position(&self) -> Vec3;

    /// Eye position of the previous frame.
    fn prev_position(&self) -> Vec3 {
        self.position()
    }

    /// Near and far clip distances.
    fn near_far(&self) -> (f32, f32);

    /// Sub-pixel jitter in pixels applied to `proj`, if any.
    fn jitter(&self) -> Vec2 {
        Vec2::ZERO
    }

    /// Unjittered view-projection of this frame.
    fn unjittered_view_proj(&self) -> Mat4 {
        self.unjittered_proj() * self.view()
    }
}
