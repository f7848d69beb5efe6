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

//! The per-object frustum test.

use deferra_core::math::{Aabb, Containment, Frustum, Mat4};

/// Returns `true` if `bounds`, placed by `world`, lies entirely outside `frustum`.
///
/// The frustum is built from the projection alone, so the box is moved into
/// view space first. A box that only partially overlaps is kept.
#[inline]
pub fn is_outside_frustum(frustum: &Frustum, view: &Mat4, world: &Mat4, bounds: &Aabb) -> bool {
    let view_bounds = bounds.transform(&(*view * *world));
    frustum.contains_aabb(&view_bounds) == Containment::Disjoint
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferra_core::math::Vec3;

    fn setup(reversed: bool) -> (Frustum, Mat4) {
        let proj = if reversed {
            Mat4::perspective_rh(1.2, 16.0 / 9.0, 500.0, 0.5)
        } else {
            Mat4::perspective_rh(1.2, 16.0 / 9.0, 0.5, 500.0)
        };
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 10.0), Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        (Frustum::from_matrix(&proj), view)
    }

    fn unit_box() -> Aabb {
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5))
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        for reversed in [false, true] {
            let (frustum, view) = setup(reversed);
            let world = Mat4::from_translation(Vec3::new(0.0, 2.0, -1000.0));
            assert!(is_outside_frustum(&frustum, &view, &world, &unit_box()));
        }
    }

    #[test]
    fn test_box_straddling_near_plane_is_kept() {
        for reversed in [false, true] {
            let (frustum, view) = setup(reversed);
            let world = Mat4::from_translation(Vec3::new(0.0, 2.0, 9.6));
            assert!(!is_outside_frustum(&frustum, &view, &world, &unit_box()));
        }
    }

    #[test]
    fn test_box_behind_camera_is_culled() {
        let (frustum, view) = setup(true);
        let world = Mat4::from_translation(Vec3::new(0.0, 2.0, 20.0));
        assert!(is_outside_frustum(&frustum, &view, &world, &unit_box()));
    }

    #[test]
    fn test_box_far_to_the_side_is_culled_even_when_rotated() {
        let (frustum, view) = setup(false);
        let world = Mat4::from_translation(Vec3::new(40.0, 2.0, 0.0)) * Mat4::from_rotation_y(0.785);
        let long = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(2.0, 0.5, 0.1));
        assert!(is_outside_frustum(&frustum, &view, &world, &long));
    }
}
