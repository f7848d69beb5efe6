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

//! View-frustum planes and box classification.

use super::{Aabb, Mat4, Vec3, Vec4, EPSILON};

/// A plane in Hessian normal form. Points with a non-negative signed distance
/// are on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing into the half-space being kept.
    pub normal: Vec3,
    /// Distance term, so that `normal.dot(p) + d` is the signed distance of `p`.
    pub d: f32,
}

impl Plane {
    /// Normalizes a raw `(a, b, c, d)` plane. Returns `None` when the normal
    /// is degenerate, as happens for the far plane of an infinite projection.
    pub fn from_coefficients(v: Vec4) -> Option<Self> {
        let normal = v.truncate();
        let len = normal.length();
        if len <= EPSILON {
            return None;
        }
        Some(Self {
            normal: normal / len,
            d: v.w / len,
        })
    }

    /// Signed distance of a point from the plane.
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// The relation of a volume to a frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Entirely outside at least one plane.
    Disjoint,
    /// Straddles at least one plane.
    Intersects,
    /// Entirely inside every plane.
    Contains,
}

/// A convex view volume bounded by up to six planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
    len: usize,
}

impl Frustum {
    /// Extracts the frustum planes from a clip-space matrix.
    ///
    /// `clip` maps points into clip space with a `[0, w]` depth range. Passing
    /// a projection matrix yields a view-space frustum; passing
    /// `projection * view` yields a world-space one. Because both depth
    /// bounds are extracted, the result is the same for standard and
    /// reversed depth. A degenerate plane (the far plane of an infinite
    /// projection) is dropped.
    pub fn from_matrix(clip: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (clip.row(0), clip.row(1), clip.row(2), clip.row(3));
        let raw = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2];

        let mut planes = [Plane {
            normal: Vec3::ZERO,
            d: 0.0,
        }; 6];
        let mut len = 0;
        for plane in raw.into_iter().filter_map(Plane::from_coefficients) {
            planes[len] = plane;
            len += 1;
        }
        Self { planes, len }
    }

    /// The planes of this frustum.
    pub fn planes(&self) -> &[Plane] {
        &self.planes[..self.len]
    }

    /// Classifies a box against the frustum.
    ///
    /// A box is only reported `Disjoint` when it lies entirely on the outer
    /// side of one plane, so boxes touching the volume are never rejected.
    pub fn contains_aabb(&self, aabb: &Aabb) -> Containment {
        let center = aabb.center();
        let half = aabb.half_extents();
        let mut result = Containment::Contains;
        for plane in self.planes() {
            let distance = plane.signed_distance(center);
            let radius = plane.normal.abs().dot(half);
            if distance + radius < 0.0 {
                return Containment::Disjoint;
            }
            if distance - radius < 0.0 {
                result = Containment::Intersects;
            }
        }
        result
    }

    /// Returns `true` unless the box is entirely outside the frustum.
    #[inline]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.contains_aabb(aabb) != Containment::Disjoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proj() -> Mat4 {
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 100.0)
    }

    fn reversed_proj() -> Mat4 {
        // Swapping near and far flips the depth mapping to reversed-Z.
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 100.0, 1.0)
    }

    fn unit_box_at(z: f32) -> Aabb {
        Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, z), Vec3::splat(0.5))
    }

    #[test]
    fn box_in_front_is_contained() {
        for m in [proj(), reversed_proj()] {
            let f = Frustum::from_matrix(&m);
            assert_eq!(f.planes().len(), 6);
            assert_eq!(f.contains_aabb(&unit_box_at(-10.0)), Containment::Contains);
        }
    }

    #[test]
    fn box_beyond_far_plane_is_disjoint() {
        for m in [proj(), reversed_proj()] {
            let f = Frustum::from_matrix(&m);
            assert_eq!(f.contains_aabb(&unit_box_at(-150.0)), Containment::Disjoint);
        }
    }

    #[test]
    fn box_straddling_near_plane_intersects() {
        for m in [proj(), reversed_proj()] {
            let f = Frustum::from_matrix(&m);
            assert_eq!(f.contains_aabb(&unit_box_at(-1.0)), Containment::Intersects);
        }
    }

    #[test]
    fn box_behind_camera_is_disjoint() {
        let f = Frustum::from_matrix(&proj());
        assert!(!f.intersects_aabb(&unit_box_at(5.0)));
    }

    #[test]
    fn infinite_reversed_projection_drops_degenerate_plane() {
        let m = Mat4::perspective_infinite_reverse_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.5);
        let f = Frustum::from_matrix(&m);
        assert_eq!(f.planes().len(), 5);
        assert!(f.intersects_aabb(&unit_box_at(-1.0e6)));
        assert!(!f.intersects_aabb(&unit_box_at(1.0)));
    }

    #[test]
    fn box_outside_side_plane_is_disjoint() {
        let f = Frustum::from_matrix(&proj());
        // At z = -10 the half-width is 10.
        let b = Aabb::from_center_half_extents(Vec3::new(20.0, 0.0, -10.0), Vec3::splat(1.0));
        assert_eq!(f.contains_aabb(&b), Containment::Disjoint);
    }
}
