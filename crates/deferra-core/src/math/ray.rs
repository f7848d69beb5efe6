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

//! Rays and their intersection queries, shared by picking and SDF baking.

use super::{Aabb, Mat4, Vec3, EPSILON};

/// A half-line with an origin and a direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The starting point of the ray.
    pub origin: Vec3,
    /// The direction of travel. Not required to be normalized.
    pub direction: Vec3,
}

/// The result of a ray/triangle intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Parametric distance along the ray.
    pub t: f32,
    /// `true` when the ray hit the side facing away from the counter-clockwise normal.
    pub back_face: bool,
}

impl Ray {
    /// Creates a new ray.
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// The point at parametric distance `t`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Carries the ray through an affine transform.
    pub fn transform(&self, m: &Mat4) -> Self {
        Self {
            origin: m.transform_point3(self.origin),
            direction: m.transform_vector3(self.direction),
        }
    }

    /// Slab test against a box. Returns the entry distance, or `0.0` when the
    /// origin is inside the box.
    pub fn intersect_aabb(&self, aabb: &Aabb) -> Option<f32> {
        let inv = self.direction.recip();
        let t0 = (aabb.min - self.origin) * inv;
        let t1 = (aabb.max - self.origin) * inv;
        let t_near = t0.min(t1).max_element();
        let t_far = t0.max(t1).min_element();
        if t_far < 0.0 || t_near > t_far || t_near.is_nan() || t_far.is_nan() {
            return None;
        }
        Some(t_near.max(0.0))
    }

    /// Double-sided Möller-Trumbore intersection. Hits at `t <= 0` are ignored.
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<TriangleHit> {
        let e1 = b - a;
        let e2 = c - a;
        let p = self.direction.cross(e2);
        let det = e1.dot(p);
        if det.abs() < EPSILON * EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t > EPSILON).then_some(TriangleHit {
            t,
            back_face: det < 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_box_in_front() {
        let r = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let b = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        assert_eq!(r.intersect_aabb(&b), Some(4.0));
    }

    #[test]
    fn ray_misses_box_behind() {
        let r = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        let b = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        assert_eq!(r.intersect_aabb(&b), None);
    }

    #[test]
    fn ray_starting_inside_box_reports_zero() {
        let r = Ray::new(Vec3::ZERO, Vec3::X);
        let b = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        assert_eq!(r.intersect_aabb(&b), Some(0.0));
    }

    #[test]
    fn triangle_hit_reports_facing() {
        // Counter-clockwise seen from +Z, so its normal points toward +Z.
        let (a, b, c) = (Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let front = Ray::new(Vec3::new(0.0, 0.0, 2.0), Vec3::NEG_Z).intersect_triangle(a, b, c).unwrap();
        assert!(!front.back_face);
        assert!((front.t - 2.0).abs() < 1e-5);

        let back = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z).intersect_triangle(a, b, c).unwrap();
        assert!(back.back_face);
    }

    #[test]
    fn triangle_miss_outside_edges() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        let r = Ray::new(Vec3::new(2.0, 2.0, 1.0), Vec3::NEG_Z);
        assert!(r.intersect_triangle(a, b, c).is_none());
    }
}
