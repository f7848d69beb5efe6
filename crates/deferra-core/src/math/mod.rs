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

//! Math primitives for culling, picking and constant assembly.
//!
//! Vector and matrix types come from `glam`. This module adds the geometric
//! queries the orchestration core needs: bounding boxes, frustum planes,
//! rays and the depth-buffer convention.

pub mod depth;
pub mod frustum;
pub mod geometry;
pub mod ray;

pub use depth::DepthConvention;
pub use frustum::{Containment, Frustum, Plane};
pub use geometry::Aabb;
pub use glam::{Mat4, Vec2, Vec3, Vec4};
pub use ray::{Ray, TriangleHit};

/// A small value used for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

/// Converts a matrix into the column-major array layout stored in GPU constant blocks.
///
/// # Examples
///
/// ```
/// use deferra_core::math::{to_gpu_matrix, Mat4};
/// let m = to_gpu_matrix(&Mat4::IDENTITY);
/// assert_eq!(m[0], [1.0, 0.0, 0.0, 0.0]);
/// assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
/// ```
#[inline]
pub fn to_gpu_matrix(m: &Mat4) -> [[f32; 4]; 4] {
    m.to_cols_array_2d()
}

/// Returns the inverse-transpose of `m` with its translation removed, the
/// matrix used to carry normals into world space.
///
/// Falls back to the identity when `m` is singular.
pub fn inverse_transpose(m: &Mat4) -> Mat4 {
    let mut linear = *m;
    linear.w_axis = Vec4::W;
    if linear.determinant().abs() <= EPSILON * EPSILON {
        return Mat4::IDENTITY;
    }
    linear.inverse().transpose()
}

/// Integer ceiling division for `u32`.
///
/// # Examples
///
/// ```
/// use deferra_core::math::div_ceil_u32;
/// assert_eq!(div_ceil_u32(1920, 16), 120);
/// assert_eq!(div_ceil_u32(1080, 64), 17);
/// ```
#[inline]
pub fn div_ceil_u32(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor)
}
