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

//! Brute-force ray-cast baker.
//!
//! Every voxel casts a Fibonacci lattice of rays against the mesh triangles.
//! The nearest hit gives the distance; the sign is negative when most hits
//! land on back faces, i.e. the voxel sits inside the mesh.

use deferra_core::math::{Aabb, Ray, Vec3};
use deferra_core::scene::MeshGeometry;
use deferra_core::{RenderError, ThreadPool};
use std::f32::consts::PI;
use std::sync::Arc;

/// Voxels per axis unless configured otherwise.
pub const DEFAULT_SDF_RESOLUTION: u32 = 64;

/// Rays per voxel unless configured otherwise.
pub const DEFAULT_RAY_COUNT: u32 = 128;

/// Padding applied to the mesh extent so the field covers some empty space.
const EXTENT_PADDING: f32 = 1.4;

/// Distance assigned to voxels no ray reaches, relative to the field extent.
const MISS_DISTANCE_SCALE: f32 = 1.414;

const GOLDEN_ANGLE: f32 = 2.0 * PI * 0.618;

/// A baked field, `resolution` voxels per axis, centered on the object origin.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedSdf {
    /// Voxels per axis.
    pub resolution: u32,
    /// Half of the cube side the field spans, in object units.
    pub half_extent: f32,
    /// Signed distances, x fastest, then y, then z.
    pub voxels: Vec<f32>,
}

impl BakedSdf {
    /// Side of one voxel.
    pub fn voxel_size(&self) -> f32 {
        self.half_extent * 2.0 / self.resolution as f32
    }

    /// Distance stored at voxel `(x, y, z)`.
    pub fn value_at(&self, x: u32, y: u32, z: u32) -> f32 {
        let res = self.resolution as usize;
        self.voxels[(z as usize * res + y as usize) * res + x as usize]
    }

    /// Object-space center of voxel `(x, y, z)`.
    pub fn voxel_center(&self, x: u32, y: u32, z: u32) -> Vec3 {
        voxel_center(x, y, z, self.resolution, self.voxel_size())
    }

    /// Raw texel bytes for a 3D `R32Float` upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.voxels)
    }
}

/// Direction `n` of a `count`-point Fibonacci lattice on the unit sphere.
pub fn fibonacci_direction(n: u32, count: u32) -> Vec3 {
    let y = (2 * n + 1) as f32 / count as f32 - 1.0;
    let r = (1.0 - y * y).max(0.0).sqrt();
    let phi = GOLDEN_ANGLE * n as f32;
    Vec3::new(r * phi.cos(), y, r * phi.sin())
}

fn voxel_center(x: u32, y: u32, z: u32, resolution: u32, unit: f32) -> Vec3 {
    let half = (resolution / 2) as f32;
    Vec3::new(
        (x as f32 - half + 0.5) * unit,
        (y as f32 - half + 0.5) * unit,
        (z as f32 - half + 0.5) * unit,
    )
}

/// Bakes mesh distance fields on the worker pool.
#[derive(Debug, Clone, Copy)]
pub struct SdfBaker {
    resolution: u32,
    ray_count: u32,
}

impl Default for SdfBaker {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_SDF_RESOLUTION,
            ray_count: DEFAULT_RAY_COUNT,
        }
    }
}

impl SdfBaker {
    /// A baker with explicit voxel and ray counts. Both are clamped to at least 1.
    pub fn new(resolution: u32, ray_count: u32) -> Self {
        Self {
            resolution: resolution.max(1),
            ray_count: ray_count.max(1),
        }
    }

    /// Voxels per axis.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Side of the cube the field of a mesh with `bounds` spans.
    ///
    /// The field is centered on the object origin, so it must reach the
    /// farthest face of the box on any axis.
    pub fn field_extent(bounds: &Aabb) -> f32 {
        let reach = bounds.min.abs().max(bounds.max.abs()).max_element();
        reach * EXTENT_PADDING * 2.0
    }

    /// Bakes `geometry`, one task per z slab.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidHandle`] when the geometry has no triangles,
    /// [`RenderError::WorkerPanicked`] if a slab panicked.
    pub fn bake(&self, pool: &ThreadPool, geometry: &MeshGeometry, bounds: &Aabb) -> Result<BakedSdf, RenderError> {
        let triangles: Arc<Vec<[Vec3; 3]>> = Arc::new(geometry.triangles().collect());
        if triangles.is_empty() {
            return Err(RenderError::InvalidHandle("mesh geometry without triangles".into()));
        }

        let extent = Self::field_extent(bounds);
        let res = self.resolution;
        let unit = extent / res as f32;
        let miss = MISS_DISTANCE_SCALE * extent;
        let ray_count = self.ray_count;
        let directions: Arc<Vec<Vec3>> = Arc::new((0..ray_count).map(|n| fibonacci_direction(n, ray_count)).collect());

        log::debug!(
            "Baking SDF: {res}^3 voxels, {ray_count} rays, {} triangles",
            triangles.len()
        );

        let slabs = pool.map_range(res as usize, 1, "sdf baking", move |z| {
            let mut slab = Vec::with_capacity((res * res) as usize);
            for y in 0..res {
                for x in 0..res {
                    let origin = voxel_center(x, y, z as u32, res, unit);
                    slab.push(voxel_distance(origin, &directions, &triangles, miss));
                }
            }
            slab
        })?;

        Ok(BakedSdf {
            resolution: res,
            half_extent: extent * 0.5,
            voxels: slabs.into_iter().flatten().collect(),
        })
    }
}

fn voxel_distance(origin: Vec3, directions: &[Vec3], triangles: &[[Vec3; 3]], miss: f32) -> f32 {
    let mut nearest = miss;
    let (mut front, mut back) = (0u32, 0u32);
    for direction in directions {
        let ray = Ray::new(origin, *direction);
        let hit = triangles
            .iter()
            .filter_map(|[a, b, c]| ray.intersect_triangle(*a, *b, *c))
            .min_by(|l, r| l.t.total_cmp(&r.t));
        if let Some(hit) = hit {
            if hit.back_face {
                back += 1;
            } else {
                front += 1;
            }
            nearest = nearest.min(hit.t);
        }
    }
    if back > front {
        -nearest
    } else {
        nearest
    }
}
