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

//! CPU ray picking over the deferred layer.

use deferra_core::math::{Ray, EPSILON};
use deferra_core::scene::{AssetSource, RenderLayer, SceneGraph};

/// The object a ray hit first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    /// Position of the object within the deferred layer.
    pub index: usize,
    /// The object's constant-buffer row.
    pub object_index: u32,
    /// World-space distance along the normalized ray.
    pub distance: f32,
}

/// Finds the nearest deferred object hit by `ray`.
///
/// Each object is tested against its world-space bounds first. Survivors are
/// tested triangle by triangle in object space when the mesh kept its
/// geometry; otherwise the bounds hit is taken as the hit. Objects whose
/// transform cannot be inverted are skipped.
pub fn pick(scene: &dyn SceneGraph, assets: &dyn AssetSource, ray: &Ray) -> Option<PickHit> {
    let direction = ray.direction.normalize_or_zero();
    if direction == deferra_core::math::Vec3::ZERO {
        return None;
    }
    let ray = Ray::new(ray.origin, direction);
    let mut best: Option<PickHit> = None;

    for index in 0..scene.object_count(RenderLayer::Deferred) {
        let Some(object) = scene.object(RenderLayer::Deferred, index) else {
            continue;
        };
        let Some(mesh) = assets.mesh(object.mesh()) else {
            continue;
        };
        let world = object.transform();
        let Some(bounds_t) = ray.intersect_aabb(&mesh.bounds.transform(&world)) else {
            continue;
        };
        if best.is_some_and(|hit| bounds_t >= hit.distance) {
            continue;
        }

        let distance = match &mesh.geometry {
            Some(geometry) => {
                if world.determinant().abs() <= EPSILON * EPSILON {
                    continue;
                }
                let local = ray.transform(&world.inverse());
                let nearest = geometry
                    .triangles()
                    .filter_map(|[a, b, c]| local.intersect_triangle(a, b, c))
                    .min_by(|l, r| l.t.total_cmp(&r.t));
                match nearest {
                    // The local direction is scaled by the inverse transform; map back to world.
                    Some(hit) => (world.transform_point3(local.at(hit.t)) - ray.origin).length(),
                    None => continue,
                }
            }
            None => bounds_t,
        };

        if best.is_none_or(|hit| distance < hit.distance) {
            best = Some(PickHit {
                index,
                object_index: object.object_index(),
                distance,
            });
        }
    }
    best
}
