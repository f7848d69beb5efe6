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

//! A procedural scene: a grid of cubes, some spinning, seen from an orbiting camera.

use deferra_core::math::{Aabb, Mat4, Ray, Vec2, Vec3, Vec4};
use deferra_core::renderer::ResourceId;
use deferra_core::scene::{
    AssetSource, Camera, CullState, LightSet, MaterialAsset, MaterialId, MeshAsset, MeshGeometry, MeshId,
    PointLight, RenderLayer, SceneGraph, SceneObject, Submesh,
};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

/// Corners of the unit cube, one per vertex.
pub const CUBE_CORNERS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

#[rustfmt::skip]
pub const CUBE_INDICES: [u32; 36] = [
    0, 2, 1, 0, 3, 2,
    4, 5, 6, 4, 6, 7,
    0, 1, 5, 0, 5, 4,
    3, 6, 2, 3, 7, 6,
    0, 4, 7, 0, 7, 3,
    1, 2, 6, 1, 6, 5,
];

/// Vertex data of the cube, normals pointing away from the center.
pub fn cube_vertices() -> Vec<Vertex> {
    CUBE_CORNERS
        .iter()
        .map(|p| Vertex {
            position: *p,
            normal: Vec3::from_array(*p).normalize().to_array(),
        })
        .collect()
}

pub struct SandboxObject {
    index: u32,
    position: Vec3,
    spin: f32,
    world: Mat4,
    prev_world: Mat4,
    state: CullState,
    frames_dirty: u32,
}

impl SceneObject for SandboxObject {
    fn object_index(&self) -> u32 {
        self.index
    }

    fn transform(&self) -> Mat4 {
        self.world
    }

    fn prev_transform(&self) -> Mat4 {
        self.prev_world
    }

    fn mesh(&self) -> MeshId {
        MeshId(0)
    }

    fn material_override(&self, _submesh: usize) -> Option<MaterialId> {
        Some(MaterialId(self.index % MATERIAL_COUNT))
    }

    fn cull_state(&self) -> CullState {
        self.state
    }

    fn set_cull_state(&mut self, state: CullState) {
        self.state = state;
    }

    fn frames_dirty(&self) -> u32 {
        self.frames_dirty
    }

    fn mark_slot_updated(&mut self) {
        self.frames_dirty = self.frames_dirty.saturating_sub(1);
    }
}

const MATERIAL_COUNT: u32 = 4;

pub struct SandboxScene {
    objects: Vec<SandboxObject>,
    slots: u32,
}

impl SandboxScene {
    /// Lays `count` cubes on a square grid. Every seventh cube spins.
    pub fn grid(count: usize, slots: usize) -> Self {
        let side = (count as f32).sqrt().ceil().max(1.0) as usize;
        let spacing = 2.5;
        let offset = (side as f32 - 1.0) * spacing * 0.5;
        let slots = slots as u32;
        let objects = (0..count)
            .map(|i| {
                let position = Vec3::new(
                    (i % side) as f32 * spacing - offset,
                    0.0,
                    (i / side) as f32 * spacing - offset,
                );
                let world = Mat4::from_translation(position);
                SandboxObject {
                    index: i as u32,
                    position,
                    spin: if i % 7 == 0 { 1.0 } else { 0.0 },
                    world,
                    prev_world: world,
                    state: CullState::Visible,
                    frames_dirty: slots,
                }
            })
            .collect();
        Self { objects, slots }
    }

    /// Advances the spinning cubes to time `t` and marks them dirty in every slot.
    pub fn animate(&mut self, t: f32) {
        for object in self.objects.iter_mut().filter(|o| o.spin != 0.0) {
            object.prev_world = object.world;
            object.world = Mat4::from_translation(object.position) * Mat4::from_rotation_y(t * object.spin);
            object.frames_dirty = self.slots;
        }
    }

    /// Radius of the circle enclosing the grid.
    pub fn radius(&self) -> f32 {
        self.objects
            .iter()
            .map(|o| o.position.length())
            .fold(1.0, f32::max)
    }
}

impl SceneGraph for SandboxScene {
    fn object_count(&self, layer: RenderLayer) -> usize {
        match layer {
            RenderLayer::Deferred => self.objects.len(),
            _ => 0,
        }
    }

    fn object(&self, layer: RenderLayer, index: usize) -> Option<&dyn SceneObject> {
        match layer {
            RenderLayer::Deferred => self.objects.get(index).map(|o| o as &dyn SceneObject),
            _ => None,
        }
    }

    fn object_mut(&mut self, layer: RenderLayer, index: usize) -> Option<&mut dyn SceneObject> {
        match layer {
            RenderLayer::Deferred => self.objects.get_mut(index).map(|o| o as &mut dyn SceneObject),
            _ => None,
        }
    }
}

pub struct SandboxAssets {
    pub cube: MeshAsset,
    materials: Vec<MaterialAsset>,
}

impl SandboxAssets {
    /// The cube mesh drawn from `vertex_buffer` and `index_buffer`, and a few tinted materials.
    pub fn new(vertex_buffer: ResourceId, index_buffer: ResourceId, slots: usize) -> Self {
        let cube = MeshAsset {
            name: "cube".into(),
            bounds: Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
            vertex_buffer,
            index_buffer,
            submeshes: vec![Submesh {
                index_count: CUBE_INDICES.len() as u32,
                start_index: 0,
                base_vertex: 0,
                material: MaterialId(0),
            }],
            geometry: Some(MeshGeometry {
                positions: CUBE_CORNERS.iter().map(|p| Vec3::from_array(*p)).collect(),
                indices: CUBE_INDICES.to_vec(),
            }),
            sdf: None,
        };
        let materials = (0..MATERIAL_COUNT)
            .map(|i| {
                let mut material = MaterialAsset::new(format!("tint_{i}"), MaterialId(i), slots as u32);
                material.texture_scale = Vec2::ONE;
                material.textures = vec!["checker".to_string()];
                material.scalars = vec![0.5, 0.1 * i as f32];
                material.vectors = vec![Vec4::new(1.0 - 0.2 * i as f32, 0.6, 0.2 * i as f32, 1.0)];
                material
            })
            .collect();
        Self { cube, materials }
    }
}

impl AssetSource for SandboxAssets {
    fn mesh(&self, id: MeshId) -> Option<&MeshAsset> {
        (id == MeshId(0)).then_some(&self.cube)
    }

    fn material_count(&self) -> usize {
        self.materials.len()
    }

    fn material_mut(&mut self, index: usize) -> Option<&mut MaterialAsset> {
        self.materials.get_mut(index)
    }
}

/// A camera circling the grid, with a reversed-depth projection.
pub struct OrbitCamera {
    radius: f32,
    height: f32,
    aspect: f32,
    position: Vec3,
    prev_position: Vec3,
    prev_view_proj: Mat4,
}

impl OrbitCamera {
    pub const NEAR: f32 = 0.5;
    pub const FAR: f32 = 500.0;
    const FOV_Y: f32 = 1.0;

    pub fn new(radius: f32, aspect: f32) -> Self {
        let mut camera = Self {
            radius,
            height: radius * 0.4,
            aspect,
            position: Vec3::ZERO,
            prev_position: Vec3::ZERO,
            prev_view_proj: Mat4::IDENTITY,
        };
        camera.advance(0.0);
        camera.prev_view_proj = camera.unjittered_view_proj();
        camera
    }

    /// Moves to angle `t` radians around the grid.
    pub fn advance(&mut self, t: f32) {
        self.prev_view_proj = self.unjittered_view_proj();
        self.prev_position = self.position;
        self.position = Vec3::new(t.cos() * self.radius, self.height, t.sin() * self.radius);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// A ray from the eye through the center of the screen.
    pub fn center_ray(&self) -> Ray {
        Ray::new(self.position, -self.position)
    }
}

impl Camera for OrbitCamera {
    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(Self::FOV_Y, self.aspect, Self::FAR, Self::NEAR)
    }

    fn prev_view_proj(&self) -> Mat4 {
        self.prev_view_proj
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn prev_position(&self) -> Vec3 {
        self.prev_position
    }

    fn near_far(&self) -> (f32, f32) {
        (Self::NEAR, Self::FAR)
    }
}

/// The default sun plus a ring of point lights over the grid.
pub fn lights(radius: f32) -> LightSet {
    let mut lights = LightSet::default();
    lights.point = (0..8)
        .map(|i| {
            let angle = i as f32 / 8.0 * std::f32::consts::TAU;
            PointLight {
                position: Vec3::new(angle.cos() * radius * 0.5, 3.0, angle.sin() * radius * 0.5),
                color: Vec3::new(1.0, 0.8, 0.6),
                intensity: 4.0,
                range: radius * 0.5,
            }
        })
        .collect();
    lights
}
