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

//! A flat scene, a fixed camera and cube meshes for driving the lanes.

#![allow(dead_code)]

use deferra_core::math::{Aabb, Mat4, Vec3};
use deferra_core::renderer::ResourceId;
use deferra_core::scene::{
    AssetSource, Camera, CullState, MaterialAsset, MeshAsset, MeshId, RenderLayer, SceneGraph, SceneObject,
};

pub struct TestObject {
    pub index: u32,
    pub world: Mat4,
    pub mesh: MeshId,
    pub state: CullState,
}

impl SceneObject for TestObject {
    fn object_index(&self) -> u32 {
        self.index
    }
    fn transform(&self) -> Mat4 {
        self.world
    }
    fn prev_transform(&self) -> Mat4 {
        self.world
    }
    fn mesh(&self) -> MeshId {
        self.mesh
    }
    fn cull_state(&self) -> CullState {
        self.state
    }
    fn set_cull_state(&mut self, state: CullState) {
        self.state = state;
    }
    fn frames_dirty(&self) -> u32 {
        0
    }
    fn mark_slot_updated(&mut self) {}
}

#[derive(Default)]
pub struct TestScene {
    pub deferred: Vec<TestObject>,
}

impl TestScene {
    /// One unit cube per position.
    pub fn with_cubes(positions: impl IntoIterator<Item = Vec3>) -> Self {
        let deferred = positions
            .into_iter()
            .enumerate()
            .map(|(i, p)| TestObject {
                index: i as u32,
                world: Mat4::from_translation(p),
                mesh: MeshId(0),
                state: CullState::Visible,
            })
            .collect();
        Self { deferred }
    }

    pub fn states(&self) -> Vec<CullState> {
        self.deferred.iter().map(|o| o.state).collect()
    }
}

impl SceneGraph for TestScene {
    fn object_count(&self, layer: RenderLayer) -> usize {
        match layer {
            RenderLayer::Deferred => self.deferred.len(),
            _ => 0,
        }
    }

    fn object(&self, layer: RenderLayer, index: usize) -> Option<&dyn SceneObject> {
        match layer {
            RenderLayer::Deferred => self.deferred.get(index).map(|o| o as &dyn SceneObject),
            _ => None,
        }
    }

    fn object_mut(&mut self, layer: RenderLayer, index: usize) -> Option<&mut dyn SceneObject> {
        match layer {
            RenderLayer::Deferred => self.deferred.get_mut(index).map(|o| o as &mut dyn SceneObject),
            _ => None,
        }
    }
}

pub struct TestAssets {
    pub meshes: Vec<MeshAsset>,
}

impl TestAssets {
    /// A single mesh: a cube of half extent 0.5 around the origin.
    pub fn cube() -> Self {
        Self {
            meshes: vec![MeshAsset {
                name: "cube".into(),
                bounds: Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
                vertex_buffer: ResourceId(1),
                index_buffer: ResourceId(2),
                submeshes: Vec::new(),
                geometry: None,
                sdf: None,
            }],
        }
    }
}

impl AssetSource for TestAssets {
    fn mesh(&self, id: MeshId) -> Option<&MeshAsset> {
        self.meshes.get(id.0 as usize)
    }
    fn material_count(&self) -> usize {
        0
    }
    fn material_mut(&mut self, _index: usize) -> Option<&mut MaterialAsset> {
        None
    }
}

/// A camera at the origin looking down -z.
pub struct TestCamera {
    pub view: Mat4,
    pub proj: Mat4,
    pub near: f32,
    pub far: f32,
}

impl TestCamera {
    pub fn new(reverse_z: bool) -> Self {
        let (near, far) = (1.0, 100.0);
        let proj = if reverse_z {
            Mat4::perspective_rh(1.0, 2.0, far, near)
        } else {
            Mat4::perspective_rh(1.0, 2.0, near, far)
        };
        Self {
            view: Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
            proj,
            near,
            far,
        }
    }
}

impl Camera for TestCamera {
    fn view(&self) -> Mat4 {
        self.view
    }
    fn proj(&self) -> Mat4 {
        self.proj
    }
    fn prev_view_proj(&self) -> Mat4 {
        self.proj * self.view
    }
    fn position(&self) -> Vec3 {
        Vec3::ZERO
    }
    fn near_far(&self) -> (f32, f32) {
        (self.near, self.far)
    }
}
