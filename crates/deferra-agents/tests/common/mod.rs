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

//! Scenes, overlays and a hand-driven fence for exercising the renderer on the headless backend.

#![allow(dead_code)]

use deferra_core::math::{Aabb, Mat4, Vec3};
use deferra_core::renderer::{
    BackendInfo, CommandAllocatorId, CommandList, CpuDescriptorHandle, DescriptorHeapLayout, GpuDescriptorHandle,
    GpuFence, PerPass, RenderBackend, RenderError, ResourceDescriptor, ResourceId, ResourceView, UiOverlay,
};
use deferra_core::scene::{
    AssetSource, Camera, CullState, MaterialAsset, MeshAsset, MeshGeometry, MeshId, RenderLayer, SceneGraph,
    SceneObject, Submesh, MaterialId,
};
use deferra_core::RendererConfig;
use deferra_infra::{HeadlessBackend, HeadlessConfig};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 32;

/// A configuration small enough to build quickly.
pub fn test_config() -> RendererConfig {
    RendererConfig {
        width: WIDTH,
        height: HEIGHT,
        depth_readback_width: 32,
        depth_readback_height: 16,
        max_texture_count: 8,
        max_scene_objects: 64,
        max_materials: 8,
        max_meshes: 4,
        sdf_resolution: 8,
        sdf_ray_count: 16,
        worker_threads: Some(2),
        min_cull_chunk: 4,
        ..Default::default()
    }
}

pub fn headless(config: &RendererConfig) -> HeadlessBackend {
    HeadlessBackend::new(HeadlessConfig::new(config.width, config.height)).unwrap()
}

pub struct TestObject {
    pub index: u32,
    pub world: Mat4,
    pub mesh: MeshId,
    pub state: CullState,
    pub dirty: u32,
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
        self.dirty
    }
    fn mark_slot_updated(&mut self) {
        self.dirty = self.dirty.saturating_sub(1);
    }
}

#[derive(Default)]
pub struct TestScene {
    pub deferred: Vec<TestObject>,
}

impl TestScene {
    /// One unit cube per position, dirty in every slot.
    pub fn with_cubes(positions: impl IntoIterator<Item = Vec3>) -> Self {
        let deferred = positions
            .into_iter()
            .enumerate()
            .map(|(i, p)| TestObject {
                index: i as u32,
                world: Mat4::from_translation(p),
                mesh: MeshId(0),
                state: CullState::Visible,
                dirty: 3,
            })
            .collect();
        Self { deferred }
    }

    /// A row of cubes `distance` units down -z.
    pub fn row(count: usize, distance: f32) -> Self {
        Self::with_cubes((0..count).map(|i| Vec3::new(i as f32 - count as f32 / 2.0, 0.0, -distance)))
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
    pub materials: Vec<MaterialAsset>,
}

impl TestAssets {
    /// A unit cube with CPU geometry and one material.
    pub fn cube() -> Self {
        let positions = vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2,
            4, 5, 6, 4, 6, 7,
            0, 1, 5, 0, 5, 4,
            3, 6, 2, 3, 7, 6,
            0, 4, 7, 0, 7, 3,
            1, 2, 6, 1, 6, 5,
        ];
        Self {
            meshes: vec![MeshAsset {
                name: "cube".into(),
                bounds: Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
                vertex_buffer: ResourceId(u64::MAX - 1),
                index_buffer: ResourceId(u64::MAX),
                submeshes: vec![Submesh {
                    index_count: 36,
                    start_index: 0,
                    base_vertex: 0,
                    material: MaterialId(0),
                }],
                geometry: Some(MeshGeometry { positions, indices }),
                sdf: None,
            }],
            materials: vec![MaterialAsset::new("plain", MaterialId(0), 3)],
        }
    }
}

impl AssetSource for TestAssets {
    fn mesh(&self, id: MeshId) -> Option<&MeshAsset> {
        self.meshes.get(id.0 as usize)
    }
    fn material_count(&self) -> usize {
        self.materials.len()
    }
    fn material_mut(&mut self, index: usize) -> Option<&mut MaterialAsset> {
        self.materials.get_mut(index)
    }
}

/// A camera at the origin looking down -z, with a reversed projection.
pub struct TestCamera {
    pub view: Mat4,
    pub proj: Mat4,
}

impl TestCamera {
    pub fn new() -> Self {
        Self {
            view: Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
            proj: Mat4::perspective_rh(1.0, WIDTH as f32 / HEIGHT as f32, 100.0, 1.0),
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
        (1.0, 100.0)
    }
}

/// Clears the back buffer and counts how often it ran.
#[derive(Default)]
pub struct ClearingOverlay {
    pub calls: Arc<Mutex<u32>>,
}

impl UiOverlay for ClearingOverlay {
    fn record(
        &mut self,
        commands: &mut CommandList,
        back_buffer: ResourceId,
        _font_table: GpuDescriptorHandle,
    ) -> Result<(), RenderError> {
        *self.calls.lock().unwrap() += 1;
        commands.clear_render_target(back_buffer, [0.1, 0.1, 0.1, 1.0]);
        Ok(())
    }
}

/// Records a command, then fails.
pub struct FailingOverlay;

impl UiOverlay for FailingOverlay {
    fn record(
        &mut self,
        commands: &mut CommandList,
        back_buffer: ResourceId,
        _font_table: GpuDescriptorHandle,
    ) -> Result<(), RenderError> {
        commands.clear_render_target(back_buffer, [1.0, 0.0, 1.0, 1.0]);
        Err(RenderError::UiOverlay("font atlas missing".to_string()))
    }
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: u64,
    completed: u64,
    holding: bool,
}

/// A fence whose completion the test controls.
///
/// While held, signals are recorded but never complete. Releasing completes
/// everything signaled and stops holding.
#[derive(Debug, Default)]
pub struct ManualFence {
    state: Mutex<FenceState>,
    completed: Condvar,
}

impl ManualFence {
    pub fn hold(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).holding = true;
    }

    pub fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.holding = false;
        state.completed = state.signaled;
        self.completed.notify_all();
    }

    pub fn signaled(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).signaled
    }
}

impl GpuFence for ManualFence {
    fn signal(&self, value: u64) -> Result<(), RenderError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.signaled = value;
        if !state.holding {
            state.completed = value;
            self.completed.notify_all();
        }
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).completed
    }

    fn wait_for_value(&self, value: u64) -> Result<(), RenderError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.completed < value {
            state = self.completed.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

/// The headless backend with its fence replaced by a [`ManualFence`].
#[derive(Debug)]
pub struct GatedBackend {
    pub inner: HeadlessBackend,
    pub fence: Arc<ManualFence>,
    drained: u64,
}

impl GatedBackend {
    pub fn new(inner: HeadlessBackend) -> Self {
        Self {
            inner,
            fence: Arc::new(ManualFence::default()),
            drained: 0,
        }
    }
}

impl RenderBackend for GatedBackend {
    fn info(&self) -> BackendInfo {
        self.inner.info()
    }
    fn fence(&self) -> Arc<dyn GpuFence> {
        self.fence.clone()
    }
    fn create_descriptor_heap(&mut self, capacity: u32) -> Result<DescriptorHeapLayout, RenderError> {
        self.inner.create_descriptor_heap(capacity)
    }
    fn write_descriptor(&mut self, handle: CpuDescriptorHandle, view: &ResourceView) -> Result<(), RenderError> {
        self.inner.write_descriptor(handle, view)
    }
    fn create_resource(&mut self, descriptor: &ResourceDescriptor) -> Result<ResourceId, RenderError> {
        self.inner.create_resource(descriptor)
    }
    fn destroy_resource(&mut self, resource: ResourceId) {
        self.inner.destroy_resource(resource)
    }
    fn write_buffer(&mut self, buffer: ResourceId, offset: u64, data: &[u8]) -> Result<(), RenderError> {
        self.inner.write_buffer(buffer, offset, data)
    }
    fn read_buffer(&self, buffer: ResourceId, offset: u64, out: &mut [u8]) -> Result<(), RenderError> {
        self.inner.read_buffer(buffer, offset, out)
    }
    fn create_command_allocator(&mut self) -> Result<CommandAllocatorId, RenderError> {
        self.inner.create_command_allocator()
    }
    fn reset_command_allocator(&mut self, allocator: CommandAllocatorId) -> Result<(), RenderError> {
        self.inner.reset_command_allocator(allocator)
    }
    fn execute(&mut self, allocator: CommandAllocatorId, commands: &CommandList) -> Result<(), RenderError> {
        self.inner.execute(allocator, commands)?;
        // Only the manual fence gates the renderer; the real queue is drained
        // so allocator resets and resizes never observe work in flight.
        self.drained += 1;
        let queue = self.inner.fence();
        queue.signal(self.drained)?;
        queue.wait_for_value(self.drained)
    }
    fn back_buffer(&self) -> ResourceId {
        self.inner.back_buffer()
    }
    fn present(&mut self) -> Result<ResourceId, RenderError> {
        self.inner.present()
    }
    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.inner.resize_surface(width, height)
    }
    fn pass_timings(&self) -> Option<PerPass<Duration>> {
        self.inner.pass_timings()
    }
}
