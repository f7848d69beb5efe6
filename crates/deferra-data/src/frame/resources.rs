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

//! The resources one frame slot owns.

use super::UploadBuffer;
use crate::layouts::{
    LightConstants, MaterialData, MeshSdfDescriptor, ObjectConstants, PassConstants,
    SceneObjectSdfDescriptor, SkyPassConstants,
};
use deferra_core::math::Mat4;
use deferra_core::renderer::{
    BufferDescriptor, BufferUsage, CommandAllocatorId, FrameBufferKind, RenderBackend,
    ResourceDescriptor, ResourceId,
};
use deferra_core::RenderError;

/// Element counts of the per-slot buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameResourceSizes {
    /// Object constant rows.
    pub objects: u32,
    /// Material rows.
    pub materials: u32,
    /// Mesh distance-field rows.
    pub meshes: u32,
    /// Texels in the downsampled depth readback.
    pub readback_texels: u32,
}

/// Per-slot command allocator, constant buffers and depth readback.
#[derive(Debug)]
pub struct FrameResources {
    /// Allocator the slot's command list is recorded against.
    pub command_allocator: CommandAllocatorId,
    /// Object constants, one 256-byte row per object.
    pub object_cb: UploadBuffer<ObjectConstants>,
    /// Material table, packed.
    pub material_buffer: UploadBuffer<MaterialData>,
    /// Light block.
    pub light_cb: UploadBuffer<LightConstants>,
    /// Pass constants.
    pub pass_cb: UploadBuffer<PassConstants>,
    /// Sky pass constants.
    pub sky_cb: UploadBuffer<SkyPassConstants>,
    /// Distance-field placements of the scene objects, packed.
    pub scene_object_sdf: UploadBuffer<SceneObjectSdfDescriptor>,
    /// Distance-field parameters of the meshes, packed.
    pub mesh_sdf: UploadBuffer<MeshSdfDescriptor>,
    /// Number of valid rows in `scene_object_sdf` this frame.
    pub scene_object_sdf_count: u32,
    /// Receives this frame's downsampled depth.
    pub depth_readback: ResourceId,
    /// Unjittered view-projection the readback was rendered with; `None` until the slot has been drawn.
    pub readback_view_proj: Option<Mat4>,
}

impl FrameResources {
    /// Creates every resource of one slot.
    pub fn new(backend: &mut dyn RenderBackend, sizes: &FrameResourceSizes) -> Result<Self, RenderError> {
        let command_allocator = backend.create_command_allocator()?;
        let depth_readback = backend.create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
            label: "depth_readback",
            size: u64::from(sizes.readback_texels) * std::mem::size_of::<f32>() as u64,
            usage: BufferUsage::Readback,
        }))?;
        Ok(Self {
            command_allocator,
            object_cb: UploadBuffer::new(backend, "object_constants", sizes.objects, true)?,
            material_buffer: UploadBuffer::new(backend, "material_buffer", sizes.materials, false)?,
            light_cb: UploadBuffer::new(backend, "light_constants", 1, true)?,
            pass_cb: UploadBuffer::new(backend, "pass_constants", 1, true)?,
            sky_cb: UploadBuffer::new(backend, "sky_constants", 1, true)?,
            scene_object_sdf: UploadBuffer::new(backend, "scene_object_sdf", sizes.objects, false)?,
            mesh_sdf: UploadBuffer::new(backend, "mesh_sdf", sizes.meshes.max(1), false)?,
            scene_object_sdf_count: 0,
            depth_readback,
            readback_view_proj: None,
        })
    }

    /// The buffer backing `kind` and its element stride.
    pub fn buffer(&self, kind: FrameBufferKind) -> (ResourceId, u64) {
        match kind {
            FrameBufferKind::Object => (self.object_cb.resource(), self.object_cb.stride()),
            FrameBufferKind::Material => (self.material_buffer.resource(), self.material_buffer.stride()),
            FrameBufferKind::Light => (self.light_cb.resource(), self.light_cb.stride()),
            FrameBufferKind::Pass => (self.pass_cb.resource(), self.pass_cb.stride()),
            FrameBufferKind::Sky => (self.sky_cb.resource(), self.sky_cb.stride()),
            FrameBufferKind::SceneObjectSdf => {
                (self.scene_object_sdf.resource(), self.scene_object_sdf.stride())
            }
            FrameBufferKind::MeshSdf => (self.mesh_sdf.resource(), self.mesh_sdf.stride()),
        }
    }

    /// Pushes every staged write to the GPU.
    pub fn flush(&mut self, backend: &mut dyn RenderBackend) -> Result<(), RenderError> {
        self.object_cb.flush(backend)?;
        self.material_buffer.flush(backend)?;
        self.light_cb.flush(backend)?;
        self.pass_cb.flush(backend)?;
        self.sky_cb.flush(backend)?;
        self.scene_object_sdf.flush(backend)?;
        self.mesh_sdf.flush(backend)
    }

    /// Releases every buffer. The caller has flushed the GPU.
    pub fn destroy(self, backend: &mut dyn RenderBackend) {
        self.object_cb.destroy(backend);
        self.material_buffer.destroy(backend);
        self.light_cb.destroy(backend);
        self.pass_cb.destroy(backend);
        self.sky_cb.destroy(backend);
        self.scene_object_sdf.destroy(backend);
        self.mesh_sdf.destroy(backend);
        backend.destroy_resource(self.depth_readback);
    }
}
