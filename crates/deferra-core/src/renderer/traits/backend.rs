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

use super::fence::GpuFence;
use crate::renderer::api::{
    CommandAllocatorId, CommandList, CpuDescriptorHandle, DescriptorHeapLayout, PerPass,
    ResourceDescriptor, ResourceId, ResourceView,
};
use crate::renderer::error::RenderError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The family of graphics API a backend drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// No GPU; commands are accounted for and completed on a queue thread.
    Headless,
    /// Direct3D 12.
    Direct3D12,
    /// Vulkan.
    Vulkan,
    /// Metal.
    Metal,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Headless => "Headless",
            BackendKind::Direct3D12 => "Direct3D 12",
            BackendKind::Vulkan => "Vulkan",
            BackendKind::Metal => "Metal",
        };
        f.write_str(name)
    }
}

/// Describes the backend behind a [`RenderBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    /// The API family.
    pub kind: BackendKind,
    /// Adapter or implementation name.
    pub adapter_name: String,
}

/// The capability interface the orchestration core renders through.
///
/// The core is written only against this trait: it never needs to recover
/// the concrete backend type behind a handle. Implementations own every
/// native object and hand out opaque ids.
pub trait RenderBackend: Send + fmt::Debug {
    /// Describes this backend.
    fn info(&self) -> BackendInfo;

    /// The fence on the submission queue.
    fn fence(&self) -> Arc<dyn GpuFence>;

    /// Creates the single shader-visible descriptor heap.
    ///
    /// ## Arguments
    ///
    /// * `capacity` - Total number of descriptors, static regions and pools included.
    ///
    /// ## Returns
    ///
    /// The heap's base addresses and entry stride.
    fn create_descriptor_heap(&mut self, capacity: u32) -> Result<DescriptorHeapLayout, RenderError>;

    /// Writes a view into the descriptor at `handle`, overwriting any previous view.
    fn write_descriptor(&mut self, handle: CpuDescriptorHandle, view: &ResourceView) -> Result<(), RenderError>;

    /// Creates a texture or buffer.
    fn create_resource(&mut self, descriptor: &ResourceDescriptor) -> Result<ResourceId, RenderError>;

    /// Releases a resource. The caller guarantees no in-flight frame references it.
    fn destroy_resource(&mut self, resource: ResourceId);

    /// Copies `data` into an upload buffer at `offset`.
    ///
    /// ## Errors
    ///
    /// Returns [`RenderError::CastMismatch`] if `buffer` is not a CPU-writable
    /// buffer, or [`RenderError::InvalidHandle`] if it does not exist.
    fn write_buffer(&mut self, buffer: ResourceId, offset: u64, data: &[u8]) -> Result<(), RenderError>;

    /// Copies the contents of a readback buffer at `offset` into `out`.
    fn read_buffer(&self, buffer: ResourceId, offset: u64, out: &mut [u8]) -> Result<(), RenderError>;

    /// Creates a command allocator.
    fn create_command_allocator(&mut self) -> Result<CommandAllocatorId, RenderError>;

    /// Recycles an allocator's memory. Only legal once the GPU finished the
    /// work recorded from it.
    fn reset_command_allocator(&mut self, allocator: CommandAllocatorId) -> Result<(), RenderError>;

    /// Translates and submits a command list recorded against `allocator`.
    fn execute(&mut self, allocator: CommandAllocatorId, commands: &CommandList) -> Result<(), RenderError>;

    /// The back buffer the next frame renders into.
    fn back_buffer(&self) -> ResourceId;

    /// Presents the current back buffer and returns the next writable one.
    fn present(&mut self) -> Result<ResourceId, RenderError>;

    /// Resizes the swap chain. The caller has flushed the GPU beforehand.
    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    /// GPU time spent in each pass of the newest completed frame.
    ///
    /// `None` until a frame has completed, or when the backend takes no
    /// timestamps.
    fn pass_timings(&self) -> Option<PerPass<Duration>> {
        None
    }
}
