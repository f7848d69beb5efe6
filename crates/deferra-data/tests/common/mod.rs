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

//! Shared doubles for the data crate's integration tests.

#![allow(dead_code)]

use deferra_core::renderer::{
    BackendInfo, BackendKind, CommandAllocatorId, CommandList, CpuDescriptorHandle,
    DescriptorHeapLayout, GpuFence, RenderBackend, ResourceDescriptor, ResourceId, ResourceView,
};
use deferra_core::RenderError;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// A fence driven by the test: values complete only when [`ManualFence::complete`] is called.
#[derive(Default)]
pub struct ManualFence {
    completed: Mutex<u64>,
    cond: Condvar,
    pub signaled: Mutex<Vec<u64>>,
    pub waits: Mutex<Vec<u64>>,
}

impl ManualFence {
    pub fn complete(&self, value: u64) {
        let mut completed = self.completed.lock().unwrap();
        *completed = (*completed).max(value);
        self.cond.notify_all();
    }
}

impl GpuFence for ManualFence {
    fn signal(&self, value: u64) -> Result<(), RenderError> {
        self.signaled.lock().unwrap().push(value);
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        *self.completed.lock().unwrap()
    }

    fn wait_for_value(&self, value: u64) -> Result<(), RenderError> {
        self.waits.lock().unwrap().push(value);
        let mut completed = self.completed.lock().unwrap();
        while *completed < value {
            completed = self.cond.wait(completed).unwrap();
        }
        Ok(())
    }
}

/// Records every call the data crate makes on a backend.
#[derive(Debug)]
pub struct RecordingBackend {
    next_id: u64,
    pub resources: HashMap<ResourceId, ResourceDescriptor>,
    pub buffer_writes: Vec<(ResourceId, u64, Vec<u8>)>,
    pub descriptors: HashMap<CpuDescriptorHandle, ResourceView>,
    pub destroyed: Vec<ResourceId>,
    pub heap_capacity: Option<u32>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            next_id: 1,
            resources: HashMap::new(),
            buffer_writes: Vec::new(),
            descriptors: HashMap::new(),
            destroyed: Vec::new(),
            heap_capacity: None,
        }
    }
}

impl RecordingBackend {
    pub const CPU_BASE: u64 = 0x1000;
    pub const GPU_BASE: u64 = 0x8000;
    pub const STRIDE: u32 = 32;
}

impl RenderBackend for RecordingBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Headless,
            adapter_name: "recording".to_string(),
        }
    }

    fn fence(&self) -> Arc<dyn GpuFence> {
        Arc::new(ManualFence::default())
    }

    fn create_descriptor_heap(&mut self, capacity: u32) -> Result<DescriptorHeapLayout, RenderError> {
        self.heap_capacity = Some(capacity);
        Ok(DescriptorHeapLayout {
            cpu_base: Self::CPU_BASE,
            gpu_base: Self::GPU_BASE,
            stride: Self::STRIDE,
            capacity,
        })
    }

    fn write_descriptor(&mut self, handle: CpuDescriptorHandle, view: &ResourceView) -> Result<(), RenderError> {
        self.descriptors.insert(handle, *view);
        Ok(())
    }

    fn create_resource(&mut self, descriptor: &ResourceDescriptor) -> Result<ResourceId, RenderError> {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.resources.insert(id, descriptor.clone());
        Ok(id)
    }

    fn destroy_resource(&mut self, resource: ResourceId) {
        self.resources.remove(&resource);
        self.destroyed.push(resource);
    }

    fn write_buffer(&mut self, buffer: ResourceId, offset: u64, data: &[u8]) -> Result<(), RenderError> {
        if !self.resources.contains_key(&buffer) {
            return Err(RenderError::InvalidHandle(buffer.to_string()));
        }
        self.buffer_writes.push((buffer, offset, data.to_vec()));
        Ok(())
    }

    fn read_buffer(&self, _buffer: ResourceId, _offset: u64, out: &mut [u8]) -> Result<(), RenderError> {
        out.fill(0);
        Ok(())
    }

    fn create_command_allocator(&mut self) -> Result<CommandAllocatorId, RenderError> {
        self.next_id += 1;
        Ok(CommandAllocatorId(self.next_id))
    }

    fn reset_command_allocator(&mut self, _allocator: CommandAllocatorId) -> Result<(), RenderError> {
        Ok(())
    }

    fn execute(&mut self, _allocator: CommandAllocatorId, _commands: &CommandList) -> Result<(), RenderError> {
        Ok(())
    }

    fn back_buffer(&self) -> ResourceId {
        ResourceId(0)
    }

    fn present(&mut self) -> Result<ResourceId, RenderError> {
        Ok(ResourceId(0))
    }

    fn resize_surface(&mut self, _width: u32, _height: u32) -> Result<(), RenderError> {
        Ok(())
    }
}
