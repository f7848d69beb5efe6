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

//! A typed array of elements in a CPU-writable GPU buffer.

use crate::layouts::constant_buffer_byte_size;
use bytemuck::Pod;
use deferra_core::renderer::{BufferDescriptor, BufferUsage, RenderBackend, ResourceDescriptor, ResourceId};
use deferra_core::RenderError;
use std::marker::PhantomData;
use std::ops::Range;

/// A fixed-capacity array of `T` in an upload heap.
///
/// Writes land in a CPU staging copy and are pushed to the backend by
/// [`flush`](Self::flush) as one contiguous range. Constant-buffer elements are
/// padded to the 256-byte constant alignment; structured elements are packed.
pub struct UploadBuffer<T: Pod> {
    label: &'static str,
    resource: ResourceId,
    stride: u64,
    capacity: u32,
    staging: Vec<u8>,
    dirty: Option<Range<u64>>,
    _marker: PhantomData<T>,
}

impl<T: Pod> UploadBuffer<T> {
    /// Creates the buffer on `backend`.
    pub fn new(
        backend: &mut dyn RenderBackend,
        label: &'static str,
        capacity: u32,
        is_constant_buffer: bool,
    ) -> Result<Self, RenderError> {
        let element = std::mem::size_of::<T>() as u64;
        let stride = if is_constant_buffer {
            constant_buffer_byte_size(element)
        } else {
            element
        };
        let size = stride * u64::from(capacity.max(1));
        let resource = backend.create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
            label,
            size,
            usage: BufferUsage::Upload,
        }))?;
        Ok(Self {
            label,
            resource,
            stride,
            capacity,
            staging: vec![0; size as usize],
            dirty: None,
            _marker: PhantomData,
        })
    }

    /// The backing resource.
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Byte distance between elements.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Number of elements.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Byte offset of element `index`.
    pub fn element_offset(&self, index: u32) -> u64 {
        u64::from(index) * self.stride
    }

    /// Stores `value` at `index`.
    ///
    /// # Errors
    ///
    /// [`RenderError::PoolExhausted`] if `index` is outside the fixed capacity.
    pub fn copy_data(&mut self, index: u32, value: &T) -> Result<(), RenderError> {
        if index >= self.capacity {
            return Err(RenderError::PoolExhausted {
                pool: self.label,
                capacity: self.capacity,
            });
        }
        let start = self.element_offset(index);
        let bytes = bytemuck::bytes_of(value);
        let end = start + bytes.len() as u64;
        self.staging[start as usize..end as usize].copy_from_slice(bytes);
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(start)..range.end.max(end),
            None => start..end,
        });
        Ok(())
    }

    /// Reads back the staged value at `index`.
    pub fn get(&self, index: u32) -> Option<T> {
        if index >= self.capacity {
            return None;
        }
        let start = self.element_offset(index) as usize;
        let end = start + std::mem::size_of::<T>();
        Some(bytemuck::pod_read_unaligned(&self.staging[start..end]))
    }

    /// Returns `true` if writes are waiting for [`flush`](Self::flush).
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// Pushes the written range to the GPU buffer.
    pub fn flush(&mut self, backend: &mut dyn RenderBackend) -> Result<(), RenderError> {
        if let Some(range) = self.dirty.take() {
            let bytes = &self.staging[range.start as usize..range.end as usize];
            backend.write_buffer(self.resource, range.start, bytes)?;
        }
        Ok(())
    }

    /// Releases the backing resource.
    pub fn destroy(self, backend: &mut dyn RenderBackend) {
        backend.destroy_resource(self.resource);
    }
}

impl<T: Pod> std::fmt::Debug for UploadBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBuffer")
            .field("label", &self.label)
            .field("resource", &self.resource)
            .field("stride", &self.stride)
            .field("capacity", &self.capacity)
            .finish()
    }
}
