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

//! The in-memory resource table of the headless backend.

use deferra_core::renderer::{
    BufferUsage, ResourceDescriptor, ResourceId, ResourceState, TextureDescriptor, Transition,
};
use deferra_core::RenderError;
use std::collections::HashMap;

#[derive(Debug)]
enum Storage {
    Texture(TextureDescriptor),
    Buffer { usage: BufferUsage, data: Vec<u8> },
}

#[derive(Debug)]
pub(crate) struct Entry {
    label: &'static str,
    storage: Storage,
    state: ResourceState,
}

impl Entry {
    fn kind(&self) -> &'static str {
        match &self.storage {
            Storage::Texture(_) => "texture",
            Storage::Buffer { usage: BufferUsage::Upload, .. } => "upload buffer",
            Storage::Buffer { usage: BufferUsage::Storage, .. } => "storage buffer",
            Storage::Buffer { usage: BufferUsage::Readback, .. } => "readback buffer",
        }
    }

    fn is_upload(&self) -> bool {
        matches!(self.storage, Storage::Buffer { usage: BufferUsage::Upload, .. })
    }

    fn bytes(&self) -> Result<&[u8], RenderError> {
        match &self.storage {
            Storage::Buffer { data, .. } => Ok(data),
            Storage::Texture(_) => Err(RenderError::CastMismatch {
                expected: "buffer",
                found: "texture",
            }),
        }
    }

    fn bytes_mut(&mut self) -> Result<&mut [u8], RenderError> {
        match &mut self.storage {
            Storage::Buffer { data, .. } => Ok(data),
            Storage::Texture(_) => Err(RenderError::CastMismatch {
                expected: "buffer",
                found: "texture",
            }),
        }
    }
}

fn byte_range(label: &str, size: usize, offset: u64, len: usize) -> Result<std::ops::Range<usize>, RenderError> {
    let start = offset as usize;
    let end = start + len;
    if end > size {
        return Err(RenderError::InvalidHandle(format!(
            "access of {len} bytes at {offset} overflows '{label}' ({size} bytes)"
        )));
    }
    Ok(start..end)
}

/// Every live resource, keyed by id.
#[derive(Debug)]
pub(crate) struct ResourceTable {
    entries: HashMap<ResourceId, Entry>,
    next_id: u64,
    fill: f32,
}

impl ResourceTable {
    /// An empty table. Storage and readback buffers start filled with `fill`.
    pub(crate) fn new(fill: f32) -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
            fill,
        }
    }

    pub(crate) fn create(&mut self, descriptor: &ResourceDescriptor) -> ResourceId {
        self.create_in_state(descriptor, descriptor.initial_state())
    }

    pub(crate) fn create_in_state(&mut self, descriptor: &ResourceDescriptor, state: ResourceState) -> ResourceId {
        let storage = match descriptor {
            ResourceDescriptor::Texture(texture) => Storage::Texture(texture.clone()),
            ResourceDescriptor::Buffer(buffer) => {
                let mut data = vec![0u8; buffer.size as usize];
                if buffer.usage != BufferUsage::Upload {
                    for texel in data.chunks_exact_mut(4) {
                        texel.copy_from_slice(bytemuck::bytes_of(&self.fill));
                    }
                }
                Storage::Buffer {
                    usage: buffer.usage,
                    data,
                }
            }
        };
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                label: descriptor.label(),
                storage,
                state,
            },
        );
        id
    }

    pub(crate) fn destroy(&mut self, id: ResourceId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn state(&self, id: ResourceId) -> Option<ResourceState> {
        self.entries.get(&id).map(|entry| entry.state)
    }

    fn get(&self, id: ResourceId) -> Result<&Entry, RenderError> {
        self.entries
            .get(&id)
            .ok_or_else(|| RenderError::InvalidHandle(format!("resource {id:?}")))
    }

    fn get_mut(&mut self, id: ResourceId) -> Result<&mut Entry, RenderError> {
        self.entries
            .get_mut(&id)
            .ok_or_else(|| RenderError::InvalidHandle(format!("resource {id:?}")))
    }

    /// Copies `data` into an upload buffer.
    pub(crate) fn write(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> Result<(), RenderError> {
        let entry = self.get_mut(id)?;
        if !entry.is_upload() {
            return Err(RenderError::CastMismatch {
                expected: "upload buffer",
                found: entry.kind(),
            });
        }
        let label = entry.label;
        let bytes = entry.bytes_mut()?;
        let range = byte_range(label, bytes.len(), offset, data.len())?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Copies out of a readback buffer.
    pub(crate) fn read(&self, id: ResourceId, offset: u64, out: &mut [u8]) -> Result<(), RenderError> {
        let entry = self.get(id)?;
        if !matches!(entry.storage, Storage::Buffer { usage: BufferUsage::Readback, .. }) {
            return Err(RenderError::CastMismatch {
                expected: "readback buffer",
                found: entry.kind(),
            });
        }
        let bytes = entry.bytes()?;
        let range = byte_range(entry.label, bytes.len(), offset, out.len())?;
        out.copy_from_slice(&bytes[range]);
        Ok(())
    }

    /// Applies a barrier whose `from` must match the tracked state.
    pub(crate) fn transition(&mut self, transition: &Transition) -> Result<(), RenderError> {
        let entry = self.get_mut(transition.resource)?;
        if entry.state != transition.from {
            return Err(RenderError::DeviceSubmissionFailure(format!(
                "barrier on '{}' expects {:?} but the resource is in {:?}",
                entry.label, transition.from, entry.state
            )));
        }
        entry.state = transition.to;
        Ok(())
    }

    /// Fails unless `id` is in `state`.
    pub(crate) fn expect_state(&self, id: ResourceId, state: ResourceState, usage: &str) -> Result<(), RenderError> {
        let entry = self.get(id)?;
        if entry.state != state {
            return Err(RenderError::DeviceSubmissionFailure(format!(
                "'{}' used as {usage} in {:?}, expected {state:?}",
                entry.label, entry.state
            )));
        }
        Ok(())
    }

    /// Performs a whole-resource copy. Buffer contents are copied; texture
    /// destinations only have their states checked.
    pub(crate) fn copy(&mut self, dst: ResourceId, src: ResourceId) -> Result<(), RenderError> {
        let source = self.get(src)?;
        if !source.is_upload() {
            self.expect_state(src, ResourceState::CopySource, "copy source")?;
        }
        self.expect_state(dst, ResourceState::CopyDest, "copy destination")?;

        let bytes = match &self.get(src)?.storage {
            Storage::Buffer { data, .. } => Some(data.clone()),
            Storage::Texture(_) => None,
        };
        if let (Some(bytes), Storage::Buffer { data, .. }) = (bytes, &mut self.get_mut(dst)?.storage) {
            let len = bytes.len().min(data.len());
            data[..len].copy_from_slice(&bytes[..len]);
        }
        Ok(())
    }

    /// Changes the size of a texture in place.
    pub(crate) fn resize_texture(&mut self, id: ResourceId, width: u32, height: u32) -> Result<(), RenderError> {
        match &mut self.get_mut(id)?.storage {
            Storage::Texture(texture) => {
                texture.width = width;
                texture.height = height;
                Ok(())
            }
            Storage::Buffer { .. } => Err(RenderError::CastMismatch {
                expected: "texture",
                found: "buffer",
            }),
        }
    }
}
