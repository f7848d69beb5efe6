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

//! Name-keyed registration of textures into the dynamic descriptor pool.

use deferra_core::renderer::{DescriptorIndex, RenderBackend, ResourceId, ResourceView};
use deferra_core::RenderError;
use deferra_data::{DescriptorTable, DynamicSlot};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Registered {
    resource: ResourceId,
    slot: DynamicSlot,
}

/// Maps texture names to their slot in the texture pool.
///
/// Materials reference textures by name; the registry turns those names into
/// pool-relative indices when the material buffer is filled.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    entries: HashMap<String, Registered>,
}

impl TextureRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resource` under `name`.
    ///
    /// A name that is already registered keeps its slot; only the view is
    /// rewritten, so materials referencing it stay valid. The resource it held
    /// before is returned when it differs from `resource`; the caller retires it.
    ///
    /// # Errors
    ///
    /// [`RenderError::PoolExhausted`] when the pool has no free slot left.
    pub fn register(
        &mut self,
        table: &mut DescriptorTable,
        backend: &mut dyn RenderBackend,
        name: &str,
        resource: ResourceId,
    ) -> Result<(DescriptorIndex, Option<ResourceId>), RenderError> {
        let previous = self.entries.get(name).copied();
        let mut slot = previous.map(|entry| entry.slot);
        let slot = table.register(backend, &mut slot, &ResourceView::texture(resource))?;
        self.entries.insert(name.to_owned(), Registered { resource, slot });
        let index = slot.index;
        match previous {
            Some(entry) if entry.resource != resource => {
                log::info!("Texture '{name}' re-registered at {index}, replacing {}", entry.resource);
                Ok((index, Some(entry.resource)))
            }
            Some(_) => {
                log::debug!("Texture '{name}' re-registered with the same resource at {index}");
                Ok((index, None))
            }
            None => {
                log::info!("Texture '{name}' registered at {index}");
                Ok((index, None))
            }
        }
    }

    /// Forgets `name` and returns its slot to the pool once the GPU passes `retire_after`.
    ///
    /// Returns the resource that was registered, which the caller destroys
    /// under the same fence rule.
    ///
    /// # Errors
    ///
    /// [`RenderError::MissingTexture`] when `name` is not registered.
    pub fn release(
        &mut self,
        table: &mut DescriptorTable,
        name: &str,
        retire_after: u64,
    ) -> Result<ResourceId, RenderError> {
        let entry = self
            .entries
            .remove(name)
            .ok_or_else(|| RenderError::MissingTexture(name.to_owned()))?;
        table.release_dynamic(entry.slot, retire_after)?;
        Ok(entry.resource)
    }

    /// Index of `name` relative to the pool base, as shaders address it.
    pub fn pool_index(&self, table: &DescriptorTable, name: &str) -> Option<u32> {
        self.entries
            .get(name)
            .and_then(|entry| table.pool_offset(entry.slot.index))
    }

    /// The descriptor slot of `name`.
    pub fn index(&self, name: &str) -> Option<DescriptorIndex> {
        self.entries.get(name).map(|entry| entry.slot.index)
    }

    /// Number of registered textures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
