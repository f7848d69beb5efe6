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

//! Descriptor-table addressing and resource views.

use super::resource::ResourceId;
use std::fmt;

/// A slot in the flat, shader-visible descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorIndex(pub u32);

impl DescriptorIndex {
    /// The slot `offset` entries after this one.
    #[inline]
    pub const fn offset(self, offset: u32) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Display for DescriptorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// CPU-side address of a descriptor, used to write views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuDescriptorHandle(pub u64);

/// GPU-side address of a descriptor, used to bind tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuDescriptorHandle(pub u64);

/// Where a backend placed a descriptor heap and how its entries are spaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapLayout {
    /// CPU address of entry zero.
    pub cpu_base: u64,
    /// GPU address of entry zero.
    pub gpu_base: u64,
    /// Byte distance between consecutive entries.
    pub stride: u32,
    /// Number of entries.
    pub capacity: u32,
}

/// Read-only or read/write access through a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewAccess {
    /// Shader resource (read-only).
    ShaderResource,
    /// Unordered access (read/write).
    UnorderedAccess,
}

/// The shape a view presents the resource as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDimension {
    /// A 2D texture.
    Texture2d,
    /// A cubemap, optionally restricted to one mip.
    TextureCube {
        /// Most detailed mip visible through the view.
        mip: u32,
    },
    /// A 3D texture.
    Texture3d,
    /// A structured buffer.
    Buffer {
        /// Number of elements.
        element_count: u32,
        /// Byte size of one element.
        stride: u32,
    },
}

/// A view of a resource written into a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceView {
    /// The viewed resource.
    pub resource: ResourceId,
    /// Access mode.
    pub access: ViewAccess,
    /// View shape.
    pub dimension: ViewDimension,
}

impl ResourceView {
    /// A read-only 2D texture view.
    pub const fn texture(resource: ResourceId) -> Self {
        Self {
            resource,
            access: ViewAccess::ShaderResource,
            dimension: ViewDimension::Texture2d,
        }
    }

    /// A read/write 2D texture view.
    pub const fn storage_texture(resource: ResourceId) -> Self {
        Self {
            resource,
            access: ViewAccess::UnorderedAccess,
            dimension: ViewDimension::Texture2d,
        }
    }

    /// A read-only cubemap view starting at `mip`.
    pub const fn cube(resource: ResourceId, mip: u32) -> Self {
        Self {
            resource,
            access: ViewAccess::ShaderResource,
            dimension: ViewDimension::TextureCube { mip },
        }
    }

    /// A read-only volume texture view.
    pub const fn volume(resource: ResourceId) -> Self {
        Self {
            resource,
            access: ViewAccess::ShaderResource,
            dimension: ViewDimension::Texture3d,
        }
    }

    /// A structured buffer view.
    pub const fn buffer(resource: ResourceId, access: ViewAccess, element_count: u32, stride: u32) -> Self {
        Self {
            resource,
            access,
            dimension: ViewDimension::Buffer {
                element_count,
                stride,
            },
        }
    }
}
