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

//! Backend-agnostic resource handles, descriptions and state transitions.

use std::fmt;

/// An opaque handle to a backend resource (texture or buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// An opaque handle to a command allocator owned by one frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandAllocatorId(pub u64);

/// The usage state a resource is in from the GPU's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Freshly created, no particular usage.
    Common,
    /// Owned by the presentation engine.
    Present,
    /// Bound as a color attachment.
    RenderTarget,
    /// Bound as a writable depth/stencil attachment.
    DepthWrite,
    /// Readable by any shader stage. Passes return their outputs here.
    GenericRead,
    /// Bound for unordered read/write access from compute.
    UnorderedAccess,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy.
    CopyDest,
}

/// A request to move a resource from one state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The resource being transitioned.
    pub resource: ResourceId,
    /// The state the resource is currently in.
    pub from: ResourceState,
    /// The state the resource must be in afterwards.
    pub to: ResourceState,
}

impl Transition {
    /// Creates a new transition.
    pub const fn new(resource: ResourceId, from: ResourceState, to: ResourceState) -> Self {
        Self { resource, from, to }
    }

    /// The transition that undoes this one.
    pub const fn reversed(&self) -> Self {
        Self {
            resource: self.resource,
            from: self.to,
            to: self.from,
        }
    }
}

/// Pixel formats used by the orchestration core's targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, linear.
    Rgba8Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// 16-bit float RG.
    Rg16Float,
    /// Single 32-bit float channel.
    R32Float,
    /// Single 8-bit channel.
    R8Unorm,
    /// 32-bit float depth with 8-bit stencil.
    Depth32FloatStencil8,
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// A 2D texture.
    D2,
    /// A cubemap (six 2D faces).
    Cube,
    /// A 3D volume texture.
    D3,
}

/// How a texture will be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// Sampled only.
    Sampled,
    /// Color attachment, also sampled.
    RenderTarget,
    /// Depth/stencil attachment, also sampled.
    DepthStencil,
    /// Compute read/write, also sampled.
    Storage,
}

/// The value a target is cleared to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// A color clear.
    Color([f32; 4]),
    /// A depth/stencil clear.
    DepthStencil {
        /// Depth value.
        depth: f32,
        /// Stencil value.
        stencil: u8,
    },
}

/// Describes a texture to create.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// Debug label.
    pub label: &'static str,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth for 3D textures, 1 otherwise.
    pub depth: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Dimensionality.
    pub dimension: TextureDimension,
    /// Pixel format.
    pub format: TextureFormat,
    /// Binding usage.
    pub usage: TextureUsage,
    /// Optimized clear value, if any.
    pub clear: Option<ClearValue>,
}

impl TextureDescriptor {
    /// A single-mip 2D target of the given usage.
    pub fn target_2d(
        label: &'static str,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsage,
        clear: Option<ClearValue>,
    ) -> Self {
        Self {
            label,
            width,
            height,
            depth: 1,
            mip_levels: 1,
            dimension: TextureDimension::D2,
            format,
            usage,
            clear,
        }
    }
}

/// The heap a buffer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// CPU-writable, GPU-readable.
    Upload,
    /// GPU-only, with unordered access.
    Storage,
    /// GPU-writable, CPU-readable.
    Readback,
}

/// Describes a buffer to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Debug label.
    pub label: &'static str,
    /// Size in bytes.
    pub size: u64,
    /// Heap placement.
    pub usage: BufferUsage,
}

/// Either kind of resource description.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDescriptor {
    /// A texture.
    Texture(TextureDescriptor),
    /// A buffer.
    Buffer(BufferDescriptor),
}

impl ResourceDescriptor {
    /// The debug label of the described resource.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceDescriptor::Texture(t) => t.label,
            ResourceDescriptor::Buffer(b) => b.label,
        }
    }

    /// The state a resource of this description starts in.
    pub fn initial_state(&self) -> ResourceState {
        match self {
            ResourceDescriptor::Texture(t) => match t.usage {
                TextureUsage::DepthStencil => ResourceState::DepthWrite,
                _ => ResourceState::GenericRead,
            },
            ResourceDescriptor::Buffer(b) => match b.usage {
                BufferUsage::Upload => ResourceState::GenericRead,
                BufferUsage::Storage => ResourceState::GenericRead,
                BufferUsage::Readback => ResourceState::CopyDest,
            },
        }
    }
}
