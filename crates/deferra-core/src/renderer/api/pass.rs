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

//! The closed set of GPU passes and the types a pass binds.

use super::descriptor::GpuDescriptorHandle;
use super::resource::ResourceId;
use crate::renderer::config::LightBinning;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Every pass of a frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassId {
    /// Geometry into the G-buffer.
    GBuffer,
    /// Compute downsample of depth for occlusion readback.
    DepthDownsample,
    /// Compute light assignment to tiles or clusters.
    TileCluster,
    /// Distance-field shadows in screen space.
    ScreenSpaceShadow,
    /// Deferred light accumulation.
    Light,
    /// Sky dome.
    Sky,
    /// Temporal anti-aliasing.
    Taa,
    /// Per-pixel motion blur.
    MotionBlur,
    /// Final composite into the back buffer.
    PostProcess,
    /// Optional overlay. Failure here is not fatal.
    Ui,
}

impl PassId {
    /// Number of passes.
    pub const COUNT: usize = 10;

    /// The fixed execution order.
    pub const SEQUENCE: [PassId; PassId::COUNT] = [
        PassId::GBuffer,
        PassId::DepthDownsample,
        PassId::TileCluster,
        PassId::ScreenSpaceShadow,
        PassId::Light,
        PassId::Sky,
        PassId::Taa,
        PassId::MotionBlur,
        PassId::PostProcess,
        PassId::Ui,
    ];

    /// Position of this pass in [`PassId::SEQUENCE`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The pass that follows this one, or `None` for the last pass.
    pub fn next(self) -> Option<PassId> {
        PassId::SEQUENCE.get(self.index() + 1).copied()
    }

    /// A stable, human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            PassId::GBuffer => "GBuffer",
            PassId::DepthDownsample => "DepthDownsample",
            PassId::TileCluster => "TileCluster",
            PassId::ScreenSpaceShadow => "ScreenSpaceShadow",
            PassId::Light => "Light",
            PassId::Sky => "Sky",
            PassId::Taa => "TAA",
            PassId::MotionBlur => "MotionBlur",
            PassId::PostProcess => "PostProcess",
            PassId::Ui => "UI",
        }
    }

    /// Whether the pass runs on the compute pipeline.
    pub const fn is_compute(self) -> bool {
        matches!(self, PassId::DepthDownsample | PassId::TileCluster)
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed-size table holding one value per pass, indexed by [`PassId`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerPass<T>([T; PassId::COUNT]);

impl<T> PerPass<T> {
    /// Builds the table by calling `f` once per pass, in sequence order.
    pub fn from_fn(mut f: impl FnMut(PassId) -> T) -> Self {
        Self(std::array::from_fn(|i| f(PassId::SEQUENCE[i])))
    }

    /// Iterates `(pass, value)` pairs in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = (PassId, &T)> {
        PassId::SEQUENCE.iter().copied().zip(self.0.iter())
    }
}

impl<T> Index<PassId> for PerPass<T> {
    type Output = T;
    fn index(&self, pass: PassId) -> &T {
        &self.0[pass.index()]
    }
}

impl<T> IndexMut<PassId> for PerPass<T> {
    fn index_mut(&mut self, pass: PassId) -> &mut T {
        &mut self.0[pass.index()]
    }
}

/// Shader set selector within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineVariant {
    /// The pass has a single shader set.
    Default,
    /// 2D tile light binning.
    Tiled,
    /// 3D cluster light binning.
    Clustered,
}

impl From<LightBinning> for PipelineVariant {
    fn from(binning: LightBinning) -> Self {
        match binning {
            LightBinning::Tiled => PipelineVariant::Tiled,
            LightBinning::Clustered => PipelineVariant::Clustered,
        }
    }
}

/// Identifies the pipeline state and root signature bound by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    /// Owning pass.
    pub pass: PassId,
    /// Shader set within the pass.
    pub variant: PipelineVariant,
}

impl PipelineKey {
    /// The default pipeline of `pass`.
    pub const fn of(pass: PassId) -> Self {
        Self {
            pass,
            variant: PipelineVariant::Default,
        }
    }
}

/// A rectangle of the render target that rasterization maps onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Depth range minimum.
    pub min_depth: f32,
    /// Depth range maximum.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering a `width` x `height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Pixels outside this rectangle are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge, inclusive.
    pub left: u32,
    /// Top edge, inclusive.
    pub top: u32,
    /// Right edge, exclusive.
    pub right: u32,
    /// Bottom edge, exclusive.
    pub bottom: u32,
}

impl ScissorRect {
    /// A scissor covering a `width` x `height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }
}

/// The per-frame upload buffers a frame slot owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameBufferKind {
    /// Per-object constants.
    Object,
    /// Material parameter table.
    Material,
    /// Light constants.
    Light,
    /// Per-pass camera constants.
    Pass,
    /// Sky pass constants.
    Sky,
    /// Distance-field descriptors of the scene objects.
    SceneObjectSdf,
    /// Distance-field descriptors of the meshes.
    MeshSdf,
}

/// A resolved root binding recorded into a command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Root constant-buffer view at `offset` bytes into `resource`.
    ConstantBuffer {
        /// Root parameter slot.
        slot: u32,
        /// The buffer.
        resource: ResourceId,
        /// Byte offset into it.
        offset: u64,
    },
    /// Root shader-resource view of a whole buffer.
    ShaderResource {
        /// Root parameter slot.
        slot: u32,
        /// The buffer.
        resource: ResourceId,
    },
    /// Descriptor table starting at `base`.
    DescriptorTable {
        /// Root parameter slot.
        slot: u32,
        /// GPU address of the first descriptor.
        base: GpuDescriptorHandle,
    },
    /// A 32-bit root constant.
    RootConstant {
        /// Root parameter slot.
        slot: u32,
        /// Value.
        value: u32,
    },
}
