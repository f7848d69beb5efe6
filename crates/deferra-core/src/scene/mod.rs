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

//! Collaborator contracts: the scene graph, the camera, assets and lights.
//!
//! The orchestration core owns none of these. It reads transforms, meshes
//! and materials through the traits below and writes back exactly one thing:
//! each object's [`CullState`].

mod asset;
mod camera;
mod light;

pub use self::asset::*;
pub use self::camera::Camera;
pub use self::light::{DirectionalLight, LightSet, PointLight};

use crate::math::Mat4;

/// Per-object visibility, rewritten by every culling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullState {
    /// Emitted by the draw stage.
    #[default]
    Visible,
    /// Entirely outside the camera frustum.
    FrustumCulled,
    /// Entirely hidden behind the previous frame's depth.
    OcclusionCulled,
}

impl CullState {
    /// Returns `true` for [`CullState::Visible`].
    #[inline]
    pub fn is_visible(self) -> bool {
        self == CullState::Visible
    }
}

/// The groups objects are drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    /// Opaque geometry written to the G-buffer. The only culled layer.
    Deferred,
    /// Full-screen quads used by the screen-space passes.
    ScreenQuad,
    /// The sky dome.
    Sky,
    /// Debug geometry.
    Debug,
}

impl RenderLayer {
    /// Every layer.
    pub const ALL: [RenderLayer; 4] = [
        RenderLayer::Deferred,
        RenderLayer::ScreenQuad,
        RenderLayer::Sky,
        RenderLayer::Debug,
    ];
}

/// Identifies a mesh asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Identifies a material; also its row in the material buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// One renderable object as seen by the core.
pub trait SceneObject: Send + Sync {
    /// Row of this object in the per-frame object constant buffer.
    fn object_index(&self) -> u32;

    /// Current object-to-world transform.
    fn transform(&self) -> Mat4;

    /// Object-to-world transform of the previous frame, for velocity.
    fn prev_transform(&self) -> Mat4;

    /// Texture-coordinate transform.
    fn tex_transform(&self) -> Mat4 {
        Mat4::IDENTITY
    }

    /// The mesh drawn for this object.
    fn mesh(&self) -> MeshId;

    /// A per-submesh material replacing the mesh's own.
    fn material_override(&self, _submesh: usize) -> Option<MaterialId> {
        None
    }

    /// Visibility decided by the last culling pass.
    fn cull_state(&self) -> CullState;

    /// Records the visibility decided by the culler.
    fn set_cull_state(&mut self, state: CullState);

    /// Number of frame slots whose copy of this object's constants is stale.
    fn frames_dirty(&self) -> u32;

    /// Notes that the current slot now holds fresh constants.
    fn mark_slot_updated(&mut self);
}

/// The layered object collection the core iterates.
pub trait SceneGraph {
    /// Number of objects in `layer`.
    fn object_count(&self, layer: RenderLayer) -> usize;

    /// The object at `index` within `layer`.
    fn object(&self, layer: RenderLayer, index: usize) -> Option<&dyn SceneObject>;

    /// Mutable access to the object at `index` within `layer`.
    fn object_mut(&mut self, layer: RenderLayer, index: usize) -> Option<&mut dyn SceneObject>;

    /// Calls `f` for each object of `layer`, in order.
    fn for_each(&self, layer: RenderLayer, f: &mut dyn FnMut(&dyn SceneObject)) {
        for i in 0..self.object_count(layer) {
            if let Some(object) = self.object(layer, i) {
                f(object);
            }
        }
    }

    /// Calls `f` for each object of `layer` with mutable access, in order.
    fn for_each_mut(&mut self, layer: RenderLayer, f: &mut dyn FnMut(&mut dyn SceneObject)) {
        for i in 0..self.object_count(layer) {
            if let Some(object) = self.object_mut(layer, i) {
                f(object);
            }
        }
    }
}
