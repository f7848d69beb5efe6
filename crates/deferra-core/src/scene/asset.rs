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

use super::{MaterialId, MeshId};
use crate::math::{Aabb, Vec2, Vec3, Vec4};
use crate::renderer::api::ResourceId;

/// A contiguous index range of a mesh drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submesh {
    /// Number of indices.
    pub index_count: u32,
    /// First index.
    pub start_index: u32,
    /// Offset added to each index.
    pub base_vertex: i32,
    /// Material used unless the object overrides it.
    pub material: MaterialId,
}

/// CPU copy of a mesh's triangles, kept for picking and distance-field baking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    /// Vertex positions in object space.
    pub positions: Vec<Vec3>,
    /// Triangle list indices into `positions`.
    pub indices: Vec<u32>,
}

impl MeshGeometry {
    /// Iterates the triangles as corner triples. Out-of-range indices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let a = *self.positions.get(tri[0] as usize)?;
            let b = *self.positions.get(tri[1] as usize)?;
            let c = *self.positions.get(tri[2] as usize)?;
            Some([a, b, c])
        })
    }

    /// Number of complete triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Where a mesh's baked signed distance field lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshSdf {
    /// Row of the field in the distance-field descriptor region.
    pub sdf_index: u32,
    /// Voxels per axis.
    pub resolution: u32,
    /// Half of the cube side covered by the field, in object units.
    pub half_extent: f32,
}

/// A GPU-resident mesh as seen by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAsset {
    /// Debug name.
    pub name: String,
    /// Object-space bounds used by the culler.
    pub bounds: Aabb,
    /// Vertex buffer.
    pub vertex_buffer: ResourceId,
    /// Index buffer.
    pub index_buffer: ResourceId,
    /// Draw ranges.
    pub submeshes: Vec<Submesh>,
    /// CPU triangles, when kept.
    pub geometry: Option<MeshGeometry>,
    /// Baked distance field, when present.
    pub sdf: Option<MeshSdf>,
}

/// Material parameters uploaded to the material buffer.
///
/// Texture entries are names resolved through the renderer's texture registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialAsset {
    /// Debug name.
    pub name: String,
    /// Row in the material buffer.
    pub id: MaterialId,
    /// Number of frame slots whose copy is stale.
    pub frames_dirty: u32,
    /// UV scale.
    pub texture_scale: Vec2,
    /// Names of the textures sampled, in shader order.
    pub textures: Vec<String>,
    /// Scalar parameters, in shader order.
    pub scalars: Vec<f32>,
    /// Vector parameters, in shader order.
    pub vectors: Vec<Vec4>,
}

impl MaterialAsset {
    /// A material with no parameters, dirty for `frames_dirty` slots.
    pub fn new(name: impl Into<String>, id: MaterialId, frames_dirty: u32) -> Self {
        Self {
            name: name.into(),
            id,
            frames_dirty,
            texture_scale: Vec2::ONE,
            textures: Vec::new(),
            scalars: Vec::new(),
            vectors: Vec::new(),
        }
    }
}

/// Access to meshes and materials.
pub trait AssetSource {
    /// Looks up a mesh.
    fn mesh(&self, id: MeshId) -> Option<&MeshAsset>;

    /// Number of materials.
    fn material_count(&self) -> usize;

    /// Mutable access to the material at position `index`.
    fn material_mut(&mut self, index: usize) -> Option<&mut MaterialAsset>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangles_skip_invalid_indices() {
        let geometry = MeshGeometry {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            indices: vec![0, 1, 2, 0, 1, 9, 0],
        };
        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.triangles().count(), 1);
    }
}
