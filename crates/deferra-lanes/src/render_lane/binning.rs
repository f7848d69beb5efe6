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

//! Screen-space light binning dimensions.

use deferra_core::renderer::LightBinning;

/// Tile edge in pixels for 2D binning.
pub const TILE_SIZE: u32 = 16;

/// Cluster edge in pixels for 3D binning.
pub const CLUSTER_SIZE: u32 = 64;

/// Depth slices per cluster column.
pub const CLUSTER_SLICES: u32 = 16;

/// View-space slice boundaries of the 16 cluster slices.
pub const DEPTH_SLICING_16: [f32; 17] = [
    1.0, 20.0, 29.7, 44.0, 65.3, 96.9, 143.7, 213.2, 316.2, 469.1, 695.9, 1032.4, 1531.5, 2272.0,
    3370.5, 5000.0, 50000.0,
];

/// Point lights one bin can reference.
pub const MAX_GRID_POINT_LIGHTS: u32 = 80;

/// Spot lights one bin can reference.
pub const MAX_GRID_SPOT_LIGHTS: u32 = 20;

/// Byte size of one bin's light list: both index arrays plus their counts.
pub const LIGHT_LIST_STRIDE: u32 = (MAX_GRID_POINT_LIGHTS + 1 + MAX_GRID_SPOT_LIGHTS + 1) * 4;

/// Threads per group edge of the depth downsample shader.
pub const DEPTH_DOWNSAMPLE_GROUP_SIZE: u32 = 8;

/// The light-bin grid for one surface size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightBinGrid {
    /// Bins across.
    pub x: u32,
    /// Bins down.
    pub y: u32,
    /// Depth slices; 1 for tiles.
    pub z: u32,
}

impl LightBinGrid {
    /// Computes the grid covering a `width` x `height` surface.
    pub fn new(binning: LightBinning, width: u32, height: u32) -> Self {
        match binning {
            LightBinning::Tiled => Self {
                x: width.div_ceil(TILE_SIZE),
                y: height.div_ceil(TILE_SIZE),
                z: 1,
            },
            LightBinning::Clustered => Self {
                x: width.div_ceil(CLUSTER_SIZE),
                y: height.div_ceil(CLUSTER_SIZE),
                z: CLUSTER_SLICES,
            },
        }
    }

    /// Number of light lists the binning buffer holds.
    pub fn element_count(&self) -> u32 {
        self.x * self.y * self.z
    }

    /// Byte size of the binning buffer.
    pub fn buffer_size(&self) -> u64 {
        u64::from(self.element_count()) * u64::from(LIGHT_LIST_STRIDE)
    }

    /// Thread groups of the binning dispatch. One group per screen bin; the
    /// shader walks the slices itself.
    pub fn dispatch(&self) -> (u32, u32, u32) {
        (self.x, self.y, 1)
    }
}

/// Slice holding view-space depth `z`, clamped to the first and last slice.
pub fn cluster_slice(z: f32) -> u32 {
    let upper = DEPTH_SLICING_16[1..].partition_point(|bound| *bound <= z);
    (upper as u32).min(CLUSTER_SLICES - 1)
}

/// Thread groups of the depth downsample dispatch.
pub fn depth_downsample_dispatch(width: u32, height: u32) -> (u32, u32, u32) {
    (
        width.div_ceil(DEPTH_DOWNSAMPLE_GROUP_SIZE),
        height.div_ceil(DEPTH_DOWNSAMPLE_GROUP_SIZE),
        1,
    )
}
