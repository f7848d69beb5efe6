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

//! Declarations of the fixed pass sequence.
//!
//! The lane only describes passes: which resources each one transitions,
//! what it binds, what it clears and how it draws. Recording is the pass
//! scheduler's job in `deferra-agents`.

mod binning;
mod passes;
mod regions;

pub use self::binning::{
    cluster_slice, depth_downsample_dispatch, LightBinGrid, CLUSTER_SIZE, CLUSTER_SLICES,
    DEPTH_DOWNSAMPLE_GROUP_SIZE, DEPTH_SLICING_16, LIGHT_LIST_STRIDE, MAX_GRID_POINT_LIGHTS,
    MAX_GRID_SPOT_LIGHTS, TILE_SIZE,
};
pub use self::passes::{
    DispatchSize, DrawScope, PassBinding, PassDescriptor, PassResource, PassTable, PassTransition,
    RootValue,
};
pub use self::regions::{
    descriptor_regions, PerRegion, Region, RegionDecl, GBUFFER_COUNT, GBUFFER_VELOCITY,
    TAA_OUTPUT_OFFSET, UAV_OFFSET,
};
