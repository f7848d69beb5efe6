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

//! Visibility culling lane.
//!
//! Frustum culling runs every frame. Occlusion culling runs when a depth
//! readback from an earlier frame has completed: the readback is reprojected
//! into the current view and tested through one [`OcclusionStrategy`].

mod culler;
mod frustum;
mod occlusion;
mod reprojection;

pub use self::culler::{VisibilityCuller, CULLED_LAYER};
pub use self::frustum::is_outside_frustum;
pub use self::occlusion::{DenseOcclusion, MaskedOcclusion, OcclusionStrategy, ScreenRect, MASK_TILE_SIZE};
pub use self::reprojection::{depth_from_readback, DepthHistory, ReprojectedDepthBuffer};
pub use deferra_core::thread_pool::{chunk_ranges, chunk_size};
