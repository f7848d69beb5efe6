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

//! Hot-path strategies of the frame orchestration core.
//!
//! Each lane is a self-contained algorithm the orchestrating agent drives:
//! visibility culling, the declarative pass table, offline distance-field
//! baking and CPU picking. Lanes never own GPU objects; they read the
//! collaborator traits of `deferra-core` and return plain data.

#![warn(missing_docs)]

pub mod culling_lane;
pub mod picking_lane;
pub mod render_lane;
pub mod sdf_lane;

pub use culling_lane::{
    DenseOcclusion, DepthHistory, MaskedOcclusion, OcclusionStrategy, ReprojectedDepthBuffer,
    ScreenRect, VisibilityCuller,
};
pub use picking_lane::{pick, PickHit};
pub use render_lane::{PassBinding, PassDescriptor, PassTable, PassTransition, DrawScope};
pub use sdf_lane::{BakedSdf, SdfBaker};
