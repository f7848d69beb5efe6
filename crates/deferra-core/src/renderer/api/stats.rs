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

//! Per-frame counters reported for diagnostics.

use std::fmt;

/// Work recorded into one command list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStats {
    /// Pass regions opened.
    pub passes: u32,
    /// Resource-state barriers.
    pub barriers: u32,
    /// Indexed draws.
    pub draws: u32,
    /// Compute dispatches.
    pub dispatches: u32,
    /// Resource copies.
    pub copies: u32,
}

/// Visibility tallies produced by the culler's finalize stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Objects left visible.
    pub visible: u32,
    /// Objects rejected by the frustum test.
    pub frustum_culled: u32,
    /// Objects rejected by the occlusion test.
    pub occlusion_culled: u32,
}

impl CullStats {
    /// Total number of objects considered.
    pub fn total(&self) -> u32 {
        self.visible + self.frustum_culled + self.occlusion_culled
    }
}

impl fmt::Display for CullStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "visible {} / frustum-culled {} / occlusion-culled {}",
            self.visible, self.frustum_culled, self.occlusion_culled
        )
    }
}
