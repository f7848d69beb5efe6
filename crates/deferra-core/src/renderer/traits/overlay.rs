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

use crate::renderer::api::{CommandList, GpuDescriptorHandle, ResourceId};
use crate::renderer::error::RenderError;

/// An overlay drawn after post-processing, directly into the back buffer.
///
/// The overlay records into its own list; the scheduler splices it into the
/// frame only when [`record`](Self::record) succeeds, so a failing overlay
/// leaves the frame untouched.
pub trait UiOverlay: Send {
    /// Records the overlay's draws.
    ///
    /// ## Arguments
    ///
    /// * `commands` - An open list, already targeting `back_buffer`.
    /// * `back_buffer` - The render target.
    /// * `font_table` - The descriptor reserved for the overlay's font atlas.
    fn record(
        &mut self,
        commands: &mut CommandList,
        back_buffer: ResourceId,
        font_table: GpuDescriptorHandle,
    ) -> Result<(), RenderError>;
}
