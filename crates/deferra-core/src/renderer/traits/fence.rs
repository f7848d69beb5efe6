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

use crate::renderer::error::RenderError;

/// A monotonic GPU fence living on the submission queue.
///
/// Only [`GpuTimeline`](crate::renderer::GpuTimeline) talks to a fence; the
/// rest of the core reasons in terms of timeline values.
pub trait GpuFence: Send + Sync {
    /// Enqueues a GPU-side signal that sets the fence to `value` once every
    /// previously submitted command list has completed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DeviceSubmissionFailure`] if the queue rejects the signal.
    fn signal(&self, value: u64) -> Result<(), RenderError>;

    /// The last value the GPU has reached.
    fn completed_value(&self) -> u64;

    /// Blocks the calling thread until [`completed_value`](Self::completed_value)
    /// is at least `value`. There is no timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DeviceSubmissionFailure`] if the device is lost while waiting.
    fn wait_for_value(&self, value: u64) -> Result<(), RenderError>;
}
