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

use super::queue::{send, QueueMessage, QueueState};
use crossbeam_channel::Sender;
use deferra_core::renderer::GpuFence;
use deferra_core::RenderError;
use std::fmt;
use std::sync::Arc;

/// The fence of the headless queue. Signals are enqueued behind submitted work,
/// so values complete in submission order.
pub struct HeadlessFence {
    sender: Sender<QueueMessage>,
    state: Arc<QueueState>,
}

impl HeadlessFence {
    pub(crate) fn new(sender: Sender<QueueMessage>, state: Arc<QueueState>) -> Self {
        Self { sender, state }
    }
}

impl GpuFence for HeadlessFence {
    fn signal(&self, value: u64) -> Result<(), RenderError> {
        send(&self.sender, QueueMessage::Signal(value))
    }

    fn completed_value(&self) -> u64 {
        self.state.completed_fence()
    }

    fn wait_for_value(&self, value: u64) -> Result<(), RenderError> {
        self.state.wait_for_fence(value)
    }
}

impl fmt::Debug for HeadlessFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessFence")
            .field("completed", &self.state.completed_fence())
            .finish()
    }
}
