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

//! The ring of frame slots that bounds how far the CPU may run ahead.
//!
//! # Ring layout (N = 3)
//!
//! ```text
//!  frame:    0        1        2        3 (reuses slot 0)
//!         ┌──────┐ ┌──────┐ ┌──────┐
//!         │slot 0│ │slot 1│ │slot 2│   acquire_next() waits until
//!         │fence1│ │fence2│ │fence3│   GPU.completed >= slot0.fence (1)
//!         └──────┘ └──────┘ └──────┘
//! ```
//!
//! [`FrameRing::acquire_next`] is the only place the frame loop blocks on the GPU.

use deferra_core::{GpuTimeline, RenderError};

/// One entry of the ring: per-frame resources plus the timeline value that
/// marks the end of their last GPU use.
#[derive(Debug)]
pub struct FrameSlot<T> {
    index: usize,
    fence_value: u64,
    resources: T,
}

impl<T> FrameSlot<T> {
    /// Position of the slot in the ring.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Timeline value recorded at the slot's last submission; `0` if never submitted.
    pub fn fence_value(&self) -> u64 {
        self.fence_value
    }

    /// The slot's resources.
    pub fn resources(&self) -> &T {
        &self.resources
    }

    /// Mutable access to the slot's resources.
    pub fn resources_mut(&mut self) -> &mut T {
        &mut self.resources
    }
}

/// A fixed ring of `N` frame slots.
#[derive(Debug)]
pub struct FrameRing<T> {
    slots: Vec<FrameSlot<T>>,
    current: usize,
}

impl<T> FrameRing<T> {
    /// Builds a ring from one resource set per slot.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidConfig`] if `resources` is empty.
    pub fn new(resources: Vec<T>) -> Result<Self, RenderError> {
        if resources.is_empty() {
            return Err(RenderError::InvalidConfig(
                "a frame ring needs at least one slot".to_string(),
            ));
        }
        let slots: Vec<_> = resources
            .into_iter()
            .enumerate()
            .map(|(index, resources)| FrameSlot {
                index,
                fence_value: 0,
                resources,
            })
            .collect();
        // The first acquire lands on slot 0.
        let current = slots.len() - 1;
        Ok(Self { slots, current })
    }

    /// Builds a ring of `count` slots, creating each slot's resources with `make`.
    pub fn from_fn<E>(count: usize, make: impl FnMut(usize) -> Result<T, E>) -> Result<Self, E>
    where
        E: From<RenderError>,
    {
        let resources = (0..count).map(make).collect::<Result<Vec<_>, E>>()?;
        Ok(Self::new(resources)?)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; a ring has at least one slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Advances to the next slot, waiting for the GPU to release it first.
    ///
    /// The wait happens only when the slot was submitted before and the GPU
    /// has not yet reached its fence value, that is when the CPU has wrapped
    /// the whole ring ahead of the GPU.
    pub fn acquire_next(&mut self, timeline: &GpuTimeline) -> Result<&mut FrameSlot<T>, RenderError> {
        self.current = (self.current + 1) % self.slots.len();
        let slot = &mut self.slots[self.current];
        if slot.fence_value != 0 && !timeline.is_complete(slot.fence_value) {
            log::trace!(
                "Frame slot {} busy until timeline value {}, waiting",
                slot.index,
                slot.fence_value
            );
            timeline.wait_until(slot.fence_value)?;
        }
        Ok(slot)
    }

    /// The slot handed out by the last [`acquire_next`](Self::acquire_next).
    pub fn current(&self) -> &FrameSlot<T> {
        &self.slots[self.current]
    }

    /// Mutable access to the current slot.
    pub fn current_mut(&mut self) -> &mut FrameSlot<T> {
        &mut self.slots[self.current]
    }

    /// Records the timeline value of the submission that used slot `index`.
    pub fn retire(&mut self, index: usize, fence_value: u64) {
        if let Some(slot) = self.slots.get_mut(index) {
            debug_assert!(fence_value >= slot.fence_value, "fence values only increase");
            slot.fence_value = fence_value;
        }
    }

    /// Iterates every slot.
    pub fn slots(&self) -> impl Iterator<Item = &FrameSlot<T>> {
        self.slots.iter()
    }

    /// Iterates every slot mutably. Only safe to touch GPU-visible data after a flush.
    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut FrameSlot<T>> {
        self.slots.iter_mut()
    }
}
