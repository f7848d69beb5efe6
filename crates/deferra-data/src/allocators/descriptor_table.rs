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

//! The flat, shader-visible descriptor table.
//!
//! The table is laid out once, at build time:
//!
//! ```text
//!  0        1     2      3    5          9    11   12    13      16   17          N
//!  ┌────────┬─────┬──────┬────┬──────────┬────┬────┬─────┬───────┬────┬─────────┬───────┐
//!  │ ui     │ sky │depth │ dd │ gbuffer  │ tc │sss │light│ taa   │ mb │ texture │ sdf   │
//!  │        │     │      │    │          │    │    │     │       │    │ pool    │       │
//!  └────────┴─────┴──────┴────┴──────────┴────┴────┴─────┴───────┴────┴─────────┴───────┘
//!   static regions: prefix sums, fixed forever      dynamic pool: free list
//! ```
//!
//! Static regions are reserved through [`DescriptorTableBuilder`] in
//! declaration order. The heap only exists once the builder is consumed, so
//! no region can move after the table is built.

use deferra_core::renderer::{
    CpuDescriptorHandle, DescriptorHeapLayout, DescriptorIndex, GpuDescriptorHandle,
    RenderBackend, ResourceView,
};
use deferra_core::RenderError;
use std::collections::VecDeque;

/// A contiguous run of descriptor slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRange {
    /// Name given at reservation.
    pub label: &'static str,
    /// First slot.
    pub base: DescriptorIndex,
    /// Number of slots.
    pub count: u32,
}

impl DescriptorRange {
    /// The slot `offset` entries into the range, if it exists.
    pub fn at(&self, offset: u32) -> Option<DescriptorIndex> {
        (offset < self.count).then(|| self.base.offset(offset))
    }

    /// One past the last slot.
    pub fn end(&self) -> u32 {
        self.base.0 + self.count
    }

    /// Returns `true` if `index` falls inside the range.
    pub fn contains(&self, index: DescriptorIndex) -> bool {
        index.0 >= self.base.0 && index.0 < self.end()
    }

    /// Returns `true` if the two ranges share a slot.
    pub fn overlaps(&self, other: &DescriptorRange) -> bool {
        self.base.0 < other.end() && other.base.0 < self.end()
    }
}

/// A dynamic slot as held by one owner.
///
/// Releasing a slot bumps its generation, so a handle kept past its release
/// stops matching once the index is handed to another resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicSlot {
    /// The table index.
    pub index: DescriptorIndex,
    generation: u32,
}

impl DynamicSlot {
    /// How many times the index had been released when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Reserves regions before the heap exists.
#[derive(Debug, Default)]
pub struct DescriptorTableBuilder {
    cursor: u32,
    regions: Vec<DescriptorRange>,
    pool: Option<DescriptorRange>,
}

impl DescriptorTableBuilder {
    /// Starts an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `count` contiguous slots right after the previous region.
    pub fn reserve_static_region(&mut self, label: &'static str, count: u32) -> DescriptorRange {
        let range = DescriptorRange {
            label,
            base: DescriptorIndex(self.cursor),
            count,
        };
        self.cursor += count;
        self.regions.push(range);
        range
    }

    /// Reserves the dynamic pool. Slots inside it are handed out by
    /// [`DescriptorTable::allocate_dynamic`].
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidConfig`] if a pool was already reserved.
    pub fn reserve_dynamic_pool(&mut self, label: &'static str, capacity: u32) -> Result<DescriptorRange, RenderError> {
        if self.pool.is_some() {
            return Err(RenderError::InvalidConfig(
                "descriptor table already has a dynamic pool".to_string(),
            ));
        }
        let range = self.reserve_static_region(label, capacity);
        self.pool = Some(range);
        Ok(range)
    }

    /// Total slots reserved so far.
    pub fn capacity(&self) -> u32 {
        self.cursor
    }

    /// Creates the heap on `backend` and freezes the layout.
    pub fn build(self, backend: &mut dyn RenderBackend) -> Result<DescriptorTable, RenderError> {
        let layout = backend.create_descriptor_heap(self.cursor)?;
        log::info!(
            "Descriptor table built: {} slots in {} regions",
            self.cursor,
            self.regions.len()
        );
        Ok(DescriptorTable::from_parts(layout, self.regions, self.pool))
    }
}

#[derive(Debug)]
struct DynamicPool {
    range: DescriptorRange,
    free: VecDeque<u32>,
    live: Vec<bool>,
    generations: Vec<u32>,
    pending: Vec<(u32, u64)>,
}

impl DynamicPool {
    fn new(range: DescriptorRange) -> Self {
        Self {
            range,
            free: (0..range.count).collect(),
            live: vec![false; range.count as usize],
            generations: vec![0; range.count as usize],
            pending: Vec::new(),
        }
    }
}

/// The built descriptor table.
#[derive(Debug)]
pub struct DescriptorTable {
    layout: DescriptorHeapLayout,
    regions: Vec<DescriptorRange>,
    pool: DynamicPool,
}

impl DescriptorTable {
    fn from_parts(layout: DescriptorHeapLayout, regions: Vec<DescriptorRange>, pool: Option<DescriptorRange>) -> Self {
        let pool = pool.unwrap_or(DescriptorRange {
            label: "dynamic",
            base: DescriptorIndex(layout.capacity),
            count: 0,
        });
        Self {
            layout,
            regions,
            pool: DynamicPool::new(pool),
        }
    }

    /// The heap placement reported by the backend.
    pub fn layout(&self) -> DescriptorHeapLayout {
        self.layout
    }

    /// Every region, in reservation order.
    pub fn regions(&self) -> &[DescriptorRange] {
        &self.regions
    }

    /// Looks a region up by label.
    pub fn region(&self, label: &str) -> Option<&DescriptorRange> {
        self.regions.iter().find(|r| r.label == label)
    }

    /// The dynamic pool's range.
    pub fn dynamic_pool(&self) -> DescriptorRange {
        self.pool.range
    }

    /// CPU address of slot `index`: `cpu_base + index * stride`.
    pub fn index_to_cpu_handle(&self, index: DescriptorIndex) -> CpuDescriptorHandle {
        CpuDescriptorHandle(self.layout.cpu_base + u64::from(index.0) * u64::from(self.layout.stride))
    }

    /// GPU address of slot `index`: `gpu_base + index * stride`.
    pub fn index_to_gpu_handle(&self, index: DescriptorIndex) -> GpuDescriptorHandle {
        GpuDescriptorHandle(self.layout.gpu_base + u64::from(index.0) * u64::from(self.layout.stride))
    }

    /// Writes `view` into slot `index`.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidHandle`] if `index` lies outside the heap.
    pub fn write_view(&self, backend: &mut dyn RenderBackend, index: DescriptorIndex, view: &ResourceView) -> Result<(), RenderError> {
        if index.0 >= self.layout.capacity {
            return Err(RenderError::InvalidHandle(format!(
                "descriptor {index} outside a table of {}",
                self.layout.capacity
            )));
        }
        backend.write_descriptor(self.index_to_cpu_handle(index), view)
    }

    /// Takes the lowest free slot of the dynamic pool.
    ///
    /// # Errors
    ///
    /// [`RenderError::PoolExhausted`] when every slot is held.
    pub fn allocate_dynamic(&mut self) -> Result<DynamicSlot, RenderError> {
        let pool = &mut self.pool;
        let local = pool.free.pop_front().ok_or(RenderError::PoolExhausted {
            pool: pool.range.label,
            capacity: pool.range.count,
        })?;
        pool.live[local as usize] = true;
        Ok(DynamicSlot {
            index: pool.range.base.offset(local),
            generation: pool.generations[local as usize],
        })
    }

    /// Registers `view` for a resource that may already own a slot.
    ///
    /// When `slot` is still the current holder of its index the view is
    /// overwritten in place. A stale or empty `slot` gets a new slot, stored
    /// back into `slot`.
    pub fn register(
        &mut self,
        backend: &mut dyn RenderBackend,
        slot: &mut Option<DynamicSlot>,
        view: &ResourceView,
    ) -> Result<DynamicSlot, RenderError> {
        let held = match *slot {
            Some(held) if self.is_current(held) => held,
            Some(stale) => {
                log::debug!(
                    "Descriptor {} generation {} was released; allocating a new slot",
                    stale.index,
                    stale.generation
                );
                self.allocate_dynamic()?
            }
            None => self.allocate_dynamic()?,
        };
        self.write_view(backend, held.index, view)?;
        *slot = Some(held);
        Ok(held)
    }

    /// Returns `true` if `slot` still holds its index: live, and not released since it was issued.
    pub fn is_current(&self, slot: DynamicSlot) -> bool {
        self.pool_offset(slot.index)
            .map(|local| {
                let local = local as usize;
                self.pool.live[local] && self.pool.generations[local] == slot.generation
            })
            .unwrap_or(false)
    }

    /// Returns `true` if `index` is a dynamic slot currently held by a resource.
    pub fn is_live(&self, index: DescriptorIndex) -> bool {
        self.pool_offset(index)
            .map(|local| self.pool.live[local as usize])
            .unwrap_or(false)
    }

    /// Position of `index` inside the dynamic pool, as shaders index it.
    pub fn pool_offset(&self, index: DescriptorIndex) -> Option<u32> {
        self.pool
            .range
            .contains(index)
            .then(|| index.0 - self.pool.range.base.0)
    }

    /// Number of dynamic slots currently held.
    pub fn live_dynamic_count(&self) -> usize {
        self.pool.live.iter().filter(|live| **live).count()
    }

    /// Queues a dynamic slot for reuse once the GPU timeline passes `retire_after`.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidHandle`] if `slot` is not the current holder of a dynamic slot.
    pub fn release_dynamic(&mut self, slot: DynamicSlot, retire_after: u64) -> Result<(), RenderError> {
        if !self.is_current(slot) {
            return Err(RenderError::InvalidHandle(format!(
                "descriptor {} generation {} is not a live dynamic slot",
                slot.index, slot.generation
            )));
        }
        let Some(local) = self.pool_offset(slot.index) else {
            return Err(RenderError::InvalidHandle(format!("descriptor {} is outside the pool", slot.index)));
        };
        let local = local as usize;
        self.pool.live[local] = false;
        self.pool.generations[local] = self.pool.generations[local].wrapping_add(1);
        self.pool.pending.push((local as u32, retire_after));
        Ok(())
    }

    /// Returns released slots whose fence the GPU has passed to the free list.
    ///
    /// Returns the number of slots reclaimed.
    pub fn reclaim(&mut self, completed: u64) -> usize {
        let pool = &mut self.pool;
        let before = pool.free.len();
        pool.pending.retain(|&(local, fence)| {
            if fence <= completed {
                pool.free.push_back(local);
                false
            } else {
                true
            }
        });
        let reclaimed = pool.free.len() - before;
        if reclaimed > 0 {
            log::debug!("Reclaimed {reclaimed} descriptor slots at timeline value {completed}");
        }
        reclaimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pool: u32) -> DescriptorTable {
        let mut builder = DescriptorTableBuilder::new();
        builder.reserve_static_region("a", 2);
        builder.reserve_dynamic_pool("textures", pool).unwrap();
        let capacity = builder.capacity();
        DescriptorTable::from_parts(
            DescriptorHeapLayout {
                cpu_base: 1000,
                gpu_base: 5000,
                stride: 32,
                capacity,
            },
            builder.regions,
            builder.pool,
        )
    }

    #[test]
    fn test_static_regions_are_prefix_sums() {
        let mut builder = DescriptorTableBuilder::new();
        let counts = [1, 1, 1, 2, 4, 2, 1, 1, 3, 1, 7];
        let ranges: Vec<_> = counts
            .iter()
            .map(|&c| builder.reserve_static_region("r", c))
            .collect();
        let mut expected = 0;
        for (range, count) in ranges.iter().zip(counts) {
            assert_eq!(range.base.0, expected);
            expected += count;
        }
        assert_eq!(builder.capacity(), expected);
        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn test_handles_are_base_plus_stride() {
        let t = table(4);
        assert_eq!(t.index_to_cpu_handle(DescriptorIndex(3)), CpuDescriptorHandle(1000 + 96));
        assert_eq!(t.index_to_gpu_handle(DescriptorIndex(0)), GpuDescriptorHandle(5000));
    }

    #[test]
    fn test_dynamic_slots_are_unique_and_bounded() {
        let mut t = table(3);
        let a = t.allocate_dynamic().unwrap();
        let b = t.allocate_dynamic().unwrap();
        let c = t.allocate_dynamic().unwrap();
        assert_eq!((a.index.0, b.index.0, c.index.0), (2, 3, 4));
        assert_eq!(t.pool_offset(b.index), Some(1));
        assert_eq!(
            t.allocate_dynamic(),
            Err(RenderError::PoolExhausted {
                pool: "textures",
                capacity: 3
            })
        );
    }

    #[test]
    fn test_release_waits_for_fence() {
        let mut t = table(1);
        let a = t.allocate_dynamic().unwrap();
        t.release_dynamic(a, 7).unwrap();
        assert!(!t.is_live(a.index));
        assert_eq!(t.reclaim(6), 0);
        assert!(t.allocate_dynamic().is_err());
        assert_eq!(t.reclaim(7), 1);
        let again = t.allocate_dynamic().unwrap();
        assert_eq!(again.index, a.index);
        assert_eq!(again.generation(), a.generation() + 1);
    }

    #[test]
    fn test_stale_handle_does_not_touch_the_new_holder() {
        let mut t = table(1);
        let old = t.allocate_dynamic().unwrap();
        t.release_dynamic(old, 1).unwrap();
        t.reclaim(1);
        let new = t.allocate_dynamic().unwrap();
        assert_eq!(new.index, old.index);
        assert!(t.is_current(new));
        assert!(!t.is_current(old));
        assert!(matches!(t.release_dynamic(old, 2), Err(RenderError::InvalidHandle(_))));
        assert!(t.is_live(new.index));
    }

    #[test]
    fn test_double_release_is_rejected() {
        let mut t = table(2);
        let a = t.allocate_dynamic().unwrap();
        t.release_dynamic(a, 1).unwrap();
        assert!(matches!(t.release_dynamic(a, 1), Err(RenderError::InvalidHandle(_))));
        let outside = DynamicSlot {
            index: DescriptorIndex(0),
            generation: 0,
        };
        assert!(t.release_dynamic(outside, 1).is_err());
    }

    #[test]
    fn test_second_pool_is_rejected() {
        let mut builder = DescriptorTableBuilder::new();
        builder.reserve_dynamic_pool("a", 1).unwrap();
        assert!(builder.reserve_dynamic_pool("b", 1).is_err());
    }

    #[test]
    fn test_table_without_pool_is_exhausted() {
        let t = DescriptorTable::from_parts(
            DescriptorHeapLayout {
                cpu_base: 0,
                gpu_base: 0,
                stride: 1,
                capacity: 4,
            },
            Vec::new(),
            None,
        );
        let mut t = t;
        assert!(t.allocate_dynamic().is_err());
        assert!(!t.is_live(DescriptorIndex(0)));
    }
}
