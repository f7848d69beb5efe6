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

//! A [`RenderBackend`] that runs without a GPU.
//!
//! Command lists are validated against an in-memory resource table as they
//! are submitted: every barrier must start from the state the resource is
//! actually in, attachments must be in their attachment states, and copies
//! must go from `CopySource` to `CopyDest`. Completion is simulated by a
//! queue thread, so fences and allocator reuse behave as they would on a
//! real device.

use super::fence::HeadlessFence;
use super::queue::Queue;
use super::resources::ResourceTable;
use super::timings::{simulate_pass_times, PassTimeline};
use deferra_core::renderer::{
    BackendInfo, BackendKind, Command, CommandAllocatorId, CommandList, CommandStats, CpuDescriptorHandle,
    DescriptorHeapLayout, GpuFence, PerPass, RenderBackend, ResourceDescriptor, ResourceId, ResourceState,
    ResourceView, TextureDescriptor, TextureFormat, TextureUsage,
};
use deferra_core::RenderError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// CPU address of the first descriptor.
pub const HEAP_CPU_BASE: u64 = 0x1000_0000;
/// GPU address of the first descriptor.
pub const HEAP_GPU_BASE: u64 = 0x8000_0000_0000;
/// Byte distance between descriptors.
pub const HEAP_STRIDE: u32 = 32;

const SWAP_IMAGE_COUNT: usize = 2;

/// Construction parameters of a [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessConfig {
    /// Initial swap-chain width.
    pub width: u32,
    /// Initial swap-chain height.
    pub height: u32,
    /// Time the queue thread spends on each command list.
    pub latency: Duration,
    /// Value storage and readback buffers are filled with at creation.
    pub depth_clear: f32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            latency: Duration::ZERO,
            depth_clear: 0.0,
        }
    }
}

impl HeadlessConfig {
    /// A configuration with the given swap-chain size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Sets the simulated per-submission latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the value new storage and readback buffers hold.
    pub fn with_depth_clear(mut self, depth_clear: f32) -> Self {
        self.depth_clear = depth_clear;
        self
    }
}

/// Counters accumulated by a [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Command lists executed.
    pub submissions: u64,
    /// Successful presents.
    pub presents: u64,
    /// Work recorded across every executed list.
    pub commands: CommandStats,
    /// Work recorded in the last executed list.
    pub last_submission: CommandStats,
    /// Resources currently alive, swap images included.
    pub live_resources: usize,
    /// Descriptors written.
    pub descriptor_writes: u64,
}

/// A shared view of the counters, usable after the backend moved into a renderer.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle(Arc<Mutex<HeadlessStats>>);

impl StatsHandle {
    /// A copy of the current counters.
    pub fn snapshot(&self) -> HeadlessStats {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut HeadlessStats)) {
        let mut stats = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }
}

#[derive(Debug)]
struct DescriptorHeap {
    views: Vec<Option<ResourceView>>,
}

/// The headless backend.
pub struct HeadlessBackend {
    queue: Queue,
    fence: Arc<HeadlessFence>,
    resources: ResourceTable,
    heap: Option<DescriptorHeap>,
    allocators: HashMap<CommandAllocatorId, u64>,
    next_allocator: u64,
    submissions: u64,
    latency: Duration,
    pass_times: PassTimeline,
    swap_images: [ResourceId; SWAP_IMAGE_COUNT],
    current_image: usize,
    size: (u32, u32),
    stats: StatsHandle,
}

impl HeadlessBackend {
    /// Starts the queue thread and creates the swap images.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidConfig`] for a zero-sized surface, or
    /// [`RenderError::DeviceSubmissionFailure`] if the queue thread cannot start.
    pub fn new(config: HeadlessConfig) -> Result<Self, RenderError> {
        if config.width == 0 || config.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "headless surface must not be empty, got {}x{}",
                config.width, config.height
            )));
        }
        let queue = Queue::spawn(config.latency)?;
        let fence = Arc::new(HeadlessFence::new(queue.sender(), Arc::clone(queue.state())));
        let mut resources = ResourceTable::new(config.depth_clear);
        let swap_image = ResourceDescriptor::Texture(TextureDescriptor::target_2d(
            "back_buffer",
            config.width,
            config.height,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RenderTarget,
            None,
        ));
        let swap_images = [
            resources.create_in_state(&swap_image, ResourceState::Present),
            resources.create_in_state(&swap_image, ResourceState::Present),
        ];
        let stats = StatsHandle::default();
        stats.update(|s| s.live_resources = resources.len());
        log::info!(
            "Headless backend ready: {}x{}, {:?} per submission",
            config.width,
            config.height,
            config.latency
        );
        Ok(Self {
            queue,
            fence,
            resources,
            heap: None,
            allocators: HashMap::new(),
            next_allocator: 1,
            submissions: 0,
            latency: config.latency,
            pass_times: PassTimeline::default(),
            swap_images,
            current_image: 0,
            size: (config.width, config.height),
            stats,
        })
    }

    /// A handle on the counters that outlives moving the backend.
    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// The tracked state of `resource`, if it is alive.
    pub fn resource_state(&self, resource: ResourceId) -> Option<ResourceState> {
        self.resources.state(resource)
    }

    /// The view last written at heap entry `index`.
    pub fn descriptor(&self, index: u32) -> Option<ResourceView> {
        self.heap
            .as_ref()
            .and_then(|heap| heap.views.get(index as usize).copied().flatten())
    }

    /// Current swap-chain size.
    pub fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn heap_index(&self, handle: CpuDescriptorHandle) -> Result<usize, RenderError> {
        let capacity = self.heap.as_ref().map_or(0, |heap| heap.views.len() as u64);
        let offset = handle
            .0
            .checked_sub(HEAP_CPU_BASE)
            .filter(|offset| offset % u64::from(HEAP_STRIDE) == 0)
            .map(|offset| offset / u64::from(HEAP_STRIDE))
            .filter(|index| *index < capacity);
        offset
            .map(|index| index as usize)
            .ok_or_else(|| RenderError::InvalidHandle(format!("descriptor handle {:#x}", handle.0)))
    }

    fn validate(&mut self, command: &Command) -> Result<(), RenderError> {
        match command {
            Command::Transition(transition) => self.resources.transition(transition),
            Command::SetRenderTargets { colors, depth } => {
                for color in colors {
                    self.resources
                        .expect_state(*color, ResourceState::RenderTarget, "color attachment")?;
                }
                match depth {
                    Some(depth) => self
                        .resources
                        .expect_state(*depth, ResourceState::DepthWrite, "depth attachment"),
                    None => Ok(()),
                }
            }
            Command::ClearRenderTarget { target, .. } => {
                self.resources
                    .expect_state(*target, ResourceState::RenderTarget, "cleared color target")
            }
            Command::ClearDepthStencil { target, .. } => {
                self.resources
                    .expect_state(*target, ResourceState::DepthWrite, "cleared depth target")
            }
            Command::CopyResource { dst, src } => self.resources.copy(*dst, *src),
            _ => Ok(()),
        }
    }
}

impl RenderBackend for HeadlessBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Headless,
            adapter_name: "Deferra headless queue".to_string(),
        }
    }

    fn fence(&self) -> Arc<dyn GpuFence> {
        self.fence.clone()
    }

    fn create_descriptor_heap(&mut self, capacity: u32) -> Result<DescriptorHeapLayout, RenderError> {
        if self.heap.is_some() {
            return Err(RenderError::InvalidConfig(
                "the descriptor heap was already created".to_string(),
            ));
        }
        self.heap = Some(DescriptorHeap {
            views: vec![None; capacity as usize],
        });
        log::debug!("Created a descriptor heap of {capacity} entries");
        Ok(DescriptorHeapLayout {
            cpu_base: HEAP_CPU_BASE,
            gpu_base: HEAP_GPU_BASE,
            stride: HEAP_STRIDE,
            capacity,
        })
    }

    fn write_descriptor(&mut self, handle: CpuDescriptorHandle, view: &ResourceView) -> Result<(), RenderError> {
        let index = self.heap_index(handle)?;
        if !self.resources.contains(view.resource) {
            return Err(RenderError::InvalidHandle(format!(
                "descriptor {index} views destroyed resource {}",
                view.resource
            )));
        }
        if let Some(heap) = self.heap.as_mut() {
            heap.views[index] = Some(*view);
        }
        self.stats.update(|s| s.descriptor_writes += 1);
        Ok(())
    }

    fn create_resource(&mut self, descriptor: &ResourceDescriptor) -> Result<ResourceId, RenderError> {
        let id = self.resources.create(descriptor);
        log::trace!("Created '{}' as {id}", descriptor.label());
        let live = self.resources.len();
        self.stats.update(|s| s.live_resources = live);
        Ok(id)
    }

    fn destroy_resource(&mut self, resource: ResourceId) {
        if !self.resources.destroy(resource) {
            log::warn!("Destroying unknown resource {resource}");
        }
        let live = self.resources.len();
        self.stats.update(|s| s.live_resources = live);
    }

    fn write_buffer(&mut self, buffer: ResourceId, offset: u64, data: &[u8]) -> Result<(), RenderError> {
        self.resources.write(buffer, offset, data)
    }

    fn read_buffer(&self, buffer: ResourceId, offset: u64, out: &mut [u8]) -> Result<(), RenderError> {
        self.resources.read(buffer, offset, out)
    }

    fn create_command_allocator(&mut self) -> Result<CommandAllocatorId, RenderError> {
        let id = CommandAllocatorId(self.next_allocator);
        self.next_allocator += 1;
        self.allocators.insert(id, 0);
        Ok(id)
    }

    fn reset_command_allocator(&mut self, allocator: CommandAllocatorId) -> Result<(), RenderError> {
        let last = *self
            .allocators
            .get(&allocator)
            .ok_or_else(|| RenderError::InvalidHandle(format!("{allocator:?}")))?;
        let completed = self.queue.state().completed_submissions();
        if last > completed {
            return Err(RenderError::DeviceSubmissionFailure(format!(
                "{allocator:?} reset while submission {last} is in flight (completed {completed})"
            )));
        }
        Ok(())
    }

    fn execute(&mut self, allocator: CommandAllocatorId, commands: &CommandList) -> Result<(), RenderError> {
        if !self.allocators.contains_key(&allocator) {
            return Err(RenderError::InvalidHandle(format!("{allocator:?}")));
        }
        for command in commands.commands() {
            self.validate(command)?;
        }

        self.submissions += 1;
        let submission = self.submissions;
        self.allocators.insert(allocator, submission);
        self.pass_times.resolve(self.queue.state().completed_submissions());
        if let Some(times) = simulate_pass_times(commands, self.latency) {
            self.pass_times.push(submission, times);
        }
        self.queue.submit(submission)?;

        let recorded = commands.stats();
        self.stats.update(|s| {
            s.submissions += 1;
            s.last_submission = recorded;
            s.commands.passes += recorded.passes;
            s.commands.barriers += recorded.barriers;
            s.commands.draws += recorded.draws;
            s.commands.dispatches += recorded.dispatches;
            s.commands.copies += recorded.copies;
        });
        log::trace!("Submission {submission}: {} commands", commands.len());
        Ok(())
    }

    fn back_buffer(&self) -> ResourceId {
        self.swap_images[self.current_image]
    }

    fn present(&mut self) -> Result<ResourceId, RenderError> {
        let image = self.back_buffer();
        self.resources
            .expect_state(image, ResourceState::Present, "presented image")?;
        self.current_image = (self.current_image + 1) % SWAP_IMAGE_COUNT;
        self.stats.update(|s| s.presents += 1);
        Ok(self.back_buffer())
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let completed = self.queue.state().completed_submissions();
        if completed < self.submissions {
            return Err(RenderError::DeviceSubmissionFailure(format!(
                "surface resized with {} submissions in flight",
                self.submissions - completed
            )));
        }
        for image in self.swap_images {
            self.resources.resize_texture(image, width, height)?;
        }
        self.size = (width, height);
        log::debug!("Headless surface resized to {width}x{height}");
        Ok(())
    }

    fn pass_timings(&self) -> Option<PerPass<Duration>> {
        self.pass_times
            .latest(self.queue.state().completed_submissions())
    }
}

impl fmt::Debug for HeadlessBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessBackend")
            .field("size", &self.size)
            .field("resources", &self.resources.len())
            .field("submissions", &self.submissions)
            .field("current_image", &self.current_image)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferra_core::renderer::{BufferDescriptor, BufferUsage, Transition};

    fn backend() -> HeadlessBackend {
        HeadlessBackend::new(HeadlessConfig::new(64, 32)).unwrap()
    }

    fn target(backend: &mut HeadlessBackend) -> ResourceId {
        backend
            .create_resource(&ResourceDescriptor::Texture(TextureDescriptor::target_2d(
                "color",
                64,
                32,
                TextureFormat::Rgba16Float,
                TextureUsage::RenderTarget,
                None,
            )))
            .unwrap()
    }

    #[test]
    fn test_clear_requires_render_target_state() {
        let mut backend = backend();
        let color = target(&mut backend);
        let allocator = backend.create_command_allocator().unwrap();

        let mut list = CommandList::new();
        list.clear_render_target(color, [0.0; 4]);
        assert!(matches!(
            backend.execute(allocator, &list),
            Err(RenderError::DeviceSubmissionFailure(_))
        ));

        let mut list = CommandList::new();
        list.transition_all(&[Transition::new(color, ResourceState::GenericRead, ResourceState::RenderTarget)]);
        list.clear_render_target(color, [0.0; 4]);
        backend.execute(allocator, &list).unwrap();
        assert_eq!(backend.resource_state(color), Some(ResourceState::RenderTarget));
    }

    #[test]
    fn test_allocator_reset_waits_for_completion() {
        let mut backend =
            HeadlessBackend::new(HeadlessConfig::new(8, 8).with_latency(Duration::from_millis(50))).unwrap();
        let allocator = backend.create_command_allocator().unwrap();
        backend.execute(allocator, &CommandList::new()).unwrap();
        assert!(backend.reset_command_allocator(allocator).is_err());

        let fence = backend.fence();
        fence.signal(1).unwrap();
        fence.wait_for_value(1).unwrap();
        backend.reset_command_allocator(allocator).unwrap();
    }

    #[test]
    fn test_present_flips_between_two_images() {
        let mut backend = backend();
        let first = backend.back_buffer();
        let second = backend.present().unwrap();
        assert_ne!(first, second);
        assert_eq!(backend.present().unwrap(), first);
        assert_eq!(backend.stats_handle().snapshot().presents, 2);
    }

    #[test]
    fn test_present_rejects_image_left_as_render_target() {
        let mut backend = backend();
        let image = backend.back_buffer();
        let allocator = backend.create_command_allocator().unwrap();
        let mut list = CommandList::new();
        list.transition_all(&[Transition::new(image, ResourceState::Present, ResourceState::RenderTarget)]);
        backend.execute(allocator, &list).unwrap();
        assert!(backend.present().is_err());
    }

    #[test]
    fn test_descriptor_writes_are_bounds_checked() {
        let mut backend = backend();
        let layout = backend.create_descriptor_heap(4).unwrap();
        let color = target(&mut backend);
        let view = ResourceView::texture(color);

        let third = CpuDescriptorHandle(layout.cpu_base + 2 * u64::from(layout.stride));
        backend.write_descriptor(third, &view).unwrap();
        assert_eq!(backend.descriptor(2), Some(view));

        let past_end = CpuDescriptorHandle(layout.cpu_base + 4 * u64::from(layout.stride));
        assert!(backend.write_descriptor(past_end, &view).is_err());
        let misaligned = CpuDescriptorHandle(layout.cpu_base + 1);
        assert!(backend.write_descriptor(misaligned, &view).is_err());

        backend.destroy_resource(color);
        assert!(backend.write_descriptor(third, &view).is_err());
    }

    #[test]
    fn test_readback_sees_depth_clear_value() {
        let mut backend = HeadlessBackend::new(HeadlessConfig::new(8, 8).with_depth_clear(1.0)).unwrap();
        let readback = backend
            .create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
                label: "readback",
                size: 16,
                usage: BufferUsage::Readback,
            }))
            .unwrap();
        let mut bytes = [0u8; 16];
        backend.read_buffer(readback, 0, &mut bytes).unwrap();
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        assert_eq!(values, vec![1.0; 4]);
    }

    #[test]
    fn test_stats_accumulate_across_submissions() {
        let mut backend = backend();
        let color = target(&mut backend);
        let allocator = backend.create_command_allocator().unwrap();
        let mut list = CommandList::new();
        list.transition_all(&[Transition::new(color, ResourceState::GenericRead, ResourceState::RenderTarget)]);
        list.dispatch(1, 1, 1);
        backend.execute(allocator, &list).unwrap();
        let mut list = CommandList::new();
        list.transition_all(&[Transition::new(color, ResourceState::RenderTarget, ResourceState::GenericRead)]);
        backend.execute(allocator, &list).unwrap();

        let stats = backend.stats_handle().snapshot();
        assert_eq!(stats.submissions, 2);
        assert_eq!(stats.commands.barriers, 2);
        assert_eq!(stats.commands.dispatches, 1);
        assert_eq!(stats.last_submission.dispatches, 0);
        assert_eq!(stats.live_resources, 3);
    }
}
