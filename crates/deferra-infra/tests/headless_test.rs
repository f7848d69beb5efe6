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

use deferra_core::renderer::{
    BufferDescriptor, BufferUsage, CommandList, GpuTimeline, PassId, RenderBackend, RenderError, ResourceDescriptor,
    ResourceState, TextureDescriptor, TextureFormat, TextureUsage, Transition,
};
use deferra_infra::{HeadlessBackend, HeadlessConfig};
use std::time::Duration;

fn storage(backend: &mut HeadlessBackend, label: &'static str, floats: u64) -> deferra_core::renderer::ResourceId {
    backend
        .create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
            label,
            size: floats * 4,
            usage: BufferUsage::Storage,
        }))
        .unwrap()
}

#[test]
fn test_readback_round_trip_through_copy_states() {
    let mut backend = HeadlessBackend::new(HeadlessConfig::new(16, 16).with_depth_clear(0.75)).unwrap();
    let mut timeline = GpuTimeline::new(backend.fence());
    let allocator = backend.create_command_allocator().unwrap();
    let downsample = storage(&mut backend, "downsample", 8);
    let readback = backend
        .create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
            label: "readback",
            size: 32,
            usage: BufferUsage::Readback,
        }))
        .unwrap();

    let mut list = CommandList::new();
    list.begin_pass(PassId::DepthDownsample);
    list.transition_all(&[Transition::new(downsample, ResourceState::GenericRead, ResourceState::UnorderedAccess)]);
    list.dispatch(1, 1, 1);
    list.transition_all(&[Transition::new(downsample, ResourceState::UnorderedAccess, ResourceState::CopySource)]);
    list.copy_resource(readback, downsample);
    list.transition_all(&[Transition::new(downsample, ResourceState::CopySource, ResourceState::GenericRead)]);
    list.end_pass(PassId::DepthDownsample);
    backend.execute(allocator, &list).unwrap();
    timeline.flush().unwrap();

    let mut bytes = [0u8; 32];
    backend.read_buffer(readback, 0, &mut bytes).unwrap();
    let depth: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
    for value in depth {
        approx::assert_relative_eq!(value, 0.75);
    }
    assert_eq!(backend.resource_state(downsample), Some(ResourceState::GenericRead));
    assert_eq!(backend.resource_state(readback), Some(ResourceState::CopyDest));

    let stats = backend.stats_handle().snapshot();
    assert_eq!(stats.commands.copies, 1);
    assert_eq!(stats.commands.barriers, 3);
    assert_eq!(stats.commands.passes, 1);
}

#[test]
fn test_copy_into_unprepared_destination_fails() {
    let mut backend = HeadlessBackend::new(HeadlessConfig::default()).unwrap();
    let allocator = backend.create_command_allocator().unwrap();
    let src = storage(&mut backend, "src", 4);
    let dst = storage(&mut backend, "dst", 4);
    let mut list = CommandList::new();
    list.transition_all(&[Transition::new(src, ResourceState::GenericRead, ResourceState::CopySource)]);
    list.copy_resource(dst, src);
    assert!(matches!(
        backend.execute(allocator, &list),
        Err(RenderError::DeviceSubmissionFailure(_))
    ));
}

#[test]
fn test_upload_buffer_feeds_a_volume_texture() {
    let mut backend = HeadlessBackend::new(HeadlessConfig::default()).unwrap();
    let mut timeline = GpuTimeline::new(backend.fence());
    let allocator = backend.create_command_allocator().unwrap();
    let volume = backend
        .create_resource(&ResourceDescriptor::Texture(TextureDescriptor {
            label: "volume",
            width: 4,
            height: 4,
            depth: 4,
            mip_levels: 1,
            dimension: deferra_core::renderer::TextureDimension::D3,
            format: TextureFormat::R32Float,
            usage: TextureUsage::Sampled,
            clear: None,
        }))
        .unwrap();
    let staging = backend
        .create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
            label: "staging",
            size: 256,
            usage: BufferUsage::Upload,
        }))
        .unwrap();
    backend.write_buffer(staging, 0, &[0u8; 256]).unwrap();
    assert!(matches!(
        backend.write_buffer(volume, 0, &[0u8; 4]),
        Err(RenderError::CastMismatch {
            expected: "upload buffer",
            found: "texture"
        })
    ));

    let mut list = CommandList::new();
    list.transition_all(&[Transition::new(volume, ResourceState::GenericRead, ResourceState::CopyDest)]);
    list.copy_resource(volume, staging);
    list.transition_all(&[Transition::new(volume, ResourceState::CopyDest, ResourceState::GenericRead)]);
    backend.execute(allocator, &list).unwrap();
    timeline.flush().unwrap();
    backend.destroy_resource(staging);
    assert_eq!(backend.resource_state(staging), None);
}

#[test]
fn test_fence_values_complete_in_submission_order() {
    let mut backend =
        HeadlessBackend::new(HeadlessConfig::new(8, 8).with_latency(Duration::from_millis(10))).unwrap();
    let mut timeline = GpuTimeline::new(backend.fence());
    let allocators: Vec<_> = (0..3).map(|_| backend.create_command_allocator().unwrap()).collect();

    let mut values = Vec::new();
    for allocator in &allocators {
        backend.execute(*allocator, &CommandList::new()).unwrap();
        values.push(timeline.signal_and_record().unwrap());
    }
    assert_eq!(values, vec![1, 2, 3]);

    timeline.wait_until(2).unwrap();
    assert!(timeline.is_complete(1));
    backend.reset_command_allocator(allocators[0]).unwrap();
    backend.reset_command_allocator(allocators[1]).unwrap();

    timeline.wait_until(3).unwrap();
    backend.reset_command_allocator(allocators[2]).unwrap();
}

#[test]
fn test_resize_requires_an_idle_queue() {
    let mut backend =
        HeadlessBackend::new(HeadlessConfig::new(8, 8).with_latency(Duration::from_millis(50))).unwrap();
    let mut timeline = GpuTimeline::new(backend.fence());
    let allocator = backend.create_command_allocator().unwrap();
    backend.execute(allocator, &CommandList::new()).unwrap();
    assert!(backend.resize_surface(32, 16).is_err());

    timeline.flush().unwrap();
    let image = backend.back_buffer();
    backend.resize_surface(32, 16).unwrap();
    assert_eq!(backend.surface_size(), (32, 16));
    assert_eq!(backend.back_buffer(), image);
    assert_eq!(backend.resource_state(image), Some(ResourceState::Present));
}

#[test]
fn test_zero_sized_surface_is_rejected() {
    assert!(matches!(
        HeadlessBackend::new(HeadlessConfig::new(0, 8)),
        Err(RenderError::InvalidConfig(_))
    ));
}

#[test]
fn test_pass_timings_split_latency_once_the_list_completes() {
    let mut backend =
        HeadlessBackend::new(HeadlessConfig::new(16, 16).with_latency(Duration::from_millis(6))).unwrap();
    let mut timeline = GpuTimeline::new(backend.fence());
    let allocator = backend.create_command_allocator().unwrap();
    assert!(backend.pass_timings().is_none());

    let mut list = CommandList::new();
    list.begin_pass(PassId::GBuffer);
    list.dispatch(1, 1, 1);
    list.end_pass(PassId::GBuffer);
    list.begin_pass(PassId::TileCluster);
    for _ in 0..3 {
        list.dispatch(1, 1, 1);
    }
    list.end_pass(PassId::TileCluster);
    backend.execute(allocator, &list).unwrap();
    timeline.flush().unwrap();

    let times = backend.pass_timings().unwrap();
    assert_eq!(times[PassId::GBuffer], Duration::from_millis(2));
    assert_eq!(times[PassId::TileCluster], Duration::from_millis(4));
    assert_eq!(times[PassId::Light], Duration::ZERO);

    // A list without passes leaves the last frame's timings in place.
    backend.reset_command_allocator(allocator).unwrap();
    let mut upload = CommandList::new();
    upload.dispatch(1, 1, 1);
    backend.execute(allocator, &upload).unwrap();
    timeline.flush().unwrap();
    assert_eq!(backend.pass_timings(), Some(times));
}
