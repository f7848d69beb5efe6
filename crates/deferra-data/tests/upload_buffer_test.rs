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

//! Upload buffers stage writes and flush only the touched byte range.

mod common;

use common::RecordingBackend;
use deferra_core::math::Mat4;
use deferra_core::renderer::{FrameBufferKind, ResourceDescriptor};
use deferra_core::RenderError;
use deferra_data::layouts::ObjectConstants;
use deferra_data::{FrameResourceSizes, FrameResources, UploadBuffer};

#[test]
fn test_constant_buffer_rows_are_aligned() {
    let mut backend = RecordingBackend::default();
    let buffer = UploadBuffer::<[f32; 4]>::new(&mut backend, "small", 3, true).unwrap();
    assert_eq!(buffer.stride(), 256);
    match &backend.resources[&buffer.resource()] {
        ResourceDescriptor::Buffer(desc) => assert_eq!(desc.size, 3 * 256),
        other => panic!("expected a buffer, got {other:?}"),
    }
}

#[test]
fn test_flush_writes_only_dirty_range() {
    let mut backend = RecordingBackend::default();
    let mut buffer = UploadBuffer::<[f32; 4]>::new(&mut backend, "rows", 8, false).unwrap();
    buffer.copy_data(2, &[1.0; 4]).unwrap();
    buffer.copy_data(4, &[2.0; 4]).unwrap();
    assert!(buffer.is_dirty());

    buffer.flush(&mut backend).unwrap();
    assert!(!buffer.is_dirty());
    assert_eq!(backend.buffer_writes.len(), 1);
    let (_, offset, bytes) = &backend.buffer_writes[0];
    assert_eq!(*offset, 32);
    assert_eq!(bytes.len(), 48);

    buffer.flush(&mut backend).unwrap();
    assert_eq!(backend.buffer_writes.len(), 1, "clean buffers are not rewritten");
}

#[test]
fn test_write_past_capacity_fails() {
    let mut backend = RecordingBackend::default();
    let mut buffer = UploadBuffer::<u32>::new(&mut backend, "tiny", 2, false).unwrap();
    let err = buffer.copy_data(2, &7).unwrap_err();
    assert_eq!(err, RenderError::PoolExhausted { pool: "tiny", capacity: 2 });
    assert_eq!(buffer.get(1), Some(0));
}

#[test]
fn test_frame_resources_expose_every_buffer() {
    let mut backend = RecordingBackend::default();
    let sizes = FrameResourceSizes {
        objects: 16,
        materials: 4,
        meshes: 2,
        readback_texels: 256 * 128,
    };
    let mut resources = FrameResources::new(&mut backend, &sizes).unwrap();
    let (object, stride) = resources.buffer(FrameBufferKind::Object);
    assert_eq!(object, resources.object_cb.resource());
    assert_eq!(stride, 256);

    resources
        .object_cb
        .copy_data(3, &ObjectConstants::new(&Mat4::IDENTITY, &Mat4::IDENTITY, &Mat4::IDENTITY))
        .unwrap();
    resources.flush(&mut backend).unwrap();
    assert_eq!(backend.buffer_writes.len(), 1);
    assert_eq!(backend.buffer_writes[0].1, 3 * 256);

    let created = backend.resources.len();
    resources.destroy(&mut backend);
    assert_eq!(backend.destroyed.len(), created);
    assert!(backend.resources.is_empty());
}
