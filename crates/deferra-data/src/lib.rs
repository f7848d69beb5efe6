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

//! # Deferra Data
//!
//! Data layouts and allocators: the flat descriptor table, the ring of
//! per-frame resources and the `#[repr(C)]` constant blocks the GPU reads.

#![warn(missing_docs)]

pub mod allocators;
pub mod frame;
pub mod layouts;

pub use allocators::{DescriptorRange, DescriptorTable, DescriptorTableBuilder, DynamicSlot};
pub use frame::{FrameResourceSizes, FrameResources, FrameRing, FrameSlot, UploadBuffer};
