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

//! Provides the public, backend-agnostic rendering contracts.
//!
//! This module defines the 'what' of rendering: the [`RenderBackend`] and
//! [`GpuFence`] traits, the pass and command vocabulary, the error type and
//! the [`GpuTimeline`] through which all GPU synchronization flows. The 'how'
//! lives in a concrete backend (see `deferra-infra`).

pub mod api;
pub mod config;
pub mod error;
pub mod timeline;
pub mod traits;

pub use self::api::*;
pub use self::config::{LightBinning, OcclusionMode, RendererConfig};
pub use self::error::RenderError;
pub use self::timeline::GpuTimeline;
pub use self::traits::{BackendInfo, BackendKind, GpuFence, RenderBackend, UiOverlay};
