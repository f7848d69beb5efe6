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

//! The renderer context and the pieces it is assembled from.

mod constants;
mod renderer;
mod resources;
mod scheduler;
mod textures;

pub use self::constants::{pass_constants, sky_constants, FrameTime};
pub use self::renderer::{FrameInputs, FrameReport, Renderer};
pub use self::resources::PassResources;
pub use self::scheduler::{FrameContext, PassScheduler, RecordedFrame};
pub use self::textures::TextureRegistry;
