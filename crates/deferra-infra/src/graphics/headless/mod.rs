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

//! A backend without a GPU.
//!
//! Command lists are validated against the resource table, their barriers
//! applied, and their copies performed in memory. Submissions then travel to a
//! queue thread which completes fence signals in order, after an optional
//! simulated latency.

mod backend;
mod fence;
mod queue;
mod resources;
mod timings;

pub use self::backend::{HeadlessBackend, HeadlessConfig, HeadlessStats, StatsHandle};
pub use self::fence::HeadlessFence;
