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

//! Defines the backend-agnostic command list recorded once per frame.
//!
//! The pass scheduler records into a [`CommandList`]; a backend translates
//! the list into its native command buffer at submission.

use super::pass::{Binding, PassId, PipelineKey, ScissorRect, Viewport};
use super::resource::{ResourceId, Transition};
use super::stats::CommandStats;

/// Arguments of one indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedArgs {
    /// Vertex buffer to bind.
    pub vertex_buffer: ResourceId,
    /// Index buffer to bind.
    pub index_buffer: ResourceId,
    /// Number of indices to draw.
    pub index_count: u32,
    /// First index in the index buffer.
    pub start_index: u32,
    /// Value added to each index before fetching the vertex.
    pub base_vertex: i32,
    /// Number of instances.
    pub instance_count: u32,
}

/// A single recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Opens the debug region of a pass.
    BeginPass(PassId),
    /// Closes the debug region of a pass.
    EndPass(PassId),
    /// Binds a pipeline state and its root signature.
    SetPipeline(PipelineKey),
    /// A resource-state barrier.
    Transition(Transition),
    /// A root binding.
    Bind(Binding),
    /// Sets the viewport and scissor.
    SetViewport(Viewport, ScissorRect),
    /// Binds color attachments and an optional depth attachment.
    SetRenderTargets {
        /// Color attachments.
        colors: Vec<ResourceId>,
        /// Depth attachment.
        depth: Option<ResourceId>,
    },
    /// Clears a color attachment.
    ClearRenderTarget {
        /// The target.
        target: ResourceId,
        /// The clear color.
        color: [f32; 4],
    },
    /// Clears a depth/stencil attachment.
    ClearDepthStencil {
        /// The target.
        target: ResourceId,
        /// Depth value.
        depth: f32,
        /// Stencil value.
        stencil: u8,
    },
    /// Sets the stencil reference value.
    SetStencilRef(u32),
    /// An indexed draw.
    DrawIndexed(DrawIndexedArgs),
    /// A compute dispatch.
    Dispatch {
        /// Thread groups along X.
        x: u32,
        /// Thread groups along Y.
        y: u32,
        /// Thread groups along Z.
        z: u32,
    },
    /// A whole-resource copy.
    CopyResource {
        /// Destination.
        dst: ResourceId,
        /// Source.
        src: ResourceId,
    },
}

/// An ordered list of GPU commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every recorded command, keeping the allocation.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// The recorded commands, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Appends every command of `other`, leaving it empty.
    pub fn append(&mut self, other: &mut CommandList) {
        self.commands.append(&mut other.commands);
    }

    /// Records a raw command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Opens a pass region.
    pub fn begin_pass(&mut self, pass: PassId) {
        self.push(Command::BeginPass(pass));
    }

    /// Closes a pass region.
    pub fn end_pass(&mut self, pass: PassId) {
        self.push(Command::EndPass(pass));
    }

    /// Binds a pipeline.
    pub fn set_pipeline(&mut self, pipeline: PipelineKey) {
        self.push(Command::SetPipeline(pipeline));
    }

    /// Records one barrier per transition, in order.
    pub fn transition_all(&mut self, transitions: &[Transition]) {
        self.commands
            .extend(transitions.iter().copied().map(Command::Transition));
    }

    /// Records a root binding.
    pub fn bind(&mut self, binding: Binding) {
        self.push(Command::Bind(binding));
    }

    /// Sets viewport and scissor.
    pub fn set_viewport(&mut self, viewport: Viewport, scissor: ScissorRect) {
        self.push(Command::SetViewport(viewport, scissor));
    }

    /// Binds render targets.
    pub fn set_render_targets(&mut self, colors: &[ResourceId], depth: Option<ResourceId>) {
        self.push(Command::SetRenderTargets {
            colors: colors.to_vec(),
            depth,
        });
    }

    /// Clears a color target.
    pub fn clear_render_target(&mut self, target: ResourceId, color: [f32; 4]) {
        self.push(Command::ClearRenderTarget { target, color });
    }

    /// Clears a depth/stencil target.
    pub fn clear_depth_stencil(&mut self, target: ResourceId, depth: f32, stencil: u8) {
        self.push(Command::ClearDepthStencil {
            target,
            depth,
            stencil,
        });
    }

    /// Sets the stencil reference.
    pub fn set_stencil_ref(&mut self, value: u32) {
        self.push(Command::SetStencilRef(value));
    }

    /// Records an indexed draw.
    pub fn draw_indexed(&mut self, args: DrawIndexedArgs) {
        self.push(Command::DrawIndexed(args));
    }

    /// Records a compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(Command::Dispatch { x, y, z });
    }

    /// Records a resource copy.
    pub fn copy_resource(&mut self, dst: ResourceId, src: ResourceId) {
        self.push(Command::CopyResource { dst, src });
    }

    /// Counts the work recorded in this list.
    pub fn stats(&self) -> CommandStats {
        let mut stats = CommandStats::default();
        for command in &self.commands {
            match command {
                Command::BeginPass(_) => stats.passes += 1,
                Command::Transition(_) => stats.barriers += 1,
                Command::DrawIndexed(_) => stats.draws += 1,
                Command::Dispatch { .. } => stats.dispatches += 1,
                Command::CopyResource { .. } => stats.copies += 1,
                _ => {}
            }
        }
        stats
    }

    /// Iterates the commands recorded between `BeginPass(pass)` and `EndPass(pass)`.
    pub fn pass_commands(&self, pass: PassId) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .skip_while(move |c| **c != Command::BeginPass(pass))
            .skip(1)
            .take_while(move |c| **c != Command::EndPass(pass))
    }
}
