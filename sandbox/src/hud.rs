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

//! A text overlay drawn by the UI pass: one quad per glyph of the status line.

use deferra_core::renderer::{
    Binding, CommandList, DrawIndexedArgs, GpuDescriptorHandle, RenderError, ResourceId, UiOverlay,
};
use std::sync::{Arc, Mutex, PoisonError};

/// Indices of one glyph quad.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// The line the HUD shows, written by the frame loop.
#[derive(Debug, Clone, Default)]
pub struct StatusLine(Arc<Mutex<String>>);

impl StatusLine {
    pub fn set(&self, text: String) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = text;
    }

    fn glyph_count(&self) -> u32 {
        let text = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        text.chars().filter(|c| !c.is_whitespace()).count() as u32
    }
}

pub struct HudOverlay {
    quad_vertices: ResourceId,
    quad_indices: ResourceId,
    status: StatusLine,
}

impl HudOverlay {
    pub fn new(quad_vertices: ResourceId, quad_indices: ResourceId, status: StatusLine) -> Self {
        Self {
            quad_vertices,
            quad_indices,
            status,
        }
    }
}

impl UiOverlay for HudOverlay {
    fn record(
        &mut self,
        commands: &mut CommandList,
        _back_buffer: ResourceId,
        font_table: GpuDescriptorHandle,
    ) -> Result<(), RenderError> {
        let glyphs = self.status.glyph_count();
        if glyphs == 0 {
            return Ok(());
        }
        commands.bind(Binding::DescriptorTable {
            slot: 0,
            base: font_table,
        });
        commands.draw_indexed(DrawIndexedArgs {
            vertex_buffer: self.quad_vertices,
            index_buffer: self.quad_indices,
            index_count: QUAD_INDICES.len() as u32,
            start_index: 0,
            base_vertex: 0,
            instance_count: glyphs,
        });
        Ok(())
    }
}
