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

//! Records the fixed pass sequence into one command list.
//!
//! Each pass follows the same template: open, bind the pipeline, move its
//! resources into the states it needs, bind, target, clear, draw, copy, then
//! put every scoped resource back into its resting state. The scheduler keeps
//! the state of every resource it touched during the frame, so a barrier is
//! emitted only for an actual state change.

use super::resources::PassResources;
use deferra_core::renderer::{
    Binding, ClearValue, CommandList, CommandStats, DrawIndexedArgs, FrameBufferKind,
    GpuDescriptorHandle, LightBinning, PassId, ResourceId, ResourceState, ScissorRect, Transition, UiOverlay, Viewport,
};
use deferra_core::scene::{AssetSource, RenderLayer, SceneGraph};
use deferra_core::RenderError;
use deferra_data::{DescriptorRange, DescriptorTable, FrameResources};
use deferra_lanes::render_lane::{
    depth_downsample_dispatch, DispatchSize, DrawScope, PassBinding, PassDescriptor, PassResource,
    PassTable, PerRegion, Region, RootValue,
};
use std::collections::HashMap;

/// Everything a frame is recorded against.
pub struct FrameContext<'a> {
    /// The frame slot being recorded.
    pub frame: &'a FrameResources,
    /// Pass resources.
    pub resources: &'a PassResources,
    /// The descriptor table.
    pub table: &'a DescriptorTable,
    /// Where each region landed in `table`.
    pub regions: &'a PerRegion<DescriptorRange>,
    /// The swap chain image this frame renders into.
    pub back_buffer: ResourceId,
    /// Objects to draw, with the cull states of this frame.
    pub scene: &'a dyn SceneGraph,
    /// Meshes of the objects.
    pub assets: &'a dyn AssetSource,
}

impl FrameContext<'_> {
    fn resolve(&self, resource: PassResource) -> ResourceId {
        self.resources
            .resolve(resource, self.back_buffer, self.frame.depth_readback)
    }

    fn table_handle(&self, region: Region, offset: u32) -> Result<GpuDescriptorHandle, RenderError> {
        let index = self.regions[region]
            .at(offset)
            .ok_or_else(|| RenderError::InvalidHandle(format!("descriptor region '{region}' entry {offset}")))?;
        Ok(self.table.index_to_gpu_handle(index))
    }
}

/// What [`PassScheduler::record_frame`] produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordedFrame {
    /// Counters of the recorded list.
    pub stats: CommandStats,
    /// Whether the UI overlay contributed to the frame.
    pub ui_recorded: bool,
}

/// Resource states during the recording of one frame.
#[derive(Debug, Default)]
struct StateTracker {
    states: HashMap<ResourceId, ResourceState>,
}

impl StateTracker {
    fn reset(&mut self) {
        self.states.clear();
    }

    /// Moves `resource` to `to`, returning the barrier if the state changes.
    /// A resource not yet touched this frame is in `resting`.
    fn require(&mut self, resource: ResourceId, resting: ResourceState, to: ResourceState) -> Option<Transition> {
        let current = self.states.entry(resource).or_insert(resting);
        if *current == to {
            return None;
        }
        let transition = Transition::new(resource, *current, to);
        *current = to;
        Some(transition)
    }
}

/// Turns the declarative [`PassTable`] into commands.
#[derive(Debug)]
pub struct PassScheduler {
    passes: PassTable,
    tracker: StateTracker,
    // Reused by the overlay so a failed record never reaches the frame list.
    overlay_scratch: CommandList,
}

impl PassScheduler {
    /// Creates a scheduler for the given light-binning mode.
    pub fn new(binning: LightBinning) -> Self {
        Self {
            passes: PassTable::new(binning),
            tracker: StateTracker::default(),
            overlay_scratch: CommandList::new(),
        }
    }

    /// The pass declarations.
    pub fn passes(&self) -> &PassTable {
        &self.passes
    }

    /// Records every pass of the sequence into `list`, then the transition of
    /// the back buffer to `Present`.
    ///
    /// An overlay error is logged and its commands dropped; the frame is still
    /// recorded in full.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidHandle`] when an object references an unknown mesh
    /// or a pass binds a region the table lacks.
    pub fn record_frame(
        &mut self,
        ctx: &FrameContext<'_>,
        mut overlay: Option<&mut (dyn UiOverlay + '_)>,
        list: &mut CommandList,
    ) -> Result<RecordedFrame, RenderError> {
        let Self {
            passes,
            tracker,
            overlay_scratch,
        } = self;
        tracker.reset();
        let mut ui_recorded = false;

        for id in PassId::SEQUENCE {
            ui_recorded |= record_pass(
                tracker,
                overlay_scratch,
                passes.get(id),
                ctx,
                overlay.as_deref_mut(),
                list,
            )?;
        }

        let present = tracker.require(
            ctx.back_buffer,
            PassResource::BackBuffer.resting_state(),
            ResourceState::Present,
        );
        list.transition_all(present.as_slice());

        let stats = list.stats();
        log::trace!(
            "Recorded frame: {} passes, {} barriers, {} draws, {} dispatches",
            stats.passes,
            stats.barriers,
            stats.draws,
            stats.dispatches
        );
        Ok(RecordedFrame { stats, ui_recorded })
    }
}

fn record_pass(
    tracker: &mut StateTracker,
    overlay_scratch: &mut CommandList,
    pass: &PassDescriptor,
    ctx: &FrameContext<'_>,
    overlay: Option<&mut (dyn UiOverlay + '_)>,
    list: &mut CommandList,
) -> Result<bool, RenderError> {
    list.begin_pass(pass.id);
    list.set_pipeline(pass.pipeline);

    let opening: Vec<_> = pass
        .transitions
        .iter()
        .filter_map(|t| {
            tracker
                .require(ctx.resolve(t.resource), t.resource.resting_state(), t.during)
        })
        .collect();
    list.transition_all(&opening);

    for binding in &pass.bindings {
        list.bind(resolve_binding(binding, ctx)?);
    }

    let (width, height) = ctx.resources.size();
    if pass.sets_viewport() {
        list.set_viewport(Viewport::full(width, height), ScissorRect::full(width, height));
    }
    if !pass.render_targets.is_empty() || pass.depth_target.is_some() {
        let colors: Vec<_> = pass.render_targets.iter().map(|r| ctx.resolve(*r)).collect();
        list.set_render_targets(&colors, pass.depth_target.map(|r| ctx.resolve(r)));
    }
    if let Some(value) = pass.stencil_ref {
        list.set_stencil_ref(value);
    }
    for target in &pass.clears {
        match ctx.resources.clear_value(*target) {
            ClearValue::Color(color) => list.clear_render_target(ctx.resolve(*target), color),
            ClearValue::DepthStencil { depth, stencil } => {
                list.clear_depth_stencil(ctx.resolve(*target), depth, stencil)
            }
        }
    }

    let ui_recorded = match pass.draw {
        DrawScope::Objects {
            layer,
            object_slot,
            material_slot,
            skip_culled,
        } => {
            draw_objects(ctx, layer, object_slot, material_slot, skip_culled, list)?;
            false
        }
        DrawScope::Dispatch(size) => {
            let (x, y, z) = match size {
                DispatchSize::DepthReadback => {
                    let (w, h) = ctx.resources.readback_size();
                    depth_downsample_dispatch(w, h)
                }
                DispatchSize::LightBins => ctx.resources.grid().dispatch(),
            };
            list.dispatch(x, y, z);
            false
        }
        DrawScope::Overlay => record_overlay(overlay_scratch, ctx, overlay, list)?,
    };

    for (dst, src) in &pass.copies {
        let (dst_id, src_id) = (ctx.resolve(*dst), ctx.resolve(*src));
        let moves: Vec<_> = [
            tracker.require(src_id, src.resting_state(), ResourceState::CopySource),
            tracker.require(dst_id, dst.resting_state(), ResourceState::CopyDest),
        ]
        .into_iter()
        .flatten()
        .collect();
        list.transition_all(&moves);
        list.copy_resource(dst_id, src_id);
    }

    let closing: Vec<_> = pass
        .closing_transitions()
        .filter_map(|t| {
            let resting = t.resource.resting_state();
            tracker.require(ctx.resolve(t.resource), resting, resting)
        })
        .collect();
    list.transition_all(&closing);

    list.end_pass(pass.id);
    Ok(ui_recorded)
}

fn record_overlay(
    scratch: &mut CommandList,
    ctx: &FrameContext<'_>,
    overlay: Option<&mut (dyn UiOverlay + '_)>,
    list: &mut CommandList,
) -> Result<bool, RenderError> {
    let Some(overlay) = overlay else {
        return Ok(false);
    };
    let font_table = ctx.table_handle(Region::Ui, 0)?;
    scratch.reset();
    match overlay.record(scratch, ctx.back_buffer, font_table) {
        Ok(()) => {
            list.append(scratch);
            Ok(true)
        }
        Err(err) => {
            log::warn!("{err}; the frame is presented without the overlay");
            scratch.reset();
            Ok(false)
        }
    }
}

fn resolve_binding(binding: &PassBinding, ctx: &FrameContext<'_>) -> Result<Binding, RenderError> {
    Ok(match *binding {
        PassBinding::FrameBuffer { slot, kind } => {
            let (resource, _) = ctx.frame.buffer(kind);
            match kind {
                FrameBufferKind::Object | FrameBufferKind::Light | FrameBufferKind::Pass | FrameBufferKind::Sky => {
                    Binding::ConstantBuffer {
                        slot,
                        resource,
                        offset: 0,
                    }
                }
                FrameBufferKind::Material | FrameBufferKind::SceneObjectSdf | FrameBufferKind::MeshSdf => {
                    Binding::ShaderResource { slot, resource }
                }
            }
        }
        PassBinding::Table { slot, region, offset } => Binding::DescriptorTable {
            slot,
            base: ctx.table_handle(region, offset)?,
        },
        PassBinding::TaaHistoryRead { slot } => Binding::DescriptorTable {
            slot,
            base: ctx.table_handle(Region::Taa, ctx.resources.taa_read_index() as u32)?,
        },
        PassBinding::RootConstant { slot, value } => Binding::RootConstant {
            slot,
            value: match value {
                RootValue::SceneObjectSdfCount => ctx.frame.scene_object_sdf_count,
            },
        },
    })
}

fn draw_objects(
    ctx: &FrameContext<'_>,
    layer: RenderLayer,
    object_slot: Option<u32>,
    material_slot: Option<u32>,
    skip_culled: bool,
    list: &mut CommandList,
) -> Result<(), RenderError> {
    let (object_cb, _) = ctx.frame.buffer(FrameBufferKind::Object);
    let mut missing = None;

    ctx.scene.for_each(layer, &mut |object| {
        if missing.is_some() || (skip_culled && !object.cull_state().is_visible()) {
            return;
        }
        let Some(mesh) = ctx.assets.mesh(object.mesh()) else {
            missing = Some(RenderError::InvalidHandle(format!(
                "{:?} of object {}",
                object.mesh(),
                object.object_index()
            )));
            return;
        };
        if let Some(slot) = object_slot {
            list.bind(Binding::ConstantBuffer {
                slot,
                resource: object_cb,
                offset: ctx.frame.object_cb.element_offset(object.object_index()),
            });
        }
        for (i, submesh) in mesh.submeshes.iter().enumerate() {
            if let Some(slot) = material_slot {
                let material = object.material_override(i).unwrap_or(submesh.material);
                list.bind(Binding::RootConstant { slot, value: material.0 });
            }
            list.draw_indexed(DrawIndexedArgs {
                vertex_buffer: mesh.vertex_buffer,
                index_buffer: mesh.index_buffer,
                index_count: submesh.index_count,
                start_index: submesh.start_index,
                base_vertex: submesh.base_vertex,
                instance_count: 1,
            });
        }
    });

    missing.map_or(Ok(()), Err)
}
