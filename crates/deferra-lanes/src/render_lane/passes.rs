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

//! Declarative description of every pass of a frame.
//!
//! A [`PassDescriptor`] names resources symbolically. The scheduler resolves
//! them against the frame's concrete resources, so the same table drives every
//! frame slot and survives resizes.

use super::regions::{Region, GBUFFER_COUNT, GBUFFER_VELOCITY, TAA_OUTPUT_OFFSET, UAV_OFFSET};
use deferra_core::renderer::{
    FrameBufferKind, LightBinning, PassId, PerPass, PipelineKey, PipelineVariant, ResourceState,
};
use deferra_core::scene::RenderLayer;

/// A resource a pass touches, independent of frame slot and surface size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassResource {
    /// G-buffer target `0..4`.
    GBuffer(u32),
    /// Scene depth/stencil.
    Depth,
    /// Downsampled depth written by compute.
    DepthDownsample,
    /// The current frame slot's readback buffer.
    DepthReadback,
    /// Light bins written by compute.
    TileCluster,
    /// Screen-space shadow target.
    ScreenSpaceShadow,
    /// Light accumulation target.
    Light,
    /// The TAA history written this frame.
    TaaHistoryWrite,
    /// TAA output.
    TaaOutput,
    /// Motion blur target.
    MotionBlur,
    /// The swap chain image being rendered.
    BackBuffer,
}

impl PassResource {
    /// The state the resource is in between passes.
    pub const fn resting_state(self) -> ResourceState {
        match self {
            PassResource::BackBuffer => ResourceState::Present,
            PassResource::DepthReadback => ResourceState::CopyDest,
            _ => ResourceState::GenericRead,
        }
    }
}

/// A state change a pass needs before it records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassTransition {
    /// The resource.
    pub resource: PassResource,
    /// State while the pass runs.
    pub during: ResourceState,
    /// Whether the closing transitions return it to its resting state.
    pub restore: bool,
}

impl PassTransition {
    const fn scoped(resource: PassResource, during: ResourceState) -> Self {
        Self {
            resource,
            during,
            restore: true,
        }
    }
}

/// A value pushed as a root constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootValue {
    /// Number of distance-field descriptors written this frame.
    SceneObjectSdfCount,
}

/// One root binding of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassBinding {
    /// A per-frame upload buffer. Constant kinds bind as CBVs, tables as SRVs.
    FrameBuffer {
        /// Root slot.
        slot: u32,
        /// Which buffer.
        kind: FrameBufferKind,
    },
    /// A descriptor table starting `offset` entries into a static region.
    Table {
        /// Root slot.
        slot: u32,
        /// Which region.
        region: Region,
        /// Entry within the region.
        offset: u32,
    },
    /// The TAA history read this frame, which is the one written last frame.
    TaaHistoryRead {
        /// Root slot.
        slot: u32,
    },
    /// A root constant.
    RootConstant {
        /// Root slot.
        slot: u32,
        /// Value source.
        value: RootValue,
    },
}

impl PassBinding {
    const fn table(slot: u32, region: Region) -> Self {
        PassBinding::Table { slot, region, offset: 0 }
    }

    const fn frame(slot: u32, kind: FrameBufferKind) -> Self {
        PassBinding::FrameBuffer { slot, kind }
    }
}

/// Dispatch dimensions a compute pass derives from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchSize {
    /// One thread per readback texel.
    DepthReadback,
    /// One group per light bin.
    LightBins,
}

/// What a pass records between its clears and its closing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawScope {
    /// One indexed draw per submesh of every object in `layer`.
    Objects {
        /// Layer to iterate.
        layer: RenderLayer,
        /// Root slot receiving the object's constants, if any.
        object_slot: Option<u32>,
        /// Root slot receiving the submesh material index, if any.
        material_slot: Option<u32>,
        /// Skip objects the culler rejected.
        skip_culled: bool,
    },
    /// A single compute dispatch.
    Dispatch(DispatchSize),
    /// The UI overlay records itself.
    Overlay,
}

/// Everything the scheduler needs to record one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    /// The pass.
    pub id: PassId,
    /// Shader set to bind.
    pub pipeline: PipelineKey,
    /// Opening transitions, in order.
    pub transitions: Vec<PassTransition>,
    /// Root bindings, in order.
    pub bindings: Vec<PassBinding>,
    /// Color targets.
    pub render_targets: Vec<PassResource>,
    /// Depth target.
    pub depth_target: Option<PassResource>,
    /// Targets cleared to their optimized clear value.
    pub clears: Vec<PassResource>,
    /// Stencil reference, when the pass writes stencil.
    pub stencil_ref: Option<u32>,
    /// Draw or dispatch.
    pub draw: DrawScope,
    /// `(dst, src)` copies recorded after the draw scope. The scheduler moves
    /// both ends into their copy states first.
    pub copies: Vec<(PassResource, PassResource)>,
}

impl PassDescriptor {
    fn new(id: PassId, draw: DrawScope) -> Self {
        Self {
            id,
            pipeline: PipelineKey::of(id),
            transitions: Vec::new(),
            bindings: Vec::new(),
            render_targets: Vec::new(),
            depth_target: None,
            clears: Vec::new(),
            stencil_ref: None,
            draw,
            copies: Vec::new(),
        }
    }

    fn screen_quad(id: PassId) -> Self {
        Self::new(
            id,
            DrawScope::Objects {
                layer: RenderLayer::ScreenQuad,
                object_slot: None,
                material_slot: None,
                skip_culled: false,
            },
        )
    }

    fn variant(mut self, variant: PipelineVariant) -> Self {
        self.pipeline.variant = variant;
        self
    }

    fn transition(mut self, resource: PassResource, during: ResourceState) -> Self {
        self.transitions.push(PassTransition::scoped(resource, during));
        self
    }

    fn bind(mut self, binding: PassBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Targets `resource` as a color attachment and clears it.
    fn color_target(mut self, resource: PassResource) -> Self {
        self.render_targets.push(resource);
        self.clears.push(resource);
        self
    }

    /// Whether the pass sets a viewport. Compute passes do not.
    pub fn sets_viewport(&self) -> bool {
        !self.id.is_compute()
    }

    /// Transitions undone by the closing step, in reverse order.
    pub fn closing_transitions(&self) -> impl Iterator<Item = &PassTransition> {
        self.transitions.iter().rev().filter(|t| t.restore)
    }
}

/// The fixed pass sequence, one descriptor per [`PassId`].
#[derive(Debug, Clone)]
pub struct PassTable {
    binning: LightBinning,
    passes: PerPass<PassDescriptor>,
}

impl PassTable {
    /// Declares every pass. `binning` selects the light-binning variant of the
    /// tile/cluster and light passes for the table's lifetime.
    pub fn new(binning: LightBinning) -> Self {
        let passes = PerPass::from_fn(|id| declare(id, binning));
        Self { binning, passes }
    }

    /// The light-binning mode this table was built for.
    pub fn binning(&self) -> LightBinning {
        self.binning
    }

    /// The descriptor of `id`.
    pub fn get(&self, id: PassId) -> &PassDescriptor {
        &self.passes[id]
    }

    /// Every pass in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &PassDescriptor> {
        self.passes.iter().map(|(_, pass)| pass)
    }
}

fn declare(id: PassId, binning: LightBinning) -> PassDescriptor {
    use FrameBufferKind as Fb;
    use PassResource as R;
    use ResourceState as S;

    match id {
        PassId::GBuffer => {
            let mut pass = PassDescriptor::new(
                id,
                DrawScope::Objects {
                    layer: RenderLayer::Deferred,
                    object_slot: Some(0),
                    material_slot: Some(1),
                    skip_culled: true,
                },
            )
            .bind(PassBinding::frame(2, Fb::Pass))
            .bind(PassBinding::table(3, Region::Texture))
            .bind(PassBinding::frame(4, Fb::Material));
            for i in 0..GBUFFER_COUNT {
                pass = pass.transition(R::GBuffer(i), S::RenderTarget).color_target(R::GBuffer(i));
            }
            pass = pass.transition(R::Depth, S::DepthWrite);
            pass.depth_target = Some(R::Depth);
            pass.clears.push(R::Depth);
            pass.stencil_ref = Some(1);
            pass
        }
        PassId::DepthDownsample => {
            let mut pass = PassDescriptor::new(id, DrawScope::Dispatch(DispatchSize::DepthReadback))
                .transition(R::DepthDownsample, S::UnorderedAccess)
                .bind(PassBinding::frame(0, Fb::Pass))
                .bind(PassBinding::table(1, Region::Depth))
                .bind(PassBinding::Table {
                    slot: 2,
                    region: Region::DepthDownsample,
                    offset: UAV_OFFSET,
                });
            pass.copies.push((R::DepthReadback, R::DepthDownsample));
            pass
        }
        PassId::TileCluster => PassDescriptor::new(id, DrawScope::Dispatch(DispatchSize::LightBins))
            .variant(binning.into())
            .transition(R::TileCluster, S::UnorderedAccess)
            .bind(PassBinding::frame(0, Fb::Light))
            .bind(PassBinding::frame(1, Fb::Pass))
            .bind(PassBinding::Table {
                slot: 2,
                region: Region::TileCluster,
                offset: UAV_OFFSET,
            })
            .bind(PassBinding::table(3, Region::Depth)),
        PassId::ScreenSpaceShadow => PassDescriptor::screen_quad(id)
            .transition(R::ScreenSpaceShadow, S::RenderTarget)
            .bind(PassBinding::RootConstant {
                slot: 0,
                value: RootValue::SceneObjectSdfCount,
            })
            .bind(PassBinding::frame(1, Fb::MeshSdf))
            .bind(PassBinding::frame(2, Fb::SceneObjectSdf))
            .bind(PassBinding::table(3, Region::Depth))
            .bind(PassBinding::table(4, Region::Sdf))
            .bind(PassBinding::frame(5, Fb::Pass))
            .color_target(R::ScreenSpaceShadow),
        PassId::Light => PassDescriptor::screen_quad(id)
            .variant(binning.into())
            .transition(R::Light, S::RenderTarget)
            .bind(PassBinding::frame(0, Fb::Light))
            .bind(PassBinding::frame(1, Fb::Pass))
            .bind(PassBinding::table(2, Region::TileCluster))
            .bind(PassBinding::table(3, Region::GBuffer))
            .bind(PassBinding::table(4, Region::Depth))
            .bind(PassBinding::table(5, Region::ScreenSpaceShadow))
            .bind(PassBinding::table(6, Region::Ibl))
            .color_target(R::Light),
        PassId::Sky => {
            let mut pass = PassDescriptor::new(
                id,
                DrawScope::Objects {
                    layer: RenderLayer::Sky,
                    object_slot: Some(0),
                    material_slot: None,
                    skip_culled: false,
                },
            )
            .transition(R::Light, S::RenderTarget)
            .transition(R::GBuffer(GBUFFER_VELOCITY), S::RenderTarget)
            .transition(R::Depth, S::DepthWrite)
            .bind(PassBinding::frame(1, Fb::Sky))
            .bind(PassBinding::table(2, Region::Sky));
            // Sky fills the background of the lit image and its velocity.
            pass.render_targets = vec![R::Light, R::GBuffer(GBUFFER_VELOCITY)];
            pass.depth_target = Some(R::Depth);
            pass
        }
        PassId::Taa => PassDescriptor::screen_quad(id)
            .transition(R::TaaOutput, S::RenderTarget)
            .transition(R::TaaHistoryWrite, S::RenderTarget)
            .bind(PassBinding::frame(0, Fb::Pass))
            .bind(PassBinding::table(1, Region::Light))
            .bind(PassBinding::TaaHistoryRead { slot: 2 })
            .bind(PassBinding::Table {
                slot: 3,
                region: Region::GBuffer,
                offset: GBUFFER_VELOCITY,
            })
            .bind(PassBinding::table(4, Region::Depth))
            .color_target(R::TaaOutput)
            .color_target(R::TaaHistoryWrite),
        PassId::MotionBlur => PassDescriptor::screen_quad(id)
            .transition(R::MotionBlur, S::RenderTarget)
            .bind(PassBinding::frame(0, Fb::Pass))
            .bind(PassBinding::Table {
                slot: 1,
                region: Region::Taa,
                offset: TAA_OUTPUT_OFFSET,
            })
            .bind(PassBinding::Table {
                slot: 2,
                region: Region::GBuffer,
                offset: GBUFFER_VELOCITY,
            })
            .color_target(R::MotionBlur),
        PassId::PostProcess => {
            let mut pass = PassDescriptor::screen_quad(id)
                .bind(PassBinding::table(0, Region::MotionBlur))
                .color_target(R::BackBuffer);
            // The back buffer stays a render target for the UI; Present closes it.
            pass.transitions.push(PassTransition {
                resource: R::BackBuffer,
                during: S::RenderTarget,
                restore: false,
            });
            pass
        }
        PassId::Ui => {
            let mut pass = PassDescriptor::new(id, DrawScope::Overlay);
            pass.render_targets.push(R::BackBuffer);
            pass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PassTable {
        PassTable::new(LightBinning::Clustered)
    }

    #[test]
    fn test_table_follows_sequence() {
        let ids: Vec<_> = table().iter().map(|p| p.id).collect();
        assert_eq!(ids, PassId::SEQUENCE);
    }

    #[test]
    fn test_binning_selects_variant_of_light_passes_only() {
        let table = PassTable::new(LightBinning::Tiled);
        for pass in table.iter() {
            let expected = match pass.id {
                PassId::TileCluster | PassId::Light => PipelineVariant::Tiled,
                _ => PipelineVariant::Default,
            };
            assert_eq!(pass.pipeline.variant, expected, "{}", pass.id);
        }
    }

    #[test]
    fn test_gbuffer_writes_four_targets_and_depth() {
        let table = table();
        let gbuffer = table.get(PassId::GBuffer);
        assert_eq!(gbuffer.render_targets.len(), 4);
        assert_eq!(gbuffer.depth_target, Some(PassResource::Depth));
        assert_eq!(gbuffer.clears.len(), 5);
        assert_eq!(gbuffer.stencil_ref, Some(1));
        assert!(matches!(gbuffer.draw, DrawScope::Objects { skip_culled: true, .. }));
    }

    #[test]
    fn test_every_render_target_is_transitioned_first() {
        let table = table();
        for pass in table.iter() {
            for target in pass.render_targets.iter().chain(pass.depth_target.iter()) {
                if pass.id == PassId::Ui {
                    continue;
                }
                let transition = pass
                    .transitions
                    .iter()
                    .find(|t| t.resource == *target)
                    .unwrap_or_else(|| panic!("{} never transitions {target:?}", pass.id));
                assert!(
                    matches!(transition.during, ResourceState::RenderTarget | ResourceState::DepthWrite),
                    "{}",
                    pass.id
                );
            }
        }
    }

    #[test]
    fn test_only_back_buffer_skips_restore() {
        let table = table();
        for pass in table.iter() {
            for transition in pass.transitions.iter().filter(|t| !t.restore) {
                assert_eq!((pass.id, transition.resource), (PassId::PostProcess, PassResource::BackBuffer));
            }
        }
    }

    #[test]
    fn test_depth_downsample_copies_into_readback() {
        let table = table();
        let pass = table.get(PassId::DepthDownsample);
        assert_eq!(pass.copies, vec![(PassResource::DepthReadback, PassResource::DepthDownsample)]);
        assert!(!pass.sets_viewport());
        let closing: Vec<_> = pass.closing_transitions().map(|t| t.resource).collect();
        assert_eq!(closing, vec![PassResource::DepthDownsample]);
    }

    #[test]
    fn test_taa_reads_one_history_and_writes_the_other() {
        let table = table();
        let taa = table.get(PassId::Taa);
        assert!(taa.bindings.contains(&PassBinding::TaaHistoryRead { slot: 2 }));
        assert!(taa.render_targets.contains(&PassResource::TaaHistoryWrite));
    }

    #[test]
    fn test_screen_space_shadow_binds_sdf_count() {
        let table = table();
        let pass = table.get(PassId::ScreenSpaceShadow);
        assert_eq!(
            pass.bindings[0],
            PassBinding::RootConstant {
                slot: 0,
                value: RootValue::SceneObjectSdfCount
            }
        );
    }
}
