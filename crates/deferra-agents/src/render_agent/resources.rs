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

//! GPU resources the passes read and write, and their descriptor views.
//!
//! Size-dependent targets live in [`ScreenTargets`] and are recreated on
//! resize. Everything else is created once. Views are always written to the
//! same region offsets, so descriptor tables bound by the passes never move.

use deferra_core::math::DepthConvention;
use deferra_core::renderer::{
    BufferDescriptor, BufferUsage, ClearValue, LightBinning, RenderBackend, ResourceDescriptor,
    ResourceId, ResourceView, TextureDescriptor, TextureDimension, TextureFormat, TextureUsage,
    ViewAccess,
};
use deferra_core::{RenderError, RendererConfig};
use deferra_data::{DescriptorRange, DescriptorTable};
use deferra_lanes::render_lane::{
    LightBinGrid, PassResource, PerRegion, Region, GBUFFER_COUNT, LIGHT_LIST_STRIDE,
    TAA_OUTPUT_OFFSET, UAV_OFFSET,
};

/// Side of the sky and irradiance cubemaps.
const CUBE_SIZE: u32 = 256;
/// Side of the split-sum BRDF lookup table.
const BRDF_LUT_SIZE: u32 = 512;

const GBUFFER_FORMATS: [(TextureFormat, [f32; 4]); GBUFFER_COUNT as usize] = [
    (TextureFormat::Rgba8Unorm, [0.0, 0.0, 0.0, 0.0]),
    (TextureFormat::Rgba16Float, [0.0, 0.0, 0.0, 0.0]),
    (TextureFormat::Rg16Float, [0.0, 0.0, 0.0, 0.0]),
    // Occlusion, roughness, metallic.
    (TextureFormat::Rgba8Unorm, [0.0, 0.3, 0.0, 0.0]),
];
const GBUFFER_LABELS: [&str; GBUFFER_COUNT as usize] =
    ["gbuffer_albedo", "gbuffer_normal", "gbuffer_velocity", "gbuffer_orm"];

const HDR_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const SHADOW_CLEAR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
/// Clear color of the back buffer.
pub const BACK_BUFFER_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Targets whose size follows the surface.
#[derive(Debug)]
struct ScreenTargets {
    width: u32,
    height: u32,
    gbuffer: [ResourceId; GBUFFER_COUNT as usize],
    depth: ResourceId,
    tile_cluster: ResourceId,
    screen_space_shadow: ResourceId,
    light: ResourceId,
    taa_history: [ResourceId; 2],
    taa_output: ResourceId,
    motion_blur: ResourceId,
}

impl ScreenTargets {
    fn new(
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
        convention: DepthConvention,
        grid: &LightBinGrid,
    ) -> Result<Self, RenderError> {
        let mut color = |label: &'static str, format: TextureFormat, clear: [f32; 4]| {
            backend.create_resource(&ResourceDescriptor::Texture(TextureDescriptor::target_2d(
                label,
                width,
                height,
                format,
                TextureUsage::RenderTarget,
                Some(ClearValue::Color(clear)),
            )))
        };
        let mut gbuffer = [ResourceId(0); GBUFFER_COUNT as usize];
        for (slot, ((format, clear), label)) in gbuffer.iter_mut().zip(GBUFFER_FORMATS.iter().zip(GBUFFER_LABELS)) {
            *slot = color(label, *format, *clear)?;
        }
        let screen_space_shadow = color("screen_space_shadow", TextureFormat::R32Float, SHADOW_CLEAR)?;
        let light = color("light", TextureFormat::Rgba32Float, HDR_CLEAR)?;
        let taa_history = [
            color("taa_history_0", TextureFormat::Rgba32Float, HDR_CLEAR)?,
            color("taa_history_1", TextureFormat::Rgba32Float, HDR_CLEAR)?,
        ];
        let taa_output = color("taa_output", TextureFormat::Rgba32Float, HDR_CLEAR)?;
        let motion_blur = color("motion_blur", TextureFormat::Rgba32Float, HDR_CLEAR)?;

        let depth = backend.create_resource(&ResourceDescriptor::Texture(TextureDescriptor::target_2d(
            "depth_stencil",
            width,
            height,
            TextureFormat::Depth32FloatStencil8,
            TextureUsage::DepthStencil,
            Some(ClearValue::DepthStencil {
                depth: convention.far_value(),
                stencil: 0,
            }),
        )))?;
        let tile_cluster = backend.create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
            label: "tile_cluster",
            size: grid.buffer_size(),
            usage: BufferUsage::Storage,
        }))?;

        Ok(Self {
            width,
            height,
            gbuffer,
            depth,
            tile_cluster,
            screen_space_shadow,
            light,
            taa_history,
            taa_output,
            motion_blur,
        })
    }

    fn all(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.gbuffer
            .iter()
            .copied()
            .chain([self.depth, self.tile_cluster, self.screen_space_shadow, self.light])
            .chain(self.taa_history)
            .chain([self.taa_output, self.motion_blur])
    }

    fn destroy(&self, backend: &mut dyn RenderBackend) {
        for resource in self.all() {
            backend.destroy_resource(resource);
        }
    }
}

/// Every resource the pass table refers to, minus the per-slot readback and the back buffer.
#[derive(Debug)]
pub struct PassResources {
    convention: DepthConvention,
    binning: LightBinning,
    readback: (u32, u32),
    grid: LightBinGrid,
    screen: ScreenTargets,
    depth_downsample: ResourceId,
    sky: ResourceId,
    irradiance: ResourceId,
    brdf_lut: ResourceId,
    prefilter: ResourceId,
    prefilter_levels: u32,
    taa_read_index: usize,
}

impl PassResources {
    /// Creates every pass resource for the configured surface size.
    pub fn new(backend: &mut dyn RenderBackend, config: &RendererConfig) -> Result<Self, RenderError> {
        let convention = config.depth_convention();
        let grid = LightBinGrid::new(config.light_binning, config.width, config.height);
        let screen = ScreenTargets::new(backend, config.width, config.height, convention, &grid)?;
        let readback = (config.depth_readback_width, config.depth_readback_height);

        let depth_downsample = backend.create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
            label: "depth_downsample",
            size: u64::from(readback.0) * u64::from(readback.1) * std::mem::size_of::<f32>() as u64,
            usage: BufferUsage::Storage,
        }))?;
        let mut cube = |label: &'static str, mip_levels: u32| {
            backend.create_resource(&ResourceDescriptor::Texture(TextureDescriptor {
                label,
                width: CUBE_SIZE,
                height: CUBE_SIZE,
                depth: 6,
                mip_levels,
                dimension: TextureDimension::Cube,
                format: TextureFormat::Rgba16Float,
                usage: TextureUsage::Sampled,
                clear: None,
            }))
        };
        let sky = cube("sky_cube", 1)?;
        let irradiance = cube("irradiance_cube", 1)?;
        let prefilter = cube("prefilter_cube", config.prefilter_levels.max(1))?;
        let brdf_lut = backend.create_resource(&ResourceDescriptor::Texture(TextureDescriptor::target_2d(
            "brdf_lut",
            BRDF_LUT_SIZE,
            BRDF_LUT_SIZE,
            TextureFormat::Rg16Float,
            TextureUsage::Sampled,
            None,
        )))?;

        log::info!(
            "Pass resources created at {}x{} ({} light bins of {:?})",
            config.width,
            config.height,
            grid.element_count(),
            config.light_binning
        );

        Ok(Self {
            convention,
            binning: config.light_binning,
            readback,
            grid,
            screen,
            depth_downsample,
            sky,
            irradiance,
            brdf_lut,
            prefilter,
            prefilter_levels: config.prefilter_levels,
            taa_read_index: 0,
        })
    }

    /// Writes every static view into its region.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidHandle`] if a view falls past the end of its region.
    pub fn write_views(
        &self,
        table: &DescriptorTable,
        regions: &PerRegion<DescriptorRange>,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), RenderError> {
        let (rw, rh) = self.readback;
        let s = &self.screen;
        let mut writes = vec![
            (Region::Sky, 0, ResourceView::cube(self.sky, 0)),
            (Region::Depth, 0, ResourceView::texture(s.depth)),
            (
                Region::DepthDownsample,
                0,
                ResourceView::buffer(self.depth_downsample, ViewAccess::ShaderResource, rw * rh, 4),
            ),
            (
                Region::DepthDownsample,
                UAV_OFFSET,
                ResourceView::buffer(self.depth_downsample, ViewAccess::UnorderedAccess, rw * rh, 4),
            ),
            (
                Region::TileCluster,
                0,
                ResourceView::buffer(
                    s.tile_cluster,
                    ViewAccess::ShaderResource,
                    self.grid.element_count(),
                    LIGHT_LIST_STRIDE,
                ),
            ),
            (
                Region::TileCluster,
                UAV_OFFSET,
                ResourceView::buffer(
                    s.tile_cluster,
                    ViewAccess::UnorderedAccess,
                    self.grid.element_count(),
                    LIGHT_LIST_STRIDE,
                ),
            ),
            (Region::ScreenSpaceShadow, 0, ResourceView::texture(s.screen_space_shadow)),
            (Region::Light, 0, ResourceView::texture(s.light)),
            (Region::Taa, 0, ResourceView::texture(s.taa_history[0])),
            (Region::Taa, 1, ResourceView::texture(s.taa_history[1])),
            (Region::Taa, TAA_OUTPUT_OFFSET, ResourceView::texture(s.taa_output)),
            (Region::MotionBlur, 0, ResourceView::texture(s.motion_blur)),
            (Region::Ibl, 0, ResourceView::cube(self.irradiance, 0)),
            (Region::Ibl, 1, ResourceView::texture(self.brdf_lut)),
        ];
        for (i, target) in s.gbuffer.iter().enumerate() {
            writes.push((Region::GBuffer, i as u32, ResourceView::texture(*target)));
        }
        for mip in 0..self.prefilter_levels {
            writes.push((Region::Ibl, 2 + mip, ResourceView::cube(self.prefilter, mip)));
        }

        for (region, offset, view) in writes {
            let index = regions[region]
                .at(offset)
                .ok_or_else(|| RenderError::InvalidHandle(format!("descriptor region '{region}' entry {offset}")))?;
            table.write_view(backend, index, &view)?;
        }
        Ok(())
    }

    /// Recreates the size-dependent targets. The caller has flushed the GPU
    /// and rewrites the views afterwards.
    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        self.screen.destroy(backend);
        self.grid = LightBinGrid::new(self.binning, width, height);
        self.screen = ScreenTargets::new(backend, width, height, self.convention, &self.grid)?;
        self.taa_read_index = 0;
        log::info!(
            "Pass resources resized to {width}x{height} ({} light bins)",
            self.grid.element_count()
        );
        Ok(())
    }

    /// The concrete resource behind `resource`.
    ///
    /// The back buffer and the readback are owned elsewhere and supplied by
    /// the caller.
    pub fn resolve(&self, resource: PassResource, back_buffer: ResourceId, readback: ResourceId) -> ResourceId {
        let s = &self.screen;
        match resource {
            PassResource::GBuffer(i) => s.gbuffer[(i as usize).min(s.gbuffer.len() - 1)],
            PassResource::Depth => s.depth,
            PassResource::DepthDownsample => self.depth_downsample,
            PassResource::DepthReadback => readback,
            PassResource::TileCluster => s.tile_cluster,
            PassResource::ScreenSpaceShadow => s.screen_space_shadow,
            PassResource::Light => s.light,
            PassResource::TaaHistoryWrite => s.taa_history[self.taa_write_index()],
            PassResource::TaaOutput => s.taa_output,
            PassResource::MotionBlur => s.motion_blur,
            PassResource::BackBuffer => back_buffer,
        }
    }

    /// The value a clear of `resource` writes.
    pub fn clear_value(&self, resource: PassResource) -> ClearValue {
        match resource {
            PassResource::GBuffer(i) => {
                let (_, color) = GBUFFER_FORMATS[(i as usize).min(GBUFFER_FORMATS.len() - 1)];
                ClearValue::Color(color)
            }
            PassResource::Depth => ClearValue::DepthStencil {
                depth: self.convention.far_value(),
                stencil: 0,
            },
            PassResource::ScreenSpaceShadow => ClearValue::Color(SHADOW_CLEAR),
            PassResource::BackBuffer => ClearValue::Color(BACK_BUFFER_CLEAR),
            _ => ClearValue::Color(HDR_CLEAR),
        }
    }

    /// The scene depth buffer.
    pub fn depth(&self) -> ResourceId {
        self.screen.depth
    }

    /// Surface size the targets were created for.
    pub fn size(&self) -> (u32, u32) {
        (self.screen.width, self.screen.height)
    }

    /// Readback resolution.
    pub fn readback_size(&self) -> (u32, u32) {
        self.readback
    }

    /// The current light-bin grid.
    pub fn grid(&self) -> LightBinGrid {
        self.grid
    }

    /// History read by this frame's TAA pass.
    pub fn taa_read_index(&self) -> usize {
        self.taa_read_index
    }

    /// History written by this frame's TAA pass.
    pub fn taa_write_index(&self) -> usize {
        (self.taa_read_index + 1) % 2
    }

    /// Swaps the histories after a frame: what was written becomes what is read.
    pub fn advance_taa(&mut self) {
        self.taa_read_index = self.taa_write_index();
    }

    /// Releases every resource. The caller has flushed the GPU.
    pub fn destroy(self, backend: &mut dyn RenderBackend) {
        self.screen.destroy(backend);
        for resource in [self.depth_downsample, self.sky, self.irradiance, self.brdf_lut, self.prefilter] {
            backend.destroy_resource(resource);
        }
    }
}
