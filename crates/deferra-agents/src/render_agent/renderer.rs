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

//! The renderer context: one per process, constructed once and passed around.

use super::constants::{pass_constants, sky_constants, FrameTime};
use super::resources::PassResources;
use super::scheduler::{FrameContext, PassScheduler};
use super::textures::TextureRegistry;
use deferra_core::math::Mat4;
use deferra_core::renderer::{
    BackendInfo, BufferDescriptor, BufferUsage, CommandAllocatorId, CommandList, CommandStats,
    CullStats, DescriptorIndex, PerPass, RenderBackend, ResourceDescriptor, ResourceId, ResourceState,
    ResourceView, TextureDescriptor, TextureDimension, TextureFormat, TextureUsage, Transition,
    UiOverlay,
};
use deferra_core::scene::{AssetSource, Camera, LightSet, MeshAsset, MeshSdf, RenderLayer, SceneGraph};
use deferra_core::{GpuTimeline, RenderError, RendererConfig, ThreadPool};
use deferra_data::layouts::{LightConstants, MaterialData, MeshSdfDescriptor, ObjectConstants, SceneObjectSdfDescriptor};
use deferra_data::{
    DescriptorRange, DescriptorTable, DescriptorTableBuilder, FrameResourceSizes, FrameResources, FrameRing,
};
use deferra_lanes::culling_lane::{depth_from_readback, DepthHistory, VisibilityCuller, CULLED_LAYER};
use deferra_lanes::render_lane::{descriptor_regions, PerRegion, Region};
use deferra_lanes::SdfBaker;
use deferra_telemetry::{CpuProfiler, ScopeTimer};
use std::fmt;
use std::time::Duration;

/// What the application hands to [`Renderer::update`] every frame.
pub struct FrameInputs<'a> {
    /// Objects, whose dirty counters and cull states are updated.
    pub scene: &'a mut dyn SceneGraph,
    /// Meshes and materials, whose dirty counters are updated.
    pub assets: &'a mut dyn AssetSource,
    /// The viewpoint.
    pub camera: &'a dyn Camera,
    /// Lights of the frame.
    pub lights: &'a LightSet,
    /// Timing.
    pub time: FrameTime,
}

/// Summary of a submitted frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frames submitted before this one.
    pub frame: u64,
    /// Timeline value signaled after the frame.
    pub fence_value: u64,
    /// Counters of the recorded list.
    pub commands: CommandStats,
    /// Visibility of the deferred layer.
    pub cull: CullStats,
    /// Whether the UI overlay drew into the frame.
    pub ui_recorded: bool,
}

/// Owns every piece of rendering state.
///
/// The frame loop is `update` followed by `draw`. Every error except an
/// overlay failure is fatal and should end the application.
pub struct Renderer {
    config: RendererConfig,
    backend: Box<dyn RenderBackend>,
    timeline: GpuTimeline,
    ring: FrameRing<FrameResources>,
    table: DescriptorTable,
    regions: PerRegion<DescriptorRange>,
    resources: PassResources,
    textures: TextureRegistry,
    scheduler: PassScheduler,
    culler: VisibilityCuller,
    pool: ThreadPool,
    profiler: CpuProfiler,
    overlay: Option<Box<dyn UiOverlay>>,
    // Records one-off uploads and barriers outside the frame loop.
    init_allocator: CommandAllocatorId,
    command_list: CommandList,
    // Baked distance fields, indexed by `MeshSdf::sdf_index`.
    sdf_textures: Vec<ResourceId>,
    mesh_sdfs: Vec<MeshSdfDescriptor>,
    // Textures released while frames may still sample them, with the timeline value that frees them.
    retired_textures: Vec<(u64, ResourceId)>,
    // Unjittered view-projection captured by `update`, attached to the slot's readback by `draw`.
    frame_view_proj: Option<Mat4>,
    last_cull: CullStats,
    frame_open: bool,
    frame_count: u64,
}

impl Renderer {
    /// Builds the renderer on `backend`.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidConfig`] for an unusable configuration, or any
    /// backend error raised while creating resources.
    pub fn new(mut backend: Box<dyn RenderBackend>, config: RendererConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let info = backend.info();
        log::info!("Initializing renderer on {} ({})", info.kind, info.adapter_name);

        let pool = match config.worker_threads {
            Some(threads) => ThreadPool::new(threads),
            None => ThreadPool::with_available_parallelism(),
        };

        let mut builder = DescriptorTableBuilder::new();
        let mut reserved = Vec::with_capacity(Region::COUNT);
        for (region, decl) in descriptor_regions(&config).iter() {
            let range = if decl.dynamic {
                builder.reserve_dynamic_pool(region.label(), decl.count)?
            } else {
                builder.reserve_static_region(region.label(), decl.count)
            };
            reserved.push(range);
        }
        let regions = PerRegion::from_fn(|region| reserved[region.index()]);
        let table = builder.build(backend.as_mut())?;
        log::info!("Descriptor table built with {} entries", table.layout().capacity);

        let resources = PassResources::new(backend.as_mut(), &config)?;
        resources.write_views(&table, &regions, backend.as_mut())?;

        let (readback_w, readback_h) = resources.readback_size();
        let sizes = FrameResourceSizes {
            objects: config.max_scene_objects,
            materials: config.max_materials,
            meshes: config.max_meshes,
            readback_texels: readback_w * readback_h,
        };
        let ring = FrameRing::from_fn(config.frame_resource_count, |_| {
            FrameResources::new(backend.as_mut(), &sizes)
        })?;

        let timeline = GpuTimeline::new(backend.fence());
        let init_allocator = backend.create_command_allocator()?;

        let mut renderer = Self {
            scheduler: PassScheduler::new(config.light_binning),
            culler: VisibilityCuller::new(&config),
            config,
            backend,
            timeline,
            ring,
            table,
            regions,
            resources,
            textures: TextureRegistry::new(),
            pool,
            profiler: CpuProfiler::new(),
            overlay: None,
            init_allocator,
            command_list: CommandList::new(),
            sdf_textures: Vec::new(),
            mesh_sdfs: Vec::new(),
            retired_textures: Vec::new(),
            frame_view_proj: None,
            last_cull: CullStats::default(),
            frame_open: false,
            frame_count: 0,
        };
        renderer.settle_depth()?;
        log::info!(
            "Renderer ready: {} frame slots, {}x{}",
            renderer.ring.len(),
            renderer.config.width,
            renderer.config.height
        );
        Ok(renderer)
    }

    /// Installs the overlay drawn by the UI pass.
    pub fn set_ui_overlay(&mut self, overlay: Box<dyn UiOverlay>) {
        self.overlay = Some(overlay);
    }

    /// Removes the overlay, returning it.
    pub fn take_ui_overlay(&mut self) -> Option<Box<dyn UiOverlay>> {
        self.overlay.take()
    }

    /// Prepares the next frame slot and culls the scene.
    ///
    /// Waits for the GPU only when the slot about to be reused is still in flight.
    pub fn update(&mut self, inputs: FrameInputs<'_>) -> Result<CullStats, RenderError> {
        self.profiler.begin_frame();
        let update_timer = ScopeTimer::start("update");

        let completed = self.timeline.completed_value();
        let reclaimed = self.table.reclaim(completed);
        if reclaimed > 0 {
            log::debug!("Reclaimed {reclaimed} texture slots");
        }
        self.destroy_retired_textures(completed);

        let FrameInputs {
            scene,
            assets,
            camera,
            lights,
            time,
        } = inputs;

        let slot = self.ring.acquire_next(&self.timeline)?;
        log::trace!("Acquired frame slot {}", slot.index());
        let frame = slot.resources_mut();
        write_object_constants(frame, scene)?;
        write_materials(frame, assets, &self.textures, &self.table)?;
        write_sdf_descriptors(frame, scene, &*assets, &self.mesh_sdfs)?;
        frame.light_cb.copy_data(0, &LightConstants::from_lights(lights, camera.position()))?;
        frame.pass_cb.copy_data(
            0,
            &pass_constants(camera, lights, self.resources.size(), time, self.frame_count),
        )?;
        frame.sky_cb.copy_data(0, &sky_constants(camera))?;
        frame.flush(self.backend.as_mut())?;

        let cull_timer = ScopeTimer::start("cull");
        let history = self.newest_depth_history()?;
        let view_proj = camera.unjittered_view_proj();
        let stats = match &history {
            Some((depth, history_view_proj)) => {
                let (width, height) = self.resources.readback_size();
                let history = DepthHistory {
                    depth,
                    width,
                    height,
                    view_proj: *history_view_proj,
                };
                self.culler
                    .cull(&self.pool, scene, &*assets, camera, Some(&history))?
            }
            None => self.culler.cull(&self.pool, scene, &*assets, camera, None)?,
        };
        self.profiler.finish(cull_timer);

        self.frame_view_proj = Some(view_proj);
        self.last_cull = stats;
        self.frame_open = true;
        self.profiler.finish(update_timer);
        Ok(stats)
    }

    /// Records, submits and presents the frame prepared by [`update`](Self::update).
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidHandle`] if no frame was prepared, or any
    /// recording, submission or presentation error.
    pub fn draw(&mut self, scene: &dyn SceneGraph, assets: &dyn AssetSource) -> Result<FrameReport, RenderError> {
        if !self.frame_open {
            return Err(RenderError::InvalidHandle(
                "no frame slot acquired; call update before draw".to_string(),
            ));
        }
        let record_timer = ScopeTimer::start("record");
        let slot = self.ring.current_mut();
        let slot_index = slot.index();
        let allocator = slot.resources().command_allocator;
        self.backend.reset_command_allocator(allocator)?;
        self.command_list.reset();

        let ctx = FrameContext {
            frame: slot.resources(),
            resources: &self.resources,
            table: &self.table,
            regions: &self.regions,
            back_buffer: self.backend.back_buffer(),
            scene,
            assets,
        };
        let recorded = self
            .scheduler
            .record_frame(&ctx, self.overlay.as_deref_mut(), &mut self.command_list)?;
        slot.resources_mut().readback_view_proj = self.frame_view_proj.take();
        self.profiler.finish(record_timer);

        let submit_timer = ScopeTimer::start("submit");
        self.backend.execute(allocator, &self.command_list)?;
        self.profiler.finish(submit_timer);

        let present_timer = ScopeTimer::start("present");
        self.backend.present()?;
        let fence_value = self.timeline.signal_and_record()?;
        self.ring.retire(slot_index, fence_value);
        self.profiler.finish(present_timer);

        let report = FrameReport {
            frame: self.frame_count,
            fence_value,
            commands: recorded.stats,
            cull: self.last_cull,
            ui_recorded: recorded.ui_recorded,
        };
        self.resources.advance_taa();
        self.frame_count += 1;
        self.frame_open = false;
        log::debug!(
            "Frame {} submitted on slot {slot_index} (fence {fence_value}): {}",
            report.frame,
            report.cull
        );
        Ok(report)
    }

    /// Recreates the size-dependent resources.
    ///
    /// Every descriptor index stays where it was; only the views change. A
    /// zero-sized surface (a minimized window) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {width}x{height}");
            return Ok(());
        }
        if (width, height) == self.resources.size() {
            return Ok(());
        }
        self.timeline.flush()?;
        self.backend.resize_surface(width, height)?;
        self.resources.resize(self.backend.as_mut(), width, height)?;
        self.resources
            .write_views(&self.table, &self.regions, self.backend.as_mut())?;
        self.settle_depth()?;
        self.config.width = width;
        self.config.height = height;
        Ok(())
    }

    /// Registers a texture so materials can reference it by `name`.
    ///
    /// The renderer owns `resource` from here on. Re-registering a name keeps
    /// its slot and retires the texture it replaces like a release would.
    pub fn register_texture(&mut self, name: &str, resource: ResourceId) -> Result<DescriptorIndex, RenderError> {
        let (index, replaced) = self
            .textures
            .register(&mut self.table, self.backend.as_mut(), name, resource)?;
        if let Some(old) = replaced {
            let retire_after = self.retire_fence();
            self.retired_textures.push((retire_after, old));
            log::debug!("Texture {old} retired after timeline value {retire_after}");
        }
        Ok(index)
    }

    /// Unregisters `name`. Its slot and resource are released once every
    /// frame that may sample it has completed, including a frame prepared by
    /// [`update`](Self::update) and not yet drawn.
    pub fn release_texture(&mut self, name: &str) -> Result<(), RenderError> {
        let retire_after = self.retire_fence();
        let resource = self.textures.release(&mut self.table, name, retire_after)?;
        self.retired_textures.push((retire_after, resource));
        log::info!("Texture '{name}' released after timeline value {retire_after}");
        Ok(())
    }

    /// Bakes the distance field of `mesh`, uploads it and returns where it lives.
    ///
    /// The caller stores the result on its mesh asset; objects using the mesh
    /// then contribute to screen-space shadows.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidHandle`] if the mesh has no CPU geometry,
    /// [`RenderError::PoolExhausted`] when every distance-field slot is used.
    pub fn bake_mesh_sdf(&mut self, mesh: &MeshAsset) -> Result<MeshSdf, RenderError> {
        let geometry = mesh
            .geometry
            .as_ref()
            .ok_or_else(|| RenderError::InvalidHandle(format!("mesh '{}' has no CPU geometry", mesh.name)))?;
        let capacity = self.config.max_meshes;
        let sdf_index = self.sdf_textures.len() as u32;
        let slot = self.regions[Region::Sdf]
            .at(sdf_index)
            .ok_or(RenderError::PoolExhausted {
                pool: Region::Sdf.label(),
                capacity,
            })?;

        let baker = SdfBaker::new(self.config.sdf_resolution, self.config.sdf_ray_count);
        let baked = baker.bake(&self.pool, geometry, &mesh.bounds)?;
        let resolution = baked.resolution;
        let texture = self.backend.create_resource(&ResourceDescriptor::Texture(TextureDescriptor {
            label: "mesh_sdf",
            width: resolution,
            height: resolution,
            depth: resolution,
            mip_levels: 1,
            dimension: TextureDimension::D3,
            format: TextureFormat::R32Float,
            usage: TextureUsage::Sampled,
            clear: None,
        }))?;
        let bytes = baked.as_bytes();
        let staging = self.backend.create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
            label: "sdf_staging",
            size: bytes.len() as u64,
            usage: BufferUsage::Upload,
        }))?;
        self.backend.write_buffer(staging, 0, bytes)?;

        let mut list = CommandList::new();
        list.transition_all(&[Transition::new(texture, ResourceState::GenericRead, ResourceState::CopyDest)]);
        list.copy_resource(texture, staging);
        list.transition_all(&[Transition::new(texture, ResourceState::CopyDest, ResourceState::GenericRead)]);
        self.submit_immediate(&list)?;
        self.backend.destroy_resource(staging);

        self.table
            .write_view(self.backend.as_mut(), slot, &ResourceView::volume(texture))?;
        self.sdf_textures.push(texture);
        self.mesh_sdfs.push(MeshSdfDescriptor {
            half_extent: baked.half_extent,
            radius: mesh.bounds.half_extents().length(),
            resolution: resolution as i32,
            _pad: 0.0,
        });
        log::info!(
            "Baked {resolution}^3 distance field of '{}' into slot {sdf_index}",
            mesh.name
        );
        Ok(MeshSdf {
            sdf_index,
            resolution,
            half_extent: baked.half_extent,
        })
    }

    /// Waits for the GPU to go idle and logs the frame timings.
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        self.timeline.flush()?;
        self.profiler.log_summary();
        if let Some(times) = self.backend.pass_timings() {
            for (pass, time) in times.iter() {
                log::info!("{:>17}: {:.3} ms on the GPU", pass.name(), time.as_secs_f64() * 1000.0);
            }
        }
        log::info!("Renderer shut down after {} frames", self.frame_count);
        Ok(())
    }

    /// The active configuration, with the current surface size.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Describes the backend.
    pub fn backend_info(&self) -> BackendInfo {
        self.backend.info()
    }

    /// The GPU timeline.
    pub fn timeline(&self) -> &GpuTimeline {
        &self.timeline
    }

    /// The descriptor table.
    pub fn descriptor_table(&self) -> &DescriptorTable {
        &self.table
    }

    /// Where each descriptor region sits in the table.
    pub fn regions(&self) -> &PerRegion<DescriptorRange> {
        &self.regions
    }

    /// Pass resources.
    pub fn resources(&self) -> &PassResources {
        &self.resources
    }

    /// Registered textures.
    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    /// The pass scheduler.
    pub fn scheduler(&self) -> &PassScheduler {
        &self.scheduler
    }

    /// The command list of the last recorded frame.
    pub fn last_commands(&self) -> &CommandList {
        &self.command_list
    }

    /// CPU timings.
    pub fn profiler(&self) -> &CpuProfiler {
        &self.profiler
    }

    /// GPU time of each pass in the newest completed frame, if the backend measures it.
    pub fn gpu_pass_timings(&self) -> Option<PerPass<Duration>> {
        self.backend.pass_timings()
    }

    /// The worker pool, shared with callers that bake offline data.
    pub fn thread_pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Frames submitted so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Moves a freshly created depth buffer from its creation state to its resting state.
    fn settle_depth(&mut self) -> Result<(), RenderError> {
        let mut list = CommandList::new();
        list.transition_all(&[Transition::new(
            self.resources.depth(),
            ResourceState::DepthWrite,
            ResourceState::GenericRead,
        )]);
        self.submit_immediate(&list)
    }

    /// Executes `list` and waits for it. Only used outside the frame loop.
    fn submit_immediate(&mut self, list: &CommandList) -> Result<(), RenderError> {
        self.backend.reset_command_allocator(self.init_allocator)?;
        self.backend.execute(self.init_allocator, list)?;
        self.timeline.flush()?;
        Ok(())
    }

    /// The newest readback whose frame the GPU has finished, decoded.
    fn newest_depth_history(&self) -> Result<Option<(Vec<f32>, Mat4)>, RenderError> {
        let newest = self
            .ring
            .slots()
            .filter(|slot| slot.fence_value() != 0 && self.timeline.is_complete(slot.fence_value()))
            .filter_map(|slot| {
                let frame = slot.resources();
                frame
                    .readback_view_proj
                    .map(|view_proj| (slot.fence_value(), frame.depth_readback, view_proj))
            })
            .max_by_key(|(fence, _, _)| *fence);
        let Some((fence, readback, view_proj)) = newest else {
            return Ok(None);
        };
        let (width, height) = self.resources.readback_size();
        let mut bytes = vec![0u8; (width as usize) * (height as usize) * std::mem::size_of::<f32>()];
        self.backend.read_buffer(readback, 0, &mut bytes)?;
        log::trace!("Occlusion history from timeline value {fence}");
        Ok(Some((depth_from_readback(&bytes), view_proj)))
    }

    /// The timeline value after which nothing submitted or about to be submitted
    /// still reads the texture table. An open frame signals one past the current value.
    fn retire_fence(&self) -> u64 {
        self.timeline.current_value() + u64::from(self.frame_open)
    }

    fn destroy_retired_textures(&mut self, completed: u64) {
        let backend = self.backend.as_mut();
        self.retired_textures.retain(|(retire_after, resource)| {
            if *retire_after <= completed {
                backend.destroy_resource(*resource);
                false
            } else {
                true
            }
        });
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("backend", &self.backend)
            .field("timeline", &self.timeline)
            .field("frame_slots", &self.ring.len())
            .field("frame_count", &self.frame_count)
            .field("has_ui_overlay", &self.overlay.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(err) = self.timeline.flush() {
            log::error!("Failed to drain the GPU while dropping the renderer: {err}");
        }
    }
}

/// Writes the constants of every object whose slot copy is stale.
fn write_object_constants(frame: &mut FrameResources, scene: &mut dyn SceneGraph) -> Result<(), RenderError> {
    let mut result = Ok(());
    for layer in RenderLayer::ALL {
        scene.for_each_mut(layer, &mut |object| {
            if result.is_err() || object.frames_dirty() == 0 {
                return;
            }
            let constants = ObjectConstants::new(&object.transform(), &object.prev_transform(), &object.tex_transform());
            result = frame.object_cb.copy_data(object.object_index(), &constants);
            object.mark_slot_updated();
        });
        if result.is_err() {
            break;
        }
    }
    result
}

/// Writes every material whose slot copy is stale.
fn write_materials(
    frame: &mut FrameResources,
    assets: &mut dyn AssetSource,
    textures: &TextureRegistry,
    table: &DescriptorTable,
) -> Result<(), RenderError> {
    for i in 0..assets.material_count() {
        let Some(material) = assets.material_mut(i) else {
            continue;
        };
        if material.frames_dirty == 0 {
            continue;
        }
        let data = MaterialData::from_asset(material, |name| textures.pool_index(table, name))?;
        frame.material_buffer.copy_data(material.id.0, &data)?;
        material.frames_dirty -= 1;
    }
    Ok(())
}

/// Writes the distance-field placement of every deferred object whose mesh has a field.
fn write_sdf_descriptors(
    frame: &mut FrameResources,
    scene: &dyn SceneGraph,
    assets: &dyn AssetSource,
    mesh_sdfs: &[MeshSdfDescriptor],
) -> Result<(), RenderError> {
    let mut count = 0u32;
    let mut result = Ok(());
    scene.for_each(CULLED_LAYER, &mut |object| {
        if result.is_err() {
            return;
        }
        let Some(sdf) = assets.mesh(object.mesh()).and_then(|mesh| mesh.sdf) else {
            return;
        };
        result = frame
            .scene_object_sdf
            .copy_data(count, &SceneObjectSdfDescriptor::new(&object.transform(), sdf.sdf_index));
        count += 1;
    });
    result?;
    frame.scene_object_sdf_count = count;
    for (i, descriptor) in mesh_sdfs.iter().enumerate() {
        frame.mesh_sdf.copy_data(i as u32, descriptor)?;
    }
    Ok(())
}
