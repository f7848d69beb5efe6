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

// Deferra sandbox
// Drives the renderer over a procedural scene on the headless backend.

mod hud;
mod scene;

use anyhow::{Context, Result};
use clap::Parser;
use deferra_agents::{FrameInputs, FrameTime, Renderer};
use deferra_core::renderer::{
    BufferDescriptor, BufferUsage, RenderBackend, ResourceDescriptor, ResourceId, TextureDescriptor, TextureFormat,
    TextureUsage,
};
use deferra_core::RendererConfig;
use deferra_infra::{HeadlessBackend, HeadlessConfig};
use deferra_telemetry::init_logging;
use hud::{HudOverlay, StatusLine, QUAD_INDICES};
use scene::{cube_vertices, lights, OrbitCamera, SandboxAssets, SandboxScene, CUBE_INDICES};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Runs the deferred frame loop without a GPU.
#[derive(Debug, Parser)]
#[command(name = "sandbox", version, about)]
struct Args {
    /// Number of frames to render.
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Number of cubes in the scene.
    #[arg(long, default_value_t = 1000)]
    objects: usize,

    /// Renderer configuration in RON. Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Surface width, overriding the configuration.
    #[arg(long)]
    width: Option<u32>,

    /// Surface height, overriding the configuration.
    #[arg(long)]
    height: Option<u32>,

    /// Simulated GPU time per submission, in milliseconds.
    #[arg(long, default_value_t = 2)]
    latency_ms: u64,

    /// Halves the surface at this frame.
    #[arg(long)]
    resize_at: Option<u64>,

    /// Device depth every readback texel reports, simulating an occluder.
    #[arg(long)]
    occluder_depth: Option<f32>,
}

fn load_config(args: &Args) -> Result<RendererConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config '{}'", path.display()))?;
            RendererConfig::from_ron_str(&source)
                .with_context(|| format!("Invalid config '{}'", path.display()))?
        }
        None => RendererConfig::default(),
    };
    config.width = args.width.unwrap_or(config.width);
    config.height = args.height.unwrap_or(config.height);
    config.validate().context("Invalid surface size")?;
    Ok(config)
}

fn upload(backend: &mut HeadlessBackend, label: &'static str, bytes: &[u8]) -> Result<ResourceId> {
    let buffer = backend.create_resource(&ResourceDescriptor::Buffer(BufferDescriptor {
        label,
        size: bytes.len() as u64,
        usage: BufferUsage::Upload,
    }))?;
    backend
        .write_buffer(buffer, 0, bytes)
        .with_context(|| format!("Failed to fill '{label}'"))?;
    Ok(buffer)
}

struct GeometryBuffers {
    cube_vertices: ResourceId,
    cube_indices: ResourceId,
    quad_vertices: ResourceId,
    quad_indices: ResourceId,
    checker: ResourceId,
}

/// Creates what the scene draws with before the backend moves into the renderer.
fn create_geometry(backend: &mut HeadlessBackend) -> Result<GeometryBuffers> {
    let quad: [[f32; 4]; 4] = [[0.0, 0.0, 0.0, 0.0], [1.0, 0.0, 1.0, 0.0], [1.0, 1.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
    let buffers = GeometryBuffers {
        cube_vertices: upload(backend, "cube_vertices", bytemuck::cast_slice(&cube_vertices()))?,
        cube_indices: upload(backend, "cube_indices", bytemuck::cast_slice(&CUBE_INDICES))?,
        quad_vertices: upload(backend, "hud_quad_vertices", bytemuck::cast_slice(&quad))?,
        quad_indices: upload(backend, "hud_quad_indices", bytemuck::cast_slice(&QUAD_INDICES))?,
        checker: backend.create_resource(&ResourceDescriptor::Texture(TextureDescriptor::target_2d(
            "checker",
            256,
            256,
            TextureFormat::Rgba8Unorm,
            TextureUsage::Sampled,
            None,
        )))?,
    };
    log::info!(" -> Geometry buffers and the checker texture created");
    Ok(buffers)
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let config = load_config(&args)?;
    let slots = config.frame_resource_count;
    let (width, height) = (config.width, config.height);

    let mut headless = HeadlessConfig::new(width, height).with_latency(Duration::from_millis(args.latency_ms));
    if let Some(depth) = args.occluder_depth {
        headless = headless.with_depth_clear(depth);
    }
    let mut backend = HeadlessBackend::new(headless).context("Failed to start the headless backend")?;
    let stats = backend.stats_handle();
    let geometry = create_geometry(&mut backend)?;

    let mut renderer = Renderer::new(Box::new(backend), config).context("Failed to build the renderer")?;
    renderer.register_texture("checker", geometry.checker)?;

    let mut scene = SandboxScene::grid(args.objects, slots);
    let mut assets = SandboxAssets::new(geometry.cube_vertices, geometry.cube_indices, slots);
    let sdf = renderer
        .bake_mesh_sdf(&assets.cube)
        .context("Failed to bake the cube distance field")?;
    assets.cube.sdf = Some(sdf);

    let status = StatusLine::default();
    renderer.set_ui_overlay(Box::new(HudOverlay::new(
        geometry.quad_vertices,
        geometry.quad_indices,
        status.clone(),
    )));

    let radius = scene.radius() * 1.5 + 5.0;
    let mut camera = OrbitCamera::new(radius, width as f32 / height as f32);
    let lights = lights(radius);
    log::info!(
        "Rendering {} frames of {} cubes on {}",
        args.frames,
        args.objects,
        renderer.backend_info().kind
    );

    let start = Instant::now();
    let mut last = start;
    for frame in 0..args.frames {
        if args.resize_at == Some(frame) {
            let (w, h) = ((width / 2).max(1), (height / 2).max(1));
            renderer.resize(w, h).context("Resize failed")?;
            camera.set_aspect(w as f32 / h as f32);
            log::info!("Resized to {w}x{h}");
        }

        let now = Instant::now();
        let time = FrameTime {
            total: (now - start).as_secs_f32(),
            delta: (now - last).as_secs_f32(),
        };
        last = now;
        let angle = frame as f32 * 0.01;
        scene.animate(time.total);
        camera.advance(angle);

        renderer.update(FrameInputs {
            scene: &mut scene,
            assets: &mut assets,
            camera: &camera,
            lights: &lights,
            time,
        })?;
        let report = renderer.draw(&scene, &assets)?;
        status.set(format!("frame {} {}", report.frame, report.cull));

        if frame % 60 == 0 {
            log::info!(
                "Frame {}: {} | {} draws, {} barriers (fence {})",
                report.frame,
                report.cull,
                report.commands.draws,
                report.commands.barriers,
                report.fence_value
            );
        }
    }

    if let Some(hit) = deferra_lanes::pick(&scene, &assets, &camera.center_ray()) {
        log::info!("Center of the screen hits cube {} at {:.2}", hit.object_index, hit.distance);
    }

    renderer.shutdown()?;
    let totals = stats.snapshot();
    log::info!(
        "{} submissions, {} presents, {} draws, {} dispatches, {} barriers, {} copies",
        totals.submissions,
        totals.presents,
        totals.commands.draws,
        totals.commands.dispatches,
        totals.commands.barriers,
        totals.commands.copies
    );
    if let Some(cull) = renderer.profiler().max("cull") {
        log::info!(" -> Slowest cull: {cull:?}");
    }
    if let Some(times) = renderer.gpu_pass_timings() {
        let gpu_total: Duration = times.iter().map(|(_, time)| *time).sum();
        log::info!(" -> Last frame spent {gpu_total:?} on the GPU");
    }
    Ok(())
}
