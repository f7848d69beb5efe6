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

//! The per-frame culling state machine.
//!
//! ```text
//! ResetAll ──► FrustumPass ──► OcclusionPass ──► Finalize
//!                               (only with a completed depth history)
//! ```
//!
//! Each parallel stage snapshots what the workers need into an `Arc`, maps
//! object indices to verdicts on the [`ThreadPool`], and writes the verdicts
//! back on the calling thread. Workers never touch the scene.

use super::frustum::is_outside_frustum;
use super::occlusion::{DenseOcclusion, MaskedOcclusion, OcclusionStrategy};
use super::reprojection::{DepthHistory, ReprojectedDepthBuffer};
use deferra_core::math::{Aabb, DepthConvention, Frustum, Mat4};
use deferra_core::renderer::{CullStats, OcclusionMode};
use deferra_core::scene::{AssetSource, Camera, CullState, RenderLayer, SceneGraph};
use deferra_core::{RenderError, RendererConfig, ThreadPool};
use std::sync::Arc;

/// The only layer the culler touches.
pub const CULLED_LAYER: RenderLayer = RenderLayer::Deferred;

#[derive(Debug, Clone, Copy)]
struct CullItem {
    world: Mat4,
    bounds: Aabb,
}

/// Runs frustum and occlusion culling over the deferred layer.
#[derive(Debug)]
pub struct VisibilityCuller {
    min_chunk: usize,
    convention: DepthConvention,
    occlusion: OcclusionMode,
    depth_range: (f32, f32),
    last_stats: CullStats,
}

impl VisibilityCuller {
    /// Creates a culler configured from `config`.
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            min_chunk: config.min_cull_chunk,
            convention: config.depth_convention(),
            occlusion: config.occlusion,
            depth_range: config.occlusion_depth_range,
            last_stats: CullStats::default(),
        }
    }

    /// Counts from the last [`cull`](Self::cull).
    pub fn last_stats(&self) -> CullStats {
        self.last_stats
    }

    /// The configured occlusion strategy.
    pub fn occlusion_mode(&self) -> OcclusionMode {
        self.occlusion
    }

    /// Runs every stage for one frame.
    ///
    /// `history` is the newest depth readback the GPU has finished writing;
    /// without one the occlusion stage is skipped.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidHandle`] if an object references an unknown mesh,
    /// [`RenderError::WorkerPanicked`] if a chunk panicked.
    pub fn cull(
        &mut self,
        pool: &ThreadPool,
        scene: &mut dyn SceneGraph,
        assets: &dyn AssetSource,
        camera: &dyn Camera,
        history: Option<&DepthHistory<'_>>,
    ) -> Result<CullStats, RenderError> {
        let items = Arc::new(gather(scene, assets)?);

        Self::reset_all(scene);
        self.frustum_pass(pool, scene, &items, camera)?;

        if let Some(history) = history {
            if let Some(strategy) = self.build_strategy(history, &camera.unjittered_view_proj()) {
                self.occlusion_pass(pool, scene, &items, camera, strategy)?;
            }
        }

        let stats = Self::finalize(scene);
        log::debug!("Culling: {stats}");
        self.last_stats = stats;
        Ok(stats)
    }

    /// Marks every culled-layer object [`CullState::Visible`].
    pub fn reset_all(scene: &mut dyn SceneGraph) {
        scene.for_each_mut(CULLED_LAYER, &mut |object| object.set_cull_state(CullState::Visible));
    }

    fn frustum_pass(
        &self,
        pool: &ThreadPool,
        scene: &mut dyn SceneGraph,
        items: &Arc<Vec<CullItem>>,
        camera: &dyn Camera,
    ) -> Result<(), RenderError> {
        let frustum = Frustum::from_matrix(&camera.unjittered_proj());
        let view = camera.view();
        let shared = Arc::clone(items);
        let culled = pool.map_range(items.len(), self.min_chunk, "frustum culling", move |i| {
            let item = &shared[i];
            is_outside_frustum(&frustum, &view, &item.world, &item.bounds)
        })?;
        apply(scene, &culled, CullState::FrustumCulled);
        Ok(())
    }

    /// Reprojects `history` into `view_proj` and wraps it in the configured strategy.
    ///
    /// Returns `None` when occlusion is disabled.
    pub fn build_strategy(&self, history: &DepthHistory<'_>, view_proj: &Mat4) -> Option<Arc<dyn OcclusionStrategy>> {
        if self.occlusion == OcclusionMode::Disabled {
            return None;
        }
        let buffer = ReprojectedDepthBuffer::reproject(history, view_proj, self.convention, self.depth_range);
        Some(match self.occlusion {
            OcclusionMode::Masked => Arc::new(MaskedOcclusion::new(&buffer)),
            _ => Arc::new(DenseOcclusion::new(buffer)),
        })
    }

    fn occlusion_pass(
        &self,
        pool: &ThreadPool,
        scene: &mut dyn SceneGraph,
        items: &Arc<Vec<CullItem>>,
        camera: &dyn Camera,
        strategy: Arc<dyn OcclusionStrategy>,
    ) -> Result<(), RenderError> {
        let mut skip = Vec::with_capacity(items.len());
        scene.for_each(CULLED_LAYER, &mut |object| skip.push(!object.cull_state().is_visible()));
        let skip = Arc::new(skip);

        let view_proj = camera.unjittered_view_proj();
        let shared = Arc::clone(items);
        let name = strategy.name();
        let occluded = pool.map_range(items.len(), self.min_chunk, "occlusion culling", move |i| {
            if skip.get(i).copied().unwrap_or(true) {
                return false;
            }
            let item = &shared[i];
            strategy.is_box_occluded(&item.bounds, &(view_proj * item.world))
        })?;
        log::trace!("Occlusion pass ran with the {name} strategy");
        apply(scene, &occluded, CullState::OcclusionCulled);
        Ok(())
    }

    /// Tallies the cull states of the culled layer.
    pub fn finalize(scene: &dyn SceneGraph) -> CullStats {
        let mut stats = CullStats::default();
        scene.for_each(CULLED_LAYER, &mut |object| match object.cull_state() {
            CullState::Visible => stats.visible += 1,
            CullState::FrustumCulled => stats.frustum_culled += 1,
            CullState::OcclusionCulled => stats.occlusion_culled += 1,
        });
        stats
    }
}

fn gather(scene: &dyn SceneGraph, assets: &dyn AssetSource) -> Result<Vec<CullItem>, RenderError> {
    let count = scene.object_count(CULLED_LAYER);
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        let object = scene
            .object(CULLED_LAYER, i)
            .ok_or_else(|| RenderError::InvalidHandle(format!("deferred object {i}")))?;
        let mesh = assets
            .mesh(object.mesh())
            .ok_or_else(|| RenderError::InvalidHandle(format!("{:?} of object {}", object.mesh(), object.object_index())))?;
        items.push(CullItem {
            world: object.transform(),
            bounds: mesh.bounds,
        });
    }
    Ok(items)
}

fn apply(scene: &mut dyn SceneGraph, verdicts: &[bool], state: CullState) {
    for (i, _) in verdicts.iter().enumerate().filter(|(_, culled)| **culled) {
        if let Some(object) = scene.object_mut(CULLED_LAYER, i) {
            object.set_cull_state(state);
        }
    }
}
