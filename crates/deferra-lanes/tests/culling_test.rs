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

mod common;

use common::{TestAssets, TestCamera, TestScene};
use deferra_core::math::{Vec3, Vec4};
use deferra_core::renderer::OcclusionMode;
use deferra_core::scene::{Camera, CullState};
use deferra_core::thread_pool::{chunk_ranges, chunk_size};
use deferra_core::{RendererConfig, ThreadPool};
use deferra_lanes::{DepthHistory, VisibilityCuller};

const READBACK_W: u32 = 64;
const READBACK_H: u32 = 32;

fn config(occlusion: OcclusionMode) -> RendererConfig {
    RendererConfig {
        occlusion,
        depth_readback_width: READBACK_W,
        depth_readback_height: READBACK_H,
        occlusion_depth_range: (0.5, 1000.0),
        ..Default::default()
    }
}

/// A readback where every texel holds the depth of a plane `distance` in front of the camera.
fn wall_depth(camera: &TestCamera, distance: f32) -> Vec<f32> {
    let clip = camera.unjittered_view_proj() * Vec4::new(0.0, 0.0, -distance, 1.0);
    vec![clip.z / clip.w; (READBACK_W * READBACK_H) as usize]
}

#[test]
fn test_far_plane_and_near_plane_objects() {
    for reverse_z in [false, true] {
        let camera = TestCamera::new(reverse_z);
        let mut scene = TestScene::with_cubes([
            Vec3::new(0.0, 0.0, -150.0), // beyond far
            Vec3::new(0.0, 0.0, -1.0),   // straddles near
            Vec3::new(0.0, 0.0, 3.0),    // behind the eye
            Vec3::new(0.0, 0.0, -20.0),  // plainly visible
        ]);
        let mut culler = VisibilityCuller::new(&RendererConfig {
            reverse_z,
            ..config(OcclusionMode::Disabled)
        });
        let pool = ThreadPool::new(2);

        let stats = culler
            .cull(&pool, &mut scene, &TestAssets::cube(), &camera, None)
            .unwrap();
        assert_eq!(
            scene.states(),
            vec![
                CullState::FrustumCulled,
                CullState::Visible,
                CullState::FrustumCulled,
                CullState::Visible
            ],
            "reverse_z = {reverse_z}"
        );
        assert_eq!((stats.visible, stats.frustum_culled, stats.occlusion_culled), (2, 2, 0));
        assert_eq!(culler.last_stats(), stats);
    }
}

#[test]
fn test_culling_twice_yields_same_visibility() {
    let camera = TestCamera::new(true);
    let positions = (0..500).map(|i| {
        let f = i as f32;
        Vec3::new((f * 7.3) % 200.0 - 100.0, (f * 3.1) % 40.0 - 20.0, -(f * 1.7) % 150.0)
    });
    let mut scene = TestScene::with_cubes(positions);
    let mut culler = VisibilityCuller::new(&config(OcclusionMode::Disabled));
    let pool = ThreadPool::new(4);

    let first_stats = culler.cull(&pool, &mut scene, &TestAssets::cube(), &camera, None).unwrap();
    let first = scene.states();
    let second_stats = culler.cull(&pool, &mut scene, &TestAssets::cube(), &camera, None).unwrap();
    assert_eq!(first, scene.states());
    assert_eq!(first_stats, second_stats);
    assert!(first_stats.frustum_culled > 0 && first_stats.visible > 0);
}

#[test]
fn test_box_behind_reprojected_wall_is_occlusion_culled() {
    for mode in [OcclusionMode::Dense, OcclusionMode::Masked] {
        let camera = TestCamera::new(true);
        let mut scene = TestScene::with_cubes([Vec3::new(0.0, 0.0, -30.0), Vec3::new(0.0, 0.0, -5.0)]);
        let mut culler = VisibilityCuller::new(&config(mode));
        let pool = ThreadPool::new(2);
        let depth = wall_depth(&camera, 10.0);
        let history = DepthHistory {
            depth: &depth,
            width: READBACK_W,
            height: READBACK_H,
            view_proj: camera.unjittered_view_proj(),
        };

        let stats = culler
            .cull(&pool, &mut scene, &TestAssets::cube(), &camera, Some(&history))
            .unwrap();
        assert_eq!(scene.states(), vec![CullState::OcclusionCulled, CullState::Visible], "{mode:?}");
        assert_eq!(stats.occlusion_culled, 1);
    }
}

#[test]
fn test_occlusion_skipped_without_history_or_when_disabled() {
    let camera = TestCamera::new(true);
    let depth = wall_depth(&camera, 10.0);
    let history = DepthHistory {
        depth: &depth,
        width: READBACK_W,
        height: READBACK_H,
        view_proj: camera.unjittered_view_proj(),
    };
    let pool = ThreadPool::new(1);

    let mut scene = TestScene::with_cubes([Vec3::new(0.0, 0.0, -30.0)]);
    let mut culler = VisibilityCuller::new(&config(OcclusionMode::Dense));
    culler.cull(&pool, &mut scene, &TestAssets::cube(), &camera, None).unwrap();
    assert_eq!(scene.states(), vec![CullState::Visible]);

    let mut culler = VisibilityCuller::new(&config(OcclusionMode::Disabled));
    culler
        .cull(&pool, &mut scene, &TestAssets::cube(), &camera, Some(&history))
        .unwrap();
    assert_eq!(scene.states(), vec![CullState::Visible]);
}

#[test]
fn test_frustum_culled_objects_are_not_reclassified_as_occluded() {
    let camera = TestCamera::new(true);
    let mut scene = TestScene::with_cubes([Vec3::new(0.0, 0.0, -150.0)]);
    let mut culler = VisibilityCuller::new(&config(OcclusionMode::Dense));
    let depth = wall_depth(&camera, 10.0);
    let history = DepthHistory {
        depth: &depth,
        width: READBACK_W,
        height: READBACK_H,
        view_proj: camera.unjittered_view_proj(),
    };
    culler
        .cull(&ThreadPool::new(2), &mut scene, &TestAssets::cube(), &camera, Some(&history))
        .unwrap();
    assert_eq!(scene.states(), vec![CullState::FrustumCulled]);
}

#[test]
fn test_every_object_is_classified_exactly_once() {
    let camera = TestCamera::new(true);
    let pool = ThreadPool::new(8);
    for count in [0usize, 1, 99, 100, 101, 10_000] {
        let positions = (0..count).map(|i| Vec3::new(0.0, 0.0, if i % 2 == 0 { -10.0 } else { 10.0 }));
        let mut scene = TestScene::with_cubes(positions);
        let mut culler = VisibilityCuller::new(&config(OcclusionMode::Disabled));
        let stats = culler.cull(&pool, &mut scene, &TestAssets::cube(), &camera, None).unwrap();
        assert_eq!(stats.total() as usize, count);
        assert_eq!(stats.visible as usize, count.div_ceil(2));
        assert_eq!(stats.frustum_culled as usize, count / 2);

        let chunk = chunk_size(count, pool.thread_count(), 100);
        let mut seen = vec![0u8; count];
        for range in chunk_ranges(count, chunk) {
            for i in range {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|n| *n == 1), "count = {count}");
    }
}

#[test]
fn test_missing_mesh_is_an_error() {
    let camera = TestCamera::new(true);
    let mut scene = TestScene::with_cubes([Vec3::ZERO]);
    scene.deferred[0].mesh = deferra_core::scene::MeshId(9);
    let mut culler = VisibilityCuller::new(&config(OcclusionMode::Disabled));
    let err = culler
        .cull(&ThreadPool::new(1), &mut scene, &TestAssets::cube(), &camera, None)
        .unwrap_err();
    assert!(matches!(err, deferra_core::RenderError::InvalidHandle(_)));
}
