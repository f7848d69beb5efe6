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

//! The static descriptor regions every pass addresses, in reservation order.

use deferra_core::RendererConfig;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Every region of the descriptor table, in reservation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// UI font atlas.
    Ui,
    /// Sky cubemap.
    Sky,
    /// Scene depth.
    Depth,
    /// Downsampled depth: SRV then UAV.
    DepthDownsample,
    /// The four G-buffer targets.
    GBuffer,
    /// Light bins: SRV then UAV.
    TileCluster,
    /// Screen-space shadow target.
    ScreenSpaceShadow,
    /// Light accumulation target.
    Light,
    /// TAA history 0, history 1, output.
    Taa,
    /// Motion blur target.
    MotionBlur,
    /// Irradiance, BRDF LUT, then one prefiltered cube per level.
    Ibl,
    /// Dynamically registered textures.
    Texture,
    /// Baked mesh distance fields.
    Sdf,
}

impl Region {
    /// Number of regions.
    pub const COUNT: usize = 13;

    /// Reservation order.
    pub const ALL: [Region; Region::COUNT] = [
        Region::Ui,
        Region::Sky,
        Region::Depth,
        Region::DepthDownsample,
        Region::GBuffer,
        Region::TileCluster,
        Region::ScreenSpaceShadow,
        Region::Light,
        Region::Taa,
        Region::MotionBlur,
        Region::Ibl,
        Region::Texture,
        Region::Sdf,
    ];

    /// Position of this region in [`Region::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name the region is reserved under, as it shows in logs and errors.
    pub const fn label(self) -> &'static str {
        match self {
            Region::Ui => "ui",
            Region::Sky => "sky",
            Region::Depth => "depth",
            Region::DepthDownsample => "depth_downsample",
            Region::GBuffer => "gbuffer",
            Region::TileCluster => "tile_cluster",
            Region::ScreenSpaceShadow => "screen_space_shadow",
            Region::Light => "light",
            Region::Taa => "taa",
            Region::MotionBlur => "motion_blur",
            Region::Ibl => "ibl",
            Region::Texture => "texture",
            Region::Sdf => "sdf",
        }
    }

    /// Descriptors the region holds under `config`.
    pub fn count(self, config: &RendererConfig) -> u32 {
        match self {
            Region::Ui | Region::Sky | Region::Depth => 1,
            Region::DepthDownsample | Region::TileCluster => 2,
            Region::GBuffer => GBUFFER_COUNT,
            Region::ScreenSpaceShadow | Region::Light | Region::MotionBlur => 1,
            Region::Taa => 3,
            Region::Ibl => 2 + config.prefilter_levels,
            Region::Texture => config.max_texture_count,
            Region::Sdf => config.max_meshes,
        }
    }

    /// Whether slots are handed out at runtime rather than fixed at build.
    pub const fn is_dynamic(self) -> bool {
        matches!(self, Region::Texture)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per region, indexed by [`Region`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerRegion<T>([T; Region::COUNT]);

impl<T> PerRegion<T> {
    /// Builds the table by calling `f` once per region, in reservation order.
    pub fn from_fn(mut f: impl FnMut(Region) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Region::ALL[i])))
    }

    /// Iterates `(region, value)` pairs in reservation order.
    pub fn iter(&self) -> impl Iterator<Item = (Region, &T)> {
        Region::ALL.iter().copied().zip(self.0.iter())
    }
}

impl<T> Index<Region> for PerRegion<T> {
    type Output = T;
    fn index(&self, region: Region) -> &T {
        &self.0[region.index()]
    }
}

impl<T> IndexMut<Region> for PerRegion<T> {
    fn index_mut(&mut self, region: Region) -> &mut T {
        &mut self.0[region.index()]
    }
}

/// G-buffer target count.
pub const GBUFFER_COUNT: u32 = 4;

/// G-buffer index of the velocity target.
pub const GBUFFER_VELOCITY: u32 = 2;

/// Offset of the UAV within a region holding an SRV/UAV pair.
pub const UAV_OFFSET: u32 = 1;

/// Offset of the TAA output within [`Region::Taa`].
pub const TAA_OUTPUT_OFFSET: u32 = 2;

/// One entry of the region table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDecl {
    /// Which region.
    pub region: Region,
    /// Descriptors in the region.
    pub count: u32,
    /// Whether slots are handed out at runtime.
    pub dynamic: bool,
}

/// The regions with their sizes under `config`. Iterating the result yields
/// them in the order they must be reserved.
pub fn descriptor_regions(config: &RendererConfig) -> PerRegion<RegionDecl> {
    PerRegion::from_fn(|region| RegionDecl {
        region,
        count: region.count(config),
        dynamic: region.is_dynamic(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_order_and_counts() {
        let config = RendererConfig {
            prefilter_levels: 5,
            max_texture_count: 100,
            max_meshes: 8,
            ..Default::default()
        };
        let regions = descriptor_regions(&config);
        let order: Vec<_> = regions.iter().map(|(region, _)| region.label()).collect();
        assert_eq!(
            order,
            [
                "ui",
                "sky",
                "depth",
                "depth_downsample",
                "gbuffer",
                "tile_cluster",
                "screen_space_shadow",
                "light",
                "taa",
                "motion_blur",
                "ibl",
                "texture",
                "sdf"
            ]
        );
        let total: u32 = regions.iter().map(|(_, decl)| decl.count).sum();
        assert_eq!(total, 1 + 1 + 1 + 2 + 4 + 2 + 1 + 1 + 3 + 1 + 7 + 100 + 8);
        assert_eq!(regions.iter().filter(|(_, decl)| decl.dynamic).count(), 1);
        assert_eq!(regions[Region::Ibl].count, 7);
    }

    #[test]
    fn test_region_index_matches_reservation_order() {
        for (i, region) in Region::ALL.iter().enumerate() {
            assert_eq!(region.index(), i);
        }
        let decls = descriptor_regions(&RendererConfig::default());
        for (region, decl) in decls.iter() {
            assert_eq!(decl.region, region);
        }
        assert!(decls[Region::Texture].dynamic);
    }
}
