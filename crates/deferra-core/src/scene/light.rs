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

use crate::math::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// A light infinitely far away.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// Direction the light travels, in world space.
    pub direction: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
}

/// A light radiating from a point with a finite range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    /// Position in world space.
    pub position: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Distance at which the contribution reaches zero.
    pub range: f32,
}

/// The lights of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSet {
    /// Directional lights; the first one casts the main shadow.
    pub directional: Vec<DirectionalLight>,
    /// Point lights, binned into tiles or clusters on the GPU.
    pub point: Vec<PointLight>,
    /// Ambient term.
    pub ambient: Vec4,
}

impl Default for LightSet {
    fn default() -> Self {
        Self {
            directional: vec![DirectionalLight {
                direction: Vec3::new(0.57735, -0.57735, -0.57735),
                color: Vec3::ONE,
                intensity: 1.0,
            }],
            point: Vec::new(),
            ambient: Vec4::new(0.25, 0.25, 0.35, 1.0),
        }
    }
}
