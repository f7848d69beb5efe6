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

//! Depth-buffer conventions.

use serde::{Deserialize, Serialize};

/// How normalized device depth maps onto distance from the camera.
///
/// Both conventions use a `[0, 1]` depth range. With `Reversed`, the near
/// plane maps to `1.0` and the far plane to `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepthConvention {
    /// Near plane at `0.0`, far plane at `1.0`.
    Standard,
    /// Near plane at `1.0`, far plane at `0.0`.
    #[default]
    Reversed,
}

impl DepthConvention {
    /// Builds the convention from a `reverse_z` flag.
    pub fn from_reverse_z(reverse_z: bool) -> Self {
        if reverse_z {
            Self::Reversed
        } else {
            Self::Standard
        }
    }

    /// The depth value stored for "nothing rendered here", used for clears.
    #[inline]
    pub fn far_value(self) -> f32 {
        match self {
            Self::Standard => 1.0,
            Self::Reversed => 0.0,
        }
    }

    /// The depth value of the near plane.
    #[inline]
    pub fn near_value(self) -> f32 {
        match self {
            Self::Standard => 0.0,
            Self::Reversed => 1.0,
        }
    }

    /// Returns `true` if depth `a` is strictly closer to the camera than `b`.
    #[inline]
    pub fn is_nearer(self, a: f32, b: f32) -> bool {
        match self {
            Self::Standard => a < b,
            Self::Reversed => a > b,
        }
    }

    /// Returns the nearer of two depths.
    #[inline]
    pub fn nearer(self, a: f32, b: f32) -> f32 {
        if self.is_nearer(a, b) {
            a
        } else {
            b
        }
    }

    /// Returns the farther of two depths.
    #[inline]
    pub fn farther(self, a: f32, b: f32) -> f32 {
        if self.is_nearer(a, b) {
            b
        } else {
            a
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_depth_treats_larger_values_as_nearer() {
        let d = DepthConvention::Reversed;
        assert!(d.is_nearer(0.9, 0.1));
        assert_eq!(d.farther(0.9, 0.1), 0.1);
        assert_eq!(d.far_value(), 0.0);
    }

    #[test]
    fn standard_depth_treats_smaller_values_as_nearer() {
        let d = DepthConvention::Standard;
        assert!(d.is_nearer(0.1, 0.9));
        assert_eq!(d.nearer(0.1, 0.9), 0.1);
        assert_eq!(d.far_value(), 1.0);
    }
}
