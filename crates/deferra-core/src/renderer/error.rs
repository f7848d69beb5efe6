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

//! Defines the error type used throughout the rendering core.
//!
//! Every variant except [`RenderError::UiOverlay`] is fatal: callers propagate
//! it with `?` up to the application, which terminates. No subsystem attempts
//! a partial-frame recovery.

use thiserror::Error;

/// An error raised by the rendering core or by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The graphics device rejected a submission, a signal or a wait.
    #[error("Device submission failure: {0}")]
    DeviceSubmissionFailure(String),

    /// A fixed-capacity pool has no free entry left.
    #[error("Pool '{pool}' exhausted (capacity {capacity})")]
    PoolExhausted {
        /// Name of the pool.
        pool: &'static str,
        /// Its fixed capacity.
        capacity: u32,
    },

    /// An opaque handle resolved to an object of an unexpected kind.
    #[error("Handle cast mismatch: expected {expected}, found {found}")]
    CastMismatch {
        /// The kind the caller required.
        expected: &'static str,
        /// The kind the handle actually refers to.
        found: &'static str,
    },

    /// A handle does not refer to any live object.
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// A material declares more parameters of one kind than the GPU layout holds.
    #[error("Material '{material}' has {count} {kind} parameters, limit is {limit}")]
    MaterialLimitExceeded {
        /// Name of the offending material.
        material: String,
        /// Which parameter kind overflowed (`textures`, `scalars` or `vectors`).
        kind: &'static str,
        /// The number of parameters declared.
        count: usize,
        /// The layout limit.
        limit: usize,
    },

    /// A material references a texture that was never registered.
    #[error("Texture not found: {0}")]
    MissingTexture(String),

    /// The renderer configuration is unusable.
    #[error("Invalid renderer configuration: {0}")]
    InvalidConfig(String),

    /// A worker task panicked while computing part of a parallel stage.
    #[error("A worker thread panicked during {0}")]
    WorkerPanicked(&'static str),

    /// The optional UI overlay failed. Logged and ignored by the frame loop.
    #[error("UI overlay failed: {0}")]
    UiOverlay(String),
}

impl RenderError {
    /// Returns `false` only for errors the frame loop may log and ignore.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RenderError::UiOverlay(_))
    }
}

impl From<crate::thread_pool::ThreadPoolError> for RenderError {
    fn from(err: crate::thread_pool::ThreadPoolError) -> Self {
        match err {
            crate::thread_pool::ThreadPoolError::WorkerPanicked(stage) => {
                RenderError::WorkerPanicked(stage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = RenderError::PoolExhausted {
            pool: "texture",
            capacity: 4,
        };
        assert_eq!(format!("{}", err), "Pool 'texture' exhausted (capacity 4)");

        let err = RenderError::CastMismatch {
            expected: "buffer",
            found: "texture",
        };
        assert_eq!(
            format!("{}", err),
            "Handle cast mismatch: expected buffer, found texture"
        );

        let err = RenderError::DeviceSubmissionFailure("queue closed".to_string());
        assert_eq!(format!("{}", err), "Device submission failure: queue closed");
    }

    #[test]
    fn test_only_ui_overlay_is_non_fatal() {
        assert!(!RenderError::UiOverlay("x".into()).is_fatal());
        assert!(RenderError::MissingTexture("x".into()).is_fatal());
        assert!(RenderError::WorkerPanicked("culling").is_fatal());
    }
}
