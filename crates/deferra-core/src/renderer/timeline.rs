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

//! The CPU-side view of GPU progress.
//!
//! ```text
//!   CPU  ──draw(0)──signal 1──draw(1)──signal 2──draw(2)──signal 3──wait_until(1)──▶
//!   GPU        ╰──────exec 0────▶ 1 ──exec 1──▶ 2 ──exec 2──▶ 3
//! ```
//!
//! Every blocking wait of the frame loop goes through [`GpuTimeline`].

use super::error::RenderError;
use super::traits::GpuFence;
use std::sync::Arc;

/// A monotonically increasing fence counter shared with the GPU queue.
pub struct GpuTimeline {
    fence: Arc<dyn GpuFence>,
    current: u64,
}

impl GpuTimeline {
    /// Wraps a queue fence. The counter starts at the fence's completed value.
    pub fn new(fence: Arc<dyn GpuFence>) -> Self {
        let current = fence.completed_value();
        Self { fence, current }
    }

    /// The last value handed out by [`signal_and_record`](Self::signal_and_record).
    #[must_use]
    pub fn current_value(&self) -> u64 {
        self.current
    }

    /// The last value the GPU reports as completed.
    #[must_use]
    pub fn completed_value(&self) -> u64 {
        self.fence.completed_value()
    }

    /// Returns `true` if the GPU has reached `value`.
    #[must_use]
    pub fn is_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }

    /// Advances the counter and enqueues a GPU signal for the new value.
    ///
    /// # Errors
    ///
    /// Propagates [`RenderError::DeviceSubmissionFailure`] from the queue. Fatal.
    pub fn signal_and_record(&mut self) -> Result<u64, RenderError> {
        let value = self.current + 1;
        self.fence.signal(value)?;
        self.current = value;
        log::trace!("Signaled GPU timeline value {value}");
        Ok(value)
    }

    /// Blocks until the GPU reaches `value`. Returns immediately if it already has.
    pub fn wait_until(&self, value: u64) -> Result<(), RenderError> {
        if self.is_complete(value) {
            return Ok(());
        }
        log::trace!(
            "Waiting for GPU timeline value {value} (completed {})",
            self.completed_value()
        );
        self.fence.wait_for_value(value)
    }

    /// Signals a new value and waits for it, draining all submitted GPU work.
    pub fn flush(&mut self) -> Result<u64, RenderError> {
        let value = self.signal_and_record()?;
        self.wait_until(value)?;
        Ok(value)
    }
}

impl std::fmt::Debug for GpuTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTimeline")
            .field("current", &self.current)
            .field("completed", &self.completed_value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Completes signals immediately and counts waits.
    #[derive(Default)]
    struct ImmediateFence {
        completed: AtomicU64,
        waits: AtomicUsize,
        fail_signal: bool,
    }

    impl GpuFence for ImmediateFence {
        fn signal(&self, value: u64) -> Result<(), RenderError> {
            if self.fail_signal {
                return Err(RenderError::DeviceSubmissionFailure("device removed".into()));
            }
            self.completed.store(value, Ordering::SeqCst);
            Ok(())
        }
        fn completed_value(&self) -> u64 {
            self.completed.load(Ordering::SeqCst)
        }
        fn wait_for_value(&self, _value: u64) -> Result<(), RenderError> {
            self.waits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Never completes on its own; records requested waits.
    #[derive(Default)]
    struct StalledFence {
        signaled: Mutex<Vec<u64>>,
        waited: Mutex<Vec<u64>>,
    }

    impl GpuFence for StalledFence {
        fn signal(&self, value: u64) -> Result<(), RenderError> {
            self.signaled.lock().unwrap().push(value);
            Ok(())
        }
        fn completed_value(&self) -> u64 {
            0
        }
        fn wait_for_value(&self, value: u64) -> Result<(), RenderError> {
            self.waited.lock().unwrap().push(value);
            Ok(())
        }
    }

    #[test]
    fn test_signal_values_increase_by_one() {
        let fence = Arc::new(StalledFence::default());
        let mut timeline = GpuTimeline::new(fence.clone());
        assert_eq!(timeline.signal_and_record().unwrap(), 1);
        assert_eq!(timeline.signal_and_record().unwrap(), 2);
        assert_eq!(timeline.current_value(), 2);
        assert_eq!(*fence.signaled.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_wait_is_skipped_when_already_complete() {
        let fence = Arc::new(ImmediateFence::default());
        let mut timeline = GpuTimeline::new(fence.clone());
        let v = timeline.signal_and_record().unwrap();
        timeline.wait_until(v).unwrap();
        timeline.wait_until(0).unwrap();
        assert_eq!(fence.waits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_flush_waits_on_the_new_value() {
        let fence = Arc::new(StalledFence::default());
        let mut timeline = GpuTimeline::new(fence.clone());
        timeline.signal_and_record().unwrap();
        let flushed = timeline.flush().unwrap();
        assert_eq!(flushed, 2);
        assert_eq!(*fence.waited.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_failed_signal_does_not_advance() {
        let fence = Arc::new(ImmediateFence {
            fail_signal: true,
            ..Default::default()
        });
        let mut timeline = GpuTimeline::new(fence);
        let err = timeline.signal_and_record().unwrap_err();
        assert!(matches!(err, RenderError::DeviceSubmissionFailure(_)));
        assert_eq!(timeline.current_value(), 0);
    }
}
