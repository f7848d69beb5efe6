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

//! Named CPU scopes measured once per frame.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Scopes the renderer records every frame, in order.
pub const FRAME_SCOPES: [&str; 5] = ["update", "cull", "record", "submit", "present"];

/// A running measurement. Hand it back to [`CpuProfiler::finish`] to record it.
#[derive(Debug)]
#[must_use = "a timer records nothing until it is finished"]
pub struct ScopeTimer {
    name: &'static str,
    start: Instant,
}

impl ScopeTimer {
    /// Starts timing `name`.
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// The scope being timed.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One recorded scope of the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeSample {
    /// Scope name.
    pub name: &'static str,
    /// Measured wall time.
    pub duration: Duration,
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulated {
    total: Duration,
    samples: u32,
    max: Duration,
}

/// Collects scope durations frame by frame.
///
/// The renderer owns one explicitly; nothing here is global.
#[derive(Debug, Default)]
pub struct CpuProfiler {
    frames: u64,
    current: Vec<ScopeSample>,
    last: Vec<ScopeSample>,
    totals: HashMap<&'static str, Accumulated>,
}

impl CpuProfiler {
    /// An empty profiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the running frame and starts a new one.
    pub fn begin_frame(&mut self) {
        if !self.current.is_empty() {
            self.last = std::mem::take(&mut self.current);
            self.frames += 1;
        }
    }

    /// Records a finished timer and returns its duration.
    pub fn finish(&mut self, timer: ScopeTimer) -> Duration {
        let duration = timer.start.elapsed();
        self.record(timer.name, duration);
        duration
    }

    /// Records a duration measured elsewhere.
    pub fn record(&mut self, name: &'static str, duration: Duration) {
        self.current.push(ScopeSample { name, duration });
        let entry = self.totals.entry(name).or_default();
        entry.total += duration;
        entry.samples += 1;
        entry.max = entry.max.max(duration);
    }

    /// Times `f` under `name`.
    pub fn measure<R>(&mut self, name: &'static str, f: impl FnOnce() -> R) -> R {
        let timer = ScopeTimer::start(name);
        let result = f();
        self.finish(timer);
        result
    }

    /// Scopes of the last completed frame.
    pub fn last_frame(&self) -> &[ScopeSample] {
        &self.last
    }

    /// Scopes recorded so far in the running frame.
    pub fn current_frame(&self) -> &[ScopeSample] {
        &self.current
    }

    /// Completed frames.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Mean duration of `name` across every sample.
    pub fn average(&self, name: &str) -> Option<Duration> {
        self.totals
            .get(name)
            .filter(|acc| acc.samples > 0)
            .map(|acc| acc.total / acc.samples)
    }

    /// Longest sample of `name`.
    pub fn max(&self, name: &str) -> Option<Duration> {
        self.totals.get(name).map(|acc| acc.max)
    }

    /// Logs the averages of every frame scope at `info`.
    pub fn log_summary(&self) {
        for name in FRAME_SCOPES {
            if let Some(avg) = self.average(name) {
                log::info!(
                    "{name:>8}: avg {:.3} ms, max {:.3} ms",
                    avg.as_secs_f64() * 1000.0,
                    self.max(name).unwrap_or_default().as_secs_f64() * 1000.0
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_rotate_on_begin() {
        let mut profiler = CpuProfiler::new();
        profiler.begin_frame();
        profiler.record("update", Duration::from_millis(2));
        profiler.record("cull", Duration::from_millis(1));
        assert_eq!(profiler.current_frame().len(), 2);
        assert!(profiler.last_frame().is_empty());

        profiler.begin_frame();
        assert_eq!(profiler.frame_count(), 1);
        assert_eq!(profiler.last_frame()[0].name, "update");
        assert!(profiler.current_frame().is_empty());
    }

    #[test]
    fn test_average_and_max_accumulate() {
        let mut profiler = CpuProfiler::new();
        profiler.record("record", Duration::from_millis(2));
        profiler.record("record", Duration::from_millis(4));
        assert_eq!(profiler.average("record"), Some(Duration::from_millis(3)));
        assert_eq!(profiler.max("record"), Some(Duration::from_millis(4)));
        assert_eq!(profiler.average("present"), None);
    }

    #[test]
    fn test_measure_returns_closure_result() {
        let mut profiler = CpuProfiler::new();
        let value = profiler.measure("submit", || 41 + 1);
        assert_eq!(value, 42);
        assert_eq!(profiler.current_frame()[0].name, "submit");
    }
}
