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

//! Simulated GPU timestamps around each pass.

use deferra_core::renderer::{Command, CommandList, PassId, PerPass};
use std::collections::VecDeque;
use std::time::Duration;

/// Splits `latency` across the passes of `commands` in proportion to the
/// commands each pass recorded. Returns `None` for a list without passes.
pub(super) fn simulate_pass_times(commands: &CommandList, latency: Duration) -> Option<PerPass<Duration>> {
    let mut weights = PerPass::from_fn(|_| 0u32);
    let mut current: Option<PassId> = None;
    let mut total = 0u32;
    for command in commands.commands() {
        match command {
            Command::BeginPass(pass) => {
                current = Some(*pass);
                weights[*pass] += 1;
                total += 1;
            }
            Command::EndPass(_) => current = None,
            _ => {
                if let Some(pass) = current {
                    weights[pass] += 1;
                    total += 1;
                }
            }
        }
    }
    if total == 0 {
        return None;
    }
    Some(PerPass::from_fn(|pass| latency * weights[pass] / total))
}

/// Pass timings of submitted lists, readable once the queue completes them.
#[derive(Debug, Default)]
pub(super) struct PassTimeline {
    pending: VecDeque<(u64, PerPass<Duration>)>,
    resolved: Option<PerPass<Duration>>,
}

impl PassTimeline {
    pub(super) fn push(&mut self, submission: u64, times: PerPass<Duration>) {
        self.pending.push_back((submission, times));
    }

    /// Drops every entry older than the newest completed one.
    pub(super) fn resolve(&mut self, completed: u64) {
        while let Some((submission, _)) = self.pending.front() {
            if *submission > completed {
                break;
            }
            self.resolved = self.pending.pop_front().map(|(_, times)| times);
        }
    }

    /// Timings of the newest list the queue has completed.
    pub(super) fn latest(&self, completed: u64) -> Option<PerPass<Duration>> {
        self.pending
            .iter()
            .rev()
            .find(|(submission, _)| *submission <= completed)
            .map(|(_, times)| times.clone())
            .or_else(|| self.resolved.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_splits_by_recorded_work() {
        let mut list = CommandList::new();
        list.begin_pass(PassId::GBuffer);
        list.set_stencil_ref(1);
        list.set_stencil_ref(1);
        list.end_pass(PassId::GBuffer);
        list.begin_pass(PassId::TileCluster);
        list.dispatch(4, 4, 1);
        list.dispatch(4, 4, 1);
        list.dispatch(4, 4, 1);
        list.dispatch(4, 4, 1);
        list.dispatch(4, 4, 1);
        list.end_pass(PassId::TileCluster);

        let times = simulate_pass_times(&list, Duration::from_millis(9)).unwrap();
        assert_eq!(times[PassId::GBuffer], Duration::from_millis(3));
        assert_eq!(times[PassId::TileCluster], Duration::from_millis(6));
        assert_eq!(times[PassId::Ui], Duration::ZERO);
    }

    #[test]
    fn test_list_without_passes_has_no_timings() {
        let mut list = CommandList::new();
        list.dispatch(1, 1, 1);
        assert!(simulate_pass_times(&list, Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_only_completed_submissions_are_reported() {
        let mut timeline = PassTimeline::default();
        let first = PerPass::from_fn(|_| Duration::from_millis(1));
        let second = PerPass::from_fn(|_| Duration::from_millis(2));
        timeline.push(1, first.clone());
        timeline.push(2, second.clone());

        assert_eq!(timeline.latest(0), None);
        assert_eq!(timeline.latest(1), Some(first.clone()));
        timeline.resolve(1);
        assert_eq!(timeline.latest(1), Some(first));
        assert_eq!(timeline.latest(2), Some(second.clone()));
        timeline.resolve(5);
        assert_eq!(timeline.latest(5), Some(second));
    }
}
