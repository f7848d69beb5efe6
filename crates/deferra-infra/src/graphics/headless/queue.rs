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

//! The simulated GPU queue: a thread draining submissions and signals in order.

use crossbeam_channel::{Receiver, Sender};
use deferra_core::RenderError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Work sent to the queue thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueMessage {
    /// A command list; completes after the configured latency.
    Execute(u64),
    /// Sets the fence once everything before it has completed.
    Signal(u64),
    /// Stops the thread.
    Shutdown,
}

/// Progress shared between the queue thread and the CPU side.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    completed_fence: Mutex<u64>,
    fence_reached: Condvar,
    completed_submissions: AtomicU64,
    stopped: AtomicBool,
}

impl QueueState {
    pub(crate) fn completed_fence(&self) -> u64 {
        *self.completed_fence.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn completed_submissions(&self) -> u64 {
        self.completed_submissions.load(Ordering::Acquire)
    }

    /// Blocks until the fence reaches `value` or the queue stops.
    pub(crate) fn wait_for_fence(&self, value: u64) -> Result<(), RenderError> {
        let mut completed = self.completed_fence.lock().unwrap_or_else(PoisonError::into_inner);
        while *completed < value {
            if self.stopped.load(Ordering::Acquire) {
                return Err(RenderError::DeviceSubmissionFailure(format!(
                    "headless queue stopped before reaching fence value {value}"
                )));
            }
            completed = self
                .fence_reached
                .wait(completed)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }

    fn complete_fence(&self, value: u64) {
        let mut completed = self.completed_fence.lock().unwrap_or_else(PoisonError::into_inner);
        *completed = (*completed).max(value);
        self.fence_reached.notify_all();
    }

    fn stop(&self) {
        // Taken so a waiter cannot miss the wakeup between its check and its wait.
        let _guard = self.completed_fence.lock().unwrap_or_else(PoisonError::into_inner);
        self.stopped.store(true, Ordering::Release);
        self.fence_reached.notify_all();
    }
}

/// Owns the queue thread.
#[derive(Debug)]
pub(crate) struct Queue {
    sender: Sender<QueueMessage>,
    worker: Option<JoinHandle<()>>,
    state: Arc<QueueState>,
}

impl Queue {
    /// Starts the queue thread.
    pub(crate) fn spawn(latency: Duration) -> Result<Self, RenderError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let state = Arc::new(QueueState::default());
        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("deferra-headless-queue".to_string())
            .spawn(move || queue_loop(receiver, worker_state, latency))
            .map_err(|e| RenderError::DeviceSubmissionFailure(format!("failed to start the queue thread: {e}")))?;
        Ok(Self {
            sender,
            worker: Some(worker),
            state,
        })
    }

    pub(crate) fn sender(&self) -> Sender<QueueMessage> {
        self.sender.clone()
    }

    pub(crate) fn state(&self) -> &Arc<QueueState> {
        &self.state
    }

    pub(crate) fn submit(&self, submission: u64) -> Result<(), RenderError> {
        send(&self.sender, QueueMessage::Execute(submission))
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        let _ = self.sender.send(QueueMessage::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Headless queue thread panicked");
            }
        }
    }
}

pub(crate) fn send(sender: &Sender<QueueMessage>, message: QueueMessage) -> Result<(), RenderError> {
    sender
        .send(message)
        .map_err(|_| RenderError::DeviceSubmissionFailure("headless queue thread is gone".to_string()))
}

fn queue_loop(receiver: Receiver<QueueMessage>, state: Arc<QueueState>, latency: Duration) {
    for message in receiver.iter() {
        match message {
            QueueMessage::Execute(submission) => {
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                state.completed_submissions.store(submission, Ordering::Release);
            }
            QueueMessage::Signal(value) => {
                state.complete_fence(value);
                log::trace!("Headless queue reached fence value {value}");
            }
            QueueMessage::Shutdown => break,
        }
    }
    state.stop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_complete_after_preceding_work() {
        let queue = Queue::spawn(Duration::from_millis(5)).unwrap();
        queue.submit(1).unwrap();
        send(&queue.sender(), QueueMessage::Signal(1)).unwrap();
        queue.state().wait_for_fence(1).unwrap();
        assert_eq!(queue.state().completed_submissions(), 1);
        assert_eq!(queue.state().completed_fence(), 1);
    }

    #[test]
    fn test_wait_fails_once_stopped() {
        let queue = Queue::spawn(Duration::ZERO).unwrap();
        let state = Arc::clone(queue.state());
        drop(queue);
        assert!(matches!(
            state.wait_for_fence(3),
            Err(RenderError::DeviceSubmissionFailure(_))
        ));
    }
}
