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

//! A fixed-size worker pool with barrier semantics.
//!
//! The pool offers two ways in:
//!
//! - [`ThreadPool::enqueue`] + [`ThreadPool::flush`]: fire tasks, then block
//!   until every task enqueued since the last flush has finished.
//! - [`ThreadPool::map_range`]: fork-join over `0..count`. The range is split
//!   into contiguous chunks, each chunk evaluates a pure `Fn(usize) -> T`, and
//!   the results land in a pre-sized output vector in index order.
//!
//! ```text
//!   submission thread            workers
//!   ─────────────────            ───────
//!   map_range(0..N) ──chunks──▶  [0..c) [c..2c) ... [kc..N)
//!         │                         │      │          │
//!         ◀──────(start, Vec<T>)────┴──────┴──────────┘
//!   sort by start, concatenate → Vec<T> of length N
//! ```

use crossbeam_channel::{Receiver, Sender};
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors reported by the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadPoolError {
    /// At least one task of the named stage panicked.
    #[error("a worker task panicked during {0}")]
    WorkerPanicked(&'static str),
}

/// Returns the chunk length used to split `count` items across `threads` workers:
/// `max(min_chunk, ceil(count / threads))`.
///
/// # Examples
///
/// ```
/// use deferra_core::thread_pool::chunk_size;
/// assert_eq!(chunk_size(10_000, 8, 100), 1250);
/// assert_eq!(chunk_size(50, 8, 100), 100);
/// ```
pub fn chunk_size(count: usize, threads: usize, min_chunk: usize) -> usize {
    let threads = threads.max(1);
    count.div_ceil(threads).max(min_chunk).max(1)
}

/// Splits `0..count` into contiguous ranges of `chunk` items. The last range
/// may be shorter. Yields nothing when `count` is zero.
pub fn chunk_ranges(count: usize, chunk: usize) -> impl Iterator<Item = Range<usize>> {
    let chunk = chunk.max(1);
    (0..count)
        .step_by(chunk)
        .map(move |start| start..(start + chunk).min(count))
}

struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
    panicked: AtomicBool,
}

impl Pending {
    fn add(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn complete_one(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// A fixed set of worker threads pulling tasks from a shared queue.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl ThreadPool {
    /// Spawns `thread_count` workers (at least one).
    pub fn new(thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let pending = Arc::new(Pending {
            count: Mutex::new(0),
            idle: Condvar::new(),
            panicked: AtomicBool::new(false),
        });

        let workers = (0..thread_count)
            .filter_map(|i| {
                let receiver = receiver.clone();
                let pending = Arc::clone(&pending);
                thread::Builder::new()
                    .name(format!("deferra-worker-{i}"))
                    .spawn(move || worker_loop(receiver, pending))
                    .map_err(|e| log::error!("Failed to spawn worker {i}: {e}"))
                    .ok()
            })
            .collect::<Vec<_>>();

        log::info!("Thread pool started with {} workers", workers.len());
        Self {
            sender: Some(sender),
            workers,
            pending,
        }
    }

    /// Spawns one worker per available hardware thread.
    pub fn with_available_parallelism() -> Self {
        let threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(threads)
    }

    /// The number of worker threads, used by callers to size their chunks.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.workers.len().max(1)
    }

    /// Appends a task to the shared queue.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.workers.is_empty() {
            // No worker could be spawned; keep the barrier contract by running inline.
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                self.pending.panicked.store(true, Ordering::Release);
            }
            return;
        }
        self.pending.add();
        let sent = self
            .sender
            .as_ref()
            .map(|sender| sender.send(Box::new(task)).is_ok())
            .unwrap_or(false);
        if !sent {
            log::error!("Thread pool queue is closed, task dropped");
            self.pending.complete_one();
        }
    }

    /// Blocks until every task enqueued so far has completed.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadPoolError::WorkerPanicked`] if any of those tasks panicked.
    pub fn flush(&self) -> Result<(), ThreadPoolError> {
        self.pending.wait_idle();
        if self.pending.panicked.swap(false, Ordering::AcqRel) {
            return Err(ThreadPoolError::WorkerPanicked("flush"));
        }
        Ok(())
    }

    /// Evaluates `f(i)` for every `i` in `0..count` across the workers and
    /// returns the results in index order.
    ///
    /// The range is cut into chunks of [`chunk_size`]`(count, thread_count, min_chunk)`.
    /// Each chunk is owned by exactly one task, so no two tasks ever evaluate
    /// the same index. Returns once every chunk has reported back.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadPoolError::WorkerPanicked`] tagged with `stage` if any chunk panicked.
    pub fn map_range<T, F>(
        &self,
        count: usize,
        min_chunk: usize,
        stage: &'static str,
        f: F,
    ) -> Result<Vec<T>, ThreadPoolError>
    where
        T: Send + 'static,
        F: Fn(usize) -> T + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let chunk = chunk_size(count, self.thread_count(), min_chunk);
        let (tx, rx) = crossbeam_channel::unbounded::<(usize, Vec<T>)>();

        let mut expected = 0usize;
        for range in chunk_ranges(count, chunk) {
            let f = Arc::clone(&f);
            let tx = tx.clone();
            expected += 1;
            self.enqueue(move || {
                let start = range.start;
                let results: Vec<T> = range.map(|i| f(i)).collect();
                drop(f);
                let _ = tx.send((start, results));
            });
        }
        drop(tx);

        let mut chunks = Vec::with_capacity(expected);
        for _ in 0..expected {
            match rx.recv() {
                Ok(chunk) => chunks.push(chunk),
                Err(_) => {
                    let _ = self.flush();
                    return Err(ThreadPoolError::WorkerPanicked(stage));
                }
            }
        }

        chunks.sort_unstable_by_key(|(start, _)| *start);
        let mut output = Vec::with_capacity(count);
        for (_, results) in chunks {
            output.extend(results);
        }
        Ok(output)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the queue lets every worker fall out of its receive loop.
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("A worker thread terminated abnormally");
            }
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("thread_count", &self.thread_count())
            .finish()
    }
}

fn worker_loop(receiver: Receiver<Job>, pending: Arc<Pending>) {
    while let Ok(job) = receiver.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!("Worker task panicked");
            pending.panicked.store(true, Ordering::Release);
        }
        pending.complete_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn covered_once(count: usize, threads: usize) -> bool {
        let chunk = chunk_size(count, threads, 100);
        let mut hits = vec![0u8; count];
        let mut previous_end = 0;
        for range in chunk_ranges(count, chunk) {
            if range.start != previous_end || range.is_empty() {
                return false;
            }
            previous_end = range.end;
            for i in range {
                hits[i] += 1;
            }
        }
        previous_end == count && hits.iter().all(|&h| h == 1)
    }

    #[test]
    fn test_chunks_cover_every_index_exactly_once() {
        for count in [0, 1, 99, 100, 101, 10_000] {
            for threads in [1, 3, 8, 64] {
                assert!(covered_once(count, threads), "count={count} threads={threads}");
            }
        }
    }

    #[test]
    fn test_chunk_size_has_a_floor() {
        assert_eq!(chunk_size(0, 8, 100), 100);
        assert_eq!(chunk_size(101, 8, 100), 100);
        assert_eq!(chunk_size(10_000, 3, 100), 3334);
        assert_eq!(chunk_size(10, 0, 0), 10);
    }

    #[test]
    fn test_flush_waits_for_all_tasks() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            pool.enqueue(move || {
                thread::sleep(std::time::Duration::from_micros(200));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.flush().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn test_map_range_preserves_index_order() {
        let pool = ThreadPool::new(3);
        let out = pool.map_range(1_000, 10, "test", |i| i * 2).unwrap();
        assert_eq!(out.len(), 1_000);
        assert!(out.iter().enumerate().all(|(i, &v)| v == i * 2));
        assert!(pool.map_range(0, 10, "test", |i| i).unwrap().is_empty());
    }

    #[test]
    fn test_panicking_task_is_reported() {
        let pool = ThreadPool::new(2);
        let result = pool.map_range(300, 100, "culling", |i| {
            if i == 150 {
                panic!("boom");
            }
            i
        });
        assert_eq!(result, Err(ThreadPoolError::WorkerPanicked("culling")));
        // The pool stays usable afterwards.
        assert_eq!(pool.map_range(5, 1, "test", |i| i).unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(pool.flush().is_ok());
    }
}
