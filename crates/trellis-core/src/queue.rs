//! Coalescing update queue for batched recomputation.
//!
//! Bursts of structural changes (data pages arriving, column tree changes,
//! scroll-driven visibility changes) are coalesced through this queue rather
//! than processed immediately: scheduling a task under a [`TaskKey`] that is
//! already pending replaces the pending task instead of adding a second one,
//! so a rapid sequence of triggering events collapses to one recomputation
//! per key ("last write wins, batched").
//!
//! The queue does not own a timer or an event loop; the host drives it by
//! calling [`UpdateQueue::flush`] at the end of each event-loop turn. Tasks
//! scheduled while a flush is running are processed in the same flush, so a
//! flush always leaves the queue empty.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Identifies a class of recomputation for coalescing purposes.
///
/// Two schedules with the same key are the same piece of work; only the most
/// recently scheduled closure runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    /// The subsystem scope, e.g. `"page-loaded"`.
    pub scope: &'static str,
    /// Scope-specific discriminator (cache id, column id, ...).
    pub id: u64,
}

impl TaskKey {
    /// Create a task key.
    pub const fn new(scope: &'static str, id: u64) -> Self {
        Self { scope, id }
    }
}

type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct QueueState {
    /// Pending tasks by key; the value's `u64` is the scheduling sequence
    /// used to preserve first-scheduled order across replacements.
    pending: HashMap<TaskKey, (u64, BoxedTask)>,
    next_seq: u64,
}

/// A single-flight, key-coalescing task queue.
///
/// Thread-safe, but no lock is held while a task executes, so tasks may
/// schedule further work on the same queue.
#[derive(Default)]
pub struct UpdateQueue {
    state: Mutex<QueueState>,
}

impl UpdateQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` under `key`.
    ///
    /// If a task for `key` is already pending, it is replaced (its original
    /// position in the flush order is kept). Returns `true` if the key was
    /// newly scheduled, `false` if an existing entry was replaced.
    pub fn schedule<F>(&self, key: TaskKey, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        match state.pending.remove(&key) {
            Some((seq, _)) => {
                state.pending.insert(key, (seq, Box::new(task)));
                false
            }
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                state.pending.insert(key, (seq, Box::new(task)));
                true
            }
        }
    }

    /// Cancel the pending task for `key`, if any.
    ///
    /// Returns `true` if a task was removed.
    pub fn cancel(&self, key: TaskKey) -> bool {
        self.state.lock().pending.remove(&key).is_some()
    }

    /// Whether a task is pending for `key`.
    pub fn is_scheduled(&self, key: TaskKey) -> bool {
        self.state.lock().pending.contains_key(&key)
    }

    /// Number of pending tasks.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Run all pending tasks in first-scheduled order.
    ///
    /// Tasks scheduled during the flush are drained in the same call, so the
    /// queue is empty when this returns. Returns the number of tasks run.
    #[tracing::instrument(skip(self), target = "trellis_core::queue", level = "trace")]
    pub fn flush(&self) -> usize {
        let mut executed = 0;
        loop {
            let batch: Vec<(u64, BoxedTask)> = {
                let mut state = self.state.lock();
                if state.pending.is_empty() {
                    break;
                }
                state.pending.drain().map(|(_, entry)| entry).collect()
            };

            let mut batch = batch;
            batch.sort_by_key(|(seq, _)| *seq);

            for (_, task) in batch {
                task();
                executed += 1;
            }
        }
        tracing::trace!(target: "trellis_core::queue", executed, "flushed update queue");
        executed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_schedule_and_flush() {
        let queue = UpdateQueue::new();
        let executed = Arc::new(AtomicUsize::new(0));

        let executed_clone = executed.clone();
        queue.schedule(TaskKey::new("recompute", 1), move || {
            executed_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(queue.pending_count(), 1);
        assert_eq!(queue.flush(), 1);
        assert_eq!(executed.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_coalescing_last_write_wins() {
        let queue = UpdateQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let key = TaskKey::new("recompute", 7);
        for value in [1, 2, 3] {
            let seen_clone = seen.clone();
            queue.schedule(key, move || {
                seen_clone.lock().push(value);
            });
        }

        assert_eq!(queue.pending_count(), 1);
        assert_eq!(queue.flush(), 1);
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn test_distinct_keys_run_in_schedule_order() {
        let queue = UpdateQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in [3u64, 1, 2] {
            let order_clone = order.clone();
            queue.schedule(TaskKey::new("k", id), move || {
                order_clone.lock().push(id);
            });
        }

        // Replacing key 3 must not move it behind keys scheduled after it.
        let order_clone = order.clone();
        queue.schedule(TaskKey::new("k", 3), move || {
            order_clone.lock().push(30);
        });

        assert_eq!(queue.flush(), 3);
        assert_eq!(*order.lock(), vec![30, 1, 2]);
    }

    #[test]
    fn test_cancel() {
        let queue = UpdateQueue::new();
        let executed = Arc::new(AtomicUsize::new(0));

        let key = TaskKey::new("recompute", 1);
        let executed_clone = executed.clone();
        queue.schedule(key, move || {
            executed_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(queue.cancel(key));
        assert!(!queue.is_scheduled(key));
        assert_eq!(queue.flush(), 0);
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_schedule_during_flush_runs_in_same_flush() {
        let queue = Arc::new(UpdateQueue::new());
        let executed = Arc::new(AtomicUsize::new(0));

        let queue_clone = queue.clone();
        let executed_clone = executed.clone();
        queue.schedule(TaskKey::new("outer", 0), move || {
            executed_clone.fetch_add(1, Ordering::SeqCst);
            let inner_executed = executed_clone.clone();
            queue_clone.schedule(TaskKey::new("inner", 0), move || {
                inner_executed.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(queue.flush(), 2);
        assert_eq!(executed.load(Ordering::SeqCst), 2);
        assert_eq!(queue.pending_count(), 0);
    }
}
