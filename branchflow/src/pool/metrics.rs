//! Worker pool counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live counters for a worker pool.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Tasks accepted into the queue.
    submitted: AtomicU64,
    /// Tasks that ran to completion (including those that panicked).
    completed: AtomicU64,
    /// Tasks cancelled before or while running.
    cancelled: AtomicU64,
    /// Tasks that panicked.
    faulted: AtomicU64,
    /// Submissions that found the queue full and had to wait.
    blocked_submissions: AtomicU64,
    /// Workers currently alive.
    live_workers: AtomicUsize,
    /// Workers currently running a task.
    busy_workers: AtomicUsize,
}

impl PoolMetrics {
    /// Records an accepted submission.
    pub fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed task.
    pub fn record_complete(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cancelled task.
    pub fn record_cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a panicked task.
    pub fn record_fault(&self) {
        self.faulted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a submission that hit a full queue.
    pub fn record_blocked(&self) {
        self.blocked_submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_stopped(&self) {
        self.live_workers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Takes a live slot if fewer than `limit` are held, returning the new
    /// live count.
    pub(crate) fn try_reserve_worker(&self, limit: usize) -> Option<usize> {
        self.live_workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                (live < limit).then_some(live + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    pub(crate) fn task_started(&self) {
        self.busy_workers.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn task_finished(&self) {
        self.busy_workers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Returns the number of accepted submissions.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Returns the number of completed tasks.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Returns the number of cancelled tasks.
    #[must_use]
    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns the number of panicked tasks.
    #[must_use]
    pub fn faulted(&self) -> u64 {
        self.faulted.load(Ordering::Relaxed)
    }

    /// Returns the number of submissions that waited on a full queue.
    #[must_use]
    pub fn blocked_submissions(&self) -> u64 {
        self.blocked_submissions.load(Ordering::Relaxed)
    }

    /// Returns the number of live workers.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Returns the number of workers running a task.
    #[must_use]
    pub fn busy_workers(&self) -> usize {
        self.busy_workers.load(Ordering::SeqCst)
    }
}

/// A point-in-time view of pool state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Tasks accepted into the queue.
    pub submitted: u64,
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks cancelled before or while running.
    pub cancelled: u64,
    /// Tasks that panicked.
    pub faulted: u64,
    /// Submissions that waited on a full queue.
    pub blocked_submissions: u64,
    /// Workers currently alive.
    pub live_workers: usize,
    /// Workers currently running a task.
    pub busy_workers: usize,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Whether the pool has been shut down.
    pub shut_down: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_default() {
        let metrics = PoolMetrics::default();
        assert_eq!(metrics.submitted(), 0);
        assert_eq!(metrics.live_workers(), 0);
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PoolMetrics::default();

        metrics.record_submit();
        metrics.record_submit();
        metrics.record_complete();
        metrics.record_blocked();

        assert_eq!(metrics.submitted(), 2);
        assert_eq!(metrics.completed(), 1);
        assert_eq!(metrics.blocked_submissions(), 1);
    }

    #[test]
    fn test_reserve_worker_respects_limit() {
        let metrics = PoolMetrics::default();

        assert_eq!(metrics.try_reserve_worker(2), Some(1));
        assert_eq!(metrics.try_reserve_worker(2), Some(2));
        assert_eq!(metrics.try_reserve_worker(2), None);
        assert_eq!(metrics.live_workers(), 2);

        metrics.worker_stopped();
        assert_eq!(metrics.try_reserve_worker(2), Some(2));
    }
}
