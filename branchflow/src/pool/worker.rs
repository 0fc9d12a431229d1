//! Bounded worker pool with a blocking work queue.

use super::{PoolMetrics, PoolStats, TaskHandle, WorkerPoolConfig};
use crate::cancellation::CancellationToken;
use crate::errors::{ConfigError, PoolError, TaskFault};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex as SyncMutex;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

/// A queued unit of work. The job resolves to true if the task panicked.
struct QueuedTask {
    id: u64,
    token: Arc<CancellationToken>,
    job: BoxFuture<'static, bool>,
}

/// Runs a task and reports its result through a oneshot channel.
///
/// Fields drop in declaration order, so a cancelled task's state is released
/// before its handle observes the closed channel.
struct TaskJob<T> {
    task: BoxFuture<'static, std::thread::Result<T>>,
    tx: Option<oneshot::Sender<Result<T, TaskFault>>>,
}

impl<T> Future for TaskJob<T> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        let result = ready!(this.task.as_mut().poll(cx))
            .map_err(|panic| TaskFault::Panicked(panic_message(panic.as_ref())));
        let faulted = result.is_err();

        if let Some(tx) = this.tx.take() {
            // The handle may already be gone; the result is simply discarded.
            let _ = tx.send(result);
        }
        Poll::Ready(faulted)
    }
}

/// State shared between the pool front-end and its workers.
struct PoolShared {
    config: WorkerPoolConfig,
    queue: Mutex<mpsc::Receiver<QueuedTask>>,
    shutdown: CancellationToken,
    metrics: PoolMetrics,
}

/// Releases a worker's live slot however the worker future ends.
struct WorkerSlot<'a>(&'a PoolMetrics);

impl Drop for WorkerSlot<'_> {
    fn drop(&mut self) {
        self.0.worker_stopped();
    }
}

/// A bounded pool of worker tasks fed by a bounded queue.
///
/// Workers are started lazily: each submission starts a new core worker
/// until `core_threads` exist. When a submission finds the queue full, an
/// extra worker is started (up to `max_threads`) and the submitter waits for
/// queue capacity instead of failing. Extra workers exit after
/// `keep_alive` without work.
///
/// Workers run on a runtime owned by the pool, built on first submission,
/// so the pool outlives whichever runtime its callers use. Dropping the pool
/// shuts that runtime down without waiting.
pub struct WorkerPool {
    sender: mpsc::Sender<QueuedTask>,
    shared: Arc<PoolShared>,
    runtime: SyncMutex<Option<Runtime>>,
    next_id: AtomicU64,
}

impl WorkerPool {
    /// Creates a pool. No workers run until the first submission.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the configuration is inconsistent.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Creates a pool with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::build(WorkerPoolConfig::default())
    }

    fn build(config: WorkerPoolConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);

        Self {
            sender,
            shared: Arc::new(PoolShared {
                config,
                queue: Mutex::new(receiver),
                shutdown: CancellationToken::new(),
                metrics: PoolMetrics::default(),
            }),
            runtime: SyncMutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the pool configuration.
    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.shared.config
    }

    /// Returns the live metrics.
    #[must_use]
    pub fn metrics(&self) -> &PoolMetrics {
        &self.shared.metrics
    }

    /// Returns the number of tasks waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared
            .config
            .queue_capacity
            .saturating_sub(self.sender.capacity())
    }

    /// Returns whether the pool has been shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Returns a point-in-time view of pool state.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let metrics = &self.shared.metrics;
        PoolStats {
            submitted: metrics.submitted(),
            completed: metrics.completed(),
            cancelled: metrics.cancelled(),
            faulted: metrics.faulted(),
            blocked_submissions: metrics.blocked_submissions(),
            live_workers: metrics.live_workers(),
            busy_workers: metrics.busy_workers(),
            queued: self.queued(),
            shut_down: self.is_shutdown(),
        }
    }

    /// Submits a task, waiting for queue capacity if the queue is full.
    ///
    /// A panic inside `task` is caught and reported through the handle as
    /// `WaitError::Faulted`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Shutdown` if the pool is (or becomes, while
    /// waiting for capacity) shut down, or `PoolError::Runtime` if the
    /// worker runtime cannot be started.
    pub async fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_shutdown() {
            return Err(PoolError::Shutdown);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = Arc::new(CancellationToken::new());
        let (tx, rx) = oneshot::channel();

        let job = TaskJob {
            task: AssertUnwindSafe(task).catch_unwind().boxed(),
            tx: Some(tx),
        }
        .boxed();

        self.spawn_worker(self.shared.config.core_threads)?;

        let queued = QueuedTask {
            id,
            token: token.clone(),
            job,
        };
        match self.sender.try_send(queued) {
            Ok(()) => {}
            Err(TrySendError::Closed(_)) => return Err(PoolError::Shutdown),
            Err(TrySendError::Full(queued)) => {
                self.shared.metrics.record_blocked();
                self.spawn_worker(self.shared.config.max_threads)?;
                debug!(
                    task_id = id,
                    queue_capacity = self.shared.config.queue_capacity,
                    "Worker pool queue full; waiting for capacity"
                );
                self.sender
                    .send(queued)
                    .await
                    .map_err(|_| PoolError::Shutdown)?;
            }
        }

        self.shared.metrics.record_submit();
        Ok(TaskHandle::new(id, rx, token))
    }

    /// Starts a worker if fewer than `limit` are alive.
    fn spawn_worker(&self, limit: usize) -> Result<bool, PoolError> {
        let Some(live) = self.shared.metrics.try_reserve_worker(limit) else {
            return Ok(false);
        };

        let runtime = match self.runtime_handle() {
            Ok(runtime) => runtime,
            Err(err) => {
                self.shared.metrics.worker_stopped();
                return Err(err);
            }
        };

        let idle_limit = self.shared.idle_limit(live);
        let shared = self.shared.clone();
        runtime.spawn(async move {
            shared.work(idle_limit).await;
        });
        Ok(true)
    }

    fn runtime_handle(&self) -> Result<Handle, PoolError> {
        let mut runtime = self.runtime.lock();
        if let Some(runtime) = runtime.as_ref() {
            return Ok(runtime.handle().clone());
        }

        let threads = std::thread::available_parallelism()
            .map_or(1, std::num::NonZeroUsize::get)
            .min(self.shared.config.max_threads);
        let built = Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("branchflow-worker")
            .enable_all()
            .build()
            .map_err(|err| PoolError::Runtime(err.to_string()))?;
        debug!(threads, "Worker pool runtime started");

        let handle = built.handle().clone();
        *runtime = Some(built);
        Ok(handle)
    }

    /// Cancels all queued and running tasks and refuses further submissions.
    ///
    /// Returns the number of queued tasks that were discarded. Calling this
    /// more than once is a no-op.
    pub async fn shutdown_now(&self) -> usize {
        if !self.shared.shutdown.cancel("worker pool shut down") {
            return 0;
        }

        let mut queue = self.shared.queue.lock().await;
        queue.close();

        let mut drained = 0;
        while let Ok(task) = queue.try_recv() {
            drop(task);
            self.shared.metrics.record_cancel();
            drained += 1;
        }

        info!(
            drained,
            busy_workers = self.shared.metrics.busy_workers(),
            "Worker pool shut down"
        );
        drained
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl PoolShared {
    /// Idle limit for a worker that took live slot `live` (counting from 1).
    /// Slots beyond `core_threads` are overflow workers.
    fn idle_limit(&self, live: usize) -> Option<Duration> {
        (live > self.config.core_threads).then(|| self.config.keep_alive())
    }

    /// Worker loop. Workers with an idle limit exit after that long without work.
    async fn work(&self, idle_limit: Option<Duration>) {
        let _slot = WorkerSlot(&self.metrics);
        debug!(overflow = idle_limit.is_some(), "Pool worker started");

        while let Some(task) = self.next_task(idle_limit).await {
            self.run(task).await;
        }

        debug!(overflow = idle_limit.is_some(), "Pool worker stopped");
    }

    async fn next_task(&self, idle_limit: Option<Duration>) -> Option<QueuedTask> {
        let receive = async {
            let mut queue = self.queue.lock().await;
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => None,
                task = queue.recv() => task,
            }
        };

        match idle_limit {
            Some(limit) => tokio::time::timeout(limit, receive).await.unwrap_or(None),
            None => receive.await,
        }
    }

    async fn run(&self, task: QueuedTask) {
        let QueuedTask { id, token, job } = task;

        if token.is_cancelled() || self.shutdown.is_cancelled() {
            self.metrics.record_cancel();
            debug!(task_id = id, "Discarding task cancelled before start");
            return;
        }

        self.metrics.task_started();
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => None,
            () = self.shutdown.cancelled() => None,
            faulted = job => Some(faulted),
        };
        self.metrics.task_finished();

        match outcome {
            Some(faulted) => {
                self.metrics.record_complete();
                if faulted {
                    self.metrics.record_fault();
                }
            }
            None => {
                self.metrics.record_cancel();
                debug!(task_id = id, "Task cancelled while running");
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.shared.config)
            .field("live_workers", &self.shared.metrics.live_workers())
            .field("queued", &self.queued())
            .field("shut_down", &self.is_shutdown())
            .finish()
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WaitError;
    use crate::testing::Latch;
    use std::time::Instant;

    fn small_pool(core: usize, max: usize, capacity: usize) -> WorkerPool {
        WorkerPool::new(
            WorkerPoolConfig::new()
                .with_core_threads(core)
                .with_max_threads(max)
                .with_queue_capacity(capacity)
                .with_keep_alive(Duration::from_secs(1)),
        )
        .unwrap()
    }

    async fn eventually(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_pool_rejects_invalid_config() {
        assert!(WorkerPool::new(WorkerPoolConfig::new().with_queue_capacity(0)).is_err());
    }

    #[tokio::test]
    async fn test_submit_runs_task() {
        let pool = small_pool(2, 2, 4);
        let mut handle = pool.submit(async { 40 + 2 }).await.unwrap();

        assert_eq!(handle.wait().await, Ok(42));
        assert_eq!(pool.metrics().submitted(), 1);
    }

    #[tokio::test]
    async fn test_workers_start_lazily() {
        let pool = small_pool(2, 4, 4);
        assert_eq!(pool.metrics().live_workers(), 0);

        let mut handle = pool.submit(async {}).await.unwrap();
        handle.wait().await.unwrap();
        assert_eq!(pool.metrics().live_workers(), 1);
    }

    #[tokio::test]
    async fn test_panic_is_reported_as_fault() {
        let pool = small_pool(1, 1, 4);
        let mut handle = pool
            .submit(async {
                panic!("branch exploded");
            })
            .await
            .unwrap();

        assert_eq!(
            handle.wait().await,
            Err(WaitError::Faulted("branch exploded".to_string()))
        );

        // The worker survives the panic.
        let mut next = pool.submit(async { "still alive" }).await.unwrap();
        assert_eq!(next.wait().await, Ok("still alive"));
        assert_eq!(pool.metrics().faulted(), 1);
    }

    #[tokio::test]
    async fn test_cancel_running_task() {
        let pool = small_pool(1, 1, 4);
        let started = Latch::new();
        let never = Latch::new();

        let mut handle = {
            let started = started.clone();
            let never = never.clone();
            pool.submit(async move {
                started.open();
                never.wait().await;
            })
            .await
            .unwrap()
        };

        started.wait().await;
        handle.cancel("test");

        assert_eq!(
            handle.wait_timeout(Duration::from_secs(1)).await,
            Err(WaitError::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_cancel_queued_task_never_runs() {
        let pool = small_pool(1, 1, 4);
        let gate = Latch::new();
        let ran = Latch::new();

        let mut blocker = {
            let gate = gate.clone();
            pool.submit(async move { gate.wait().await }).await.unwrap()
        };
        let mut queued = {
            let ran = ran.clone();
            pool.submit(async move { ran.open() }).await.unwrap()
        };

        queued.cancel("no longer needed");
        gate.open();
        blocker.wait().await.unwrap();

        assert_eq!(queued.wait().await, Err(WaitError::Cancelled));
        assert!(!ran.is_open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_queue_blocks_submitter() {
        let pool = Arc::new(small_pool(1, 1, 1));
        let gate = Latch::new();

        // Occupies the only worker.
        let started = Latch::new();
        let mut running = {
            let gate = gate.clone();
            let started = started.clone();
            pool.submit(async move {
                started.open();
                gate.wait().await;
            })
            .await
            .unwrap()
        };
        started.wait().await;

        // Fills the only queue slot.
        let mut queued = pool.submit(async {}).await.unwrap();

        // This one must wait for capacity rather than fail.
        let blocked = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let submitted_at = Instant::now();
                let mut handle = pool.submit(async {}).await?;
                let waited = submitted_at.elapsed();
                handle.wait().await.map_err(|_| PoolError::Shutdown)?;
                Ok::<_, PoolError>(waited)
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!blocked.is_finished());
        assert_eq!(pool.metrics().blocked_submissions(), 1);

        gate.open();
        let waited = blocked.await.unwrap().unwrap();
        assert!(waited >= Duration::from_millis(100));

        running.wait().await.unwrap();
        queued.wait().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overflow_worker_started_when_queue_full() {
        let pool = Arc::new(small_pool(1, 2, 1));
        let gate = Latch::new();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let gate = gate.clone();
            handles.push(pool.submit(async move { gate.wait().await }).await.unwrap());
        }
        // Third submission finds the queue full and adds an overflow worker.
        {
            let gate = gate.clone();
            handles.push(pool.submit(async move { gate.wait().await }).await.unwrap());
        }

        assert_eq!(pool.metrics().live_workers(), 2);
        gate.open();
        for handle in &mut handles {
            handle.wait().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_shutdown_now_cancels_everything() {
        let pool = small_pool(1, 1, 4);
        let started = Latch::new();
        let never = Latch::new();

        let mut running = {
            let started = started.clone();
            let never = never.clone();
            pool.submit(async move {
                started.open();
                never.wait().await;
            })
            .await
            .unwrap()
        };
        let mut queued = pool.submit(async {}).await.unwrap();
        started.wait().await;

        let drained = pool.shutdown_now().await;
        assert_eq!(drained, 1);
        assert!(pool.is_shutdown());

        assert_eq!(
            running.wait_timeout(Duration::from_secs(1)).await,
            Err(WaitError::Abandoned)
        );
        assert_eq!(queued.wait().await, Err(WaitError::Abandoned));

        assert_eq!(pool.submit(async {}).await.unwrap_err(), PoolError::Shutdown);
        assert_eq!(pool.shutdown_now().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overflow_worker_retires_after_keep_alive() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_core_threads(1)
                .with_max_threads(2)
                .with_queue_capacity(1)
                .with_keep_alive(Duration::from_millis(100)),
        )
        .unwrap();
        let gate = Latch::new();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = gate.clone();
            handles.push(pool.submit(async move { gate.wait().await }).await.unwrap());
        }
        assert_eq!(pool.metrics().live_workers(), 2);

        gate.open();
        for handle in &mut handles {
            handle.wait().await.unwrap();
        }

        eventually(|| pool.metrics().live_workers() == 1).await;
        assert_eq!(pool.metrics().live_workers(), 1);

        // The core worker still serves the queue.
        let mut later = pool.submit(async { "after retirement" }).await.unwrap();
        assert_eq!(
            later.wait_timeout(Duration::from_secs(1)).await,
            Ok("after retirement")
        );
        assert_eq!(pool.metrics().live_workers(), 1);
    }

    #[test]
    fn test_only_slots_beyond_core_are_overflow() {
        let pool = small_pool(2, 4, 1);

        assert_eq!(pool.shared.idle_limit(1), None);
        assert_eq!(pool.shared.idle_limit(2), None);
        assert_eq!(pool.shared.idle_limit(3), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_pool_outlives_the_runtime_that_first_used_it() {
        let pool = small_pool(1, 1, 4);

        let first = Runtime::new().unwrap();
        let value = first.block_on(async { pool.submit(async { 1 }).await.unwrap().wait().await });
        assert_eq!(value, Ok(1));
        drop(first);
        assert_eq!(pool.metrics().live_workers(), 1);

        let second = Runtime::new().unwrap();
        let value = second.block_on(async {
            let mut handle = pool.submit(async { 2 }).await.unwrap();
            handle.wait_timeout(Duration::from_secs(3)).await
        });
        assert_eq!(value, Ok(2));
        assert_eq!(pool.metrics().live_workers(), 1);
    }

    #[tokio::test]
    async fn test_workers_release_slots_on_shutdown() {
        let pool = small_pool(2, 2, 4);
        for _ in 0..2 {
            pool.submit(async {}).await.unwrap().wait().await.unwrap();
        }
        assert_eq!(pool.metrics().live_workers(), 2);

        pool.shutdown_now().await;

        eventually(|| pool.metrics().live_workers() == 0).await;
        assert_eq!(pool.metrics().live_workers(), 0);
    }

    #[tokio::test]
    async fn test_stats_serialize_after_run() {
        let pool = small_pool(1, 1, 4);
        let mut handle = pool.submit(async { 7 }).await.unwrap();
        assert_eq!(handle.wait().await, Ok(7));

        // Completion is counted just after the result is delivered.
        eventually(|| pool.metrics().completed() == 1).await;

        let stats = serde_json::to_value(pool.stats()).unwrap();
        assert_eq!(stats["submitted"], 1);
        assert_eq!(stats["completed"], 1);
        assert_eq!(stats["cancelled"], 0);
        assert_eq!(stats["faulted"], 0);
        assert_eq!(stats["live_workers"], 1);
        assert_eq!(stats["queued"], 0);
        assert_eq!(stats["shut_down"], false);

        pool.shutdown_now().await;
        let stats: PoolStats = serde_json::from_value(serde_json::to_value(pool.stats()).unwrap())
            .unwrap();
        assert!(stats.shut_down);
        assert_eq!(stats.submitted, 1);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
