//! Bounded task execution.
//!
//! [`WorkerPool`] runs branch tasks on a bounded set of workers fed by a
//! bounded queue. Submitting to a full queue waits for capacity, which
//! throttles callers instead of rejecting work.

mod config;
mod global;
mod handle;
mod metrics;
mod worker;

pub use config::{
    EngineConfig, WorkerPoolConfig, CLEANUP_GRACE_KEY, CORE_THREADS_KEY, KEEP_ALIVE_KEY,
    MAX_THREADS_KEY, QUEUE_CAPACITY_KEY,
};
pub use global::{configure_global_pool, global_worker_pool, shutdown_global_pool};
pub use handle::TaskHandle;
pub use metrics::{PoolMetrics, PoolStats};
pub use worker::WorkerPool;

pub(crate) use worker::panic_message;
