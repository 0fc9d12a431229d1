//! Process-wide shared worker pool.

use super::{WorkerPool, WorkerPoolConfig};
use crate::errors::{BranchflowError, PoolError};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

static GLOBAL_POOL: RwLock<Option<Arc<WorkerPool>>> = RwLock::new(None);

// Configuration captured before the pool is first used.
static GLOBAL_POOL_CONFIG: RwLock<Option<WorkerPoolConfig>> = RwLock::new(None);

/// Supplies the configuration used when the global pool is first created.
///
/// # Errors
///
/// Returns `PoolError::AlreadyInitialized` if the pool already exists, or a
/// configuration error if `config` is invalid.
pub fn configure_global_pool(config: WorkerPoolConfig) -> Result<(), BranchflowError> {
    config.validate()?;

    let pool = GLOBAL_POOL.read();
    if pool.is_some() {
        return Err(PoolError::AlreadyInitialized.into());
    }
    *GLOBAL_POOL_CONFIG.write() = Some(config);
    Ok(())
}

/// Returns the process-wide pool, creating it on first use.
///
/// Exactly one pool is ever created, even under concurrent first use.
pub fn global_worker_pool() -> Arc<WorkerPool> {
    if let Some(pool) = GLOBAL_POOL.read().as_ref() {
        return pool.clone();
    }

    let mut slot = GLOBAL_POOL.write();
    if let Some(pool) = slot.as_ref() {
        return pool.clone();
    }

    let config = GLOBAL_POOL_CONFIG.read().clone().unwrap_or_default();
    info!(
        core_threads = config.core_threads,
        max_threads = config.max_threads,
        queue_capacity = config.queue_capacity,
        keep_alive_ms = config.keep_alive_ms,
        "Creating global worker pool"
    );

    let pool = Arc::new(WorkerPool::new(config).unwrap_or_else(|_| WorkerPool::with_defaults()));
    *slot = Some(pool.clone());
    pool
}

/// Shuts down the global pool if it was ever created.
///
/// Returns the number of queued tasks discarded. The pool stays installed in
/// its shut-down state, so later submissions fail with `PoolError::Shutdown`.
pub async fn shutdown_global_pool() -> usize {
    let pool = GLOBAL_POOL.read().clone();
    match pool {
        Some(pool) => pool.shutdown_now().await,
        None => 0,
    }
}
