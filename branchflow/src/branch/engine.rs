//! The `run_branches` entry point.

use super::{Branch, BranchScheduler, ResourceReaper, ResultCollector};
use crate::cancellation::CancellationToken;
use crate::context::{ContextForker, ProcessingContext};
use crate::core::AssertionStatus;
use crate::errors::BranchflowError;
use crate::pool::{global_worker_pool, shutdown_global_pool, EngineConfig, WorkerPool};
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs the branches of a concurrent composite step.
///
/// Every enabled branch gets its own forked context and runs on the shared
/// pool. Results are merged into the parent strictly in declaration order,
/// and cleanup always runs before returning.
#[derive(Debug, Clone)]
pub struct ConcurrentBranchEngine {
    pool: Arc<WorkerPool>,
    forker: ContextForker,
    config: EngineConfig,
}

impl ConcurrentBranchEngine {
    /// Creates an engine over `pool`.
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            forker: ContextForker::new(),
            config: EngineConfig::default(),
        }
    }

    /// Creates an engine over the process-wide pool.
    pub fn global() -> Self {
        Self::new(global_worker_pool())
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the pool branches run on.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `branches` against `parent` and returns the overall status.
    ///
    /// # Errors
    ///
    /// Returns an error if forking or merging a context fails, or if the
    /// pool has been shut down. Branch faults are reported as
    /// `AssertionStatus::ServerError`, not as errors.
    pub async fn run_branches(
        &self,
        parent: &mut ProcessingContext,
        branches: &[Branch],
    ) -> Result<AssertionStatus, BranchflowError> {
        self.run_branches_with_interrupt(parent, branches, &CancellationToken::new())
            .await
    }

    /// Like [`run_branches`](Self::run_branches), aborting collection with
    /// `ServerError` once `interrupt` fires.
    ///
    /// # Errors
    ///
    /// As for `run_branches`.
    pub async fn run_branches_with_interrupt(
        &self,
        parent: &mut ProcessingContext,
        branches: &[Branch],
        interrupt: &CancellationToken,
    ) -> Result<AssertionStatus, BranchflowError> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!(
            "branchflow.run_branches",
            %invocation_id,
            branches = branches.len()
        );

        self.run(parent, branches, interrupt).instrument(span).await
    }

    async fn run(
        &self,
        parent: &mut ProcessingContext,
        branches: &[Branch],
        interrupt: &CancellationToken,
    ) -> Result<AssertionStatus, BranchflowError> {
        let mut executions = Vec::with_capacity(branches.len());

        let scheduled = BranchScheduler::new(&self.pool, self.forker)
            .schedule(parent, branches, &mut executions)
            .await;

        let result = match scheduled {
            Ok(()) => {
                ResultCollector::new(self.forker)
                    .collect(parent, &mut executions, interrupt)
                    .await
            }
            Err(err) => Err(err),
        };

        let report = ResourceReaper::new(self.config.cleanup_grace())
            .cleanup(&mut executions)
            .await;
        debug!(
            contexts_closed = report.contexts_closed,
            handles_cancelled = report.handles_cancelled,
            unsettled = report.unsettled,
            "Branch resources reaped"
        );

        match &result {
            Ok(status) => debug!(status = %status, "Branches completed"),
            Err(err) => warn!(error = %err, "Branch invocation failed"),
        }
        result
    }
}

/// Shuts down the process-wide pool, cancelling all queued and running
/// branches. Returns the number of queued tasks discarded.
pub async fn shutdown() -> usize {
    shutdown_global_pool().await
}
