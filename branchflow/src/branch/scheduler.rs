//! Forking and submitting enabled branches.

use super::{Branch, Step};
use crate::context::{ContextForker, ProcessingContext};
use crate::core::AssertionStatus;
use crate::errors::BranchflowError;
use crate::pool::{panic_message, TaskHandle, WorkerPool};
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a finished branch task hands back.
#[derive(Debug)]
pub(crate) struct BranchOutcome {
    pub(crate) status: AssertionStatus,
    pub(crate) context: ProcessingContext,
}

/// A submitted branch within one invocation.
///
/// The forked context waits in a shared slot until the task starts and takes
/// it. A context still in the slot belongs to a task that never ran. Dropping
/// the execution cancels its task.
pub struct BranchExecution<'a> {
    pub(crate) index: usize,
    pub(crate) branch: &'a Branch,
    pub(crate) pending: Arc<Mutex<Option<ProcessingContext>>>,
    pub(crate) handle: TaskHandle<Option<BranchOutcome>>,
    pub(crate) status: Option<AssertionStatus>,
}

impl<'a> BranchExecution<'a> {
    /// Position of the branch in declaration order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the branch.
    pub fn branch(&self) -> &'a Branch {
        self.branch
    }

    /// The branch status, once collected.
    pub fn status(&self) -> Option<AssertionStatus> {
        self.status
    }
}

impl Drop for BranchExecution<'_> {
    fn drop(&mut self) {
        if !self.handle.is_consumed() {
            self.handle.cancel("branch execution dropped");
        }
    }
}

impl std::fmt::Debug for BranchExecution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchExecution")
            .field("index", &self.index)
            .field("branch", &self.branch.name())
            .field("task_id", &self.handle.id())
            .field("status", &self.status)
            .finish()
    }
}

/// Forks a context for each enabled branch and submits it to the pool.
#[derive(Debug, Clone, Copy)]
pub struct BranchScheduler<'p> {
    pool: &'p WorkerPool,
    forker: ContextForker,
}

impl<'p> BranchScheduler<'p> {
    /// Creates a scheduler over `pool`.
    pub fn new(pool: &'p WorkerPool, forker: ContextForker) -> Self {
        Self { pool, forker }
    }

    /// Schedules `branches` in declaration order, appending to `executions`.
    ///
    /// Disabled branches are skipped entirely. On error, branches scheduled
    /// so far remain in `executions` for cleanup.
    ///
    /// # Errors
    ///
    /// Returns `BranchflowError::Fork` if a context cannot be forked, or
    /// `BranchflowError::Pool` if the pool is shut down.
    pub async fn schedule<'a>(
        &self,
        parent: &ProcessingContext,
        branches: &'a [Branch],
        executions: &mut Vec<BranchExecution<'a>>,
    ) -> Result<(), BranchflowError> {
        for (index, branch) in branches.iter().enumerate() {
            if !branch.is_enabled() {
                debug!(branch = branch.name(), index, "Skipping disabled branch");
                continue;
            }

            let child = self
                .forker
                .fork(parent, branch.reads())
                .map_err(|err| BranchflowError::fork(branch.name(), err))?;

            let pending = Arc::new(Mutex::new(Some(child)));
            let slot = pending.clone();
            let step = branch.step().clone();

            let handle = self
                .pool
                .submit(async move {
                    let taken = slot.lock().take();
                    let mut context = taken?;
                    let status = run_step(step.as_ref(), &mut context, index).await;
                    Some(BranchOutcome { status, context })
                })
                .await?;

            debug!(
                branch = branch.name(),
                index,
                task_id = handle.id(),
                reads = branch.reads().len(),
                "Branch submitted"
            );

            executions.push(BranchExecution {
                index,
                branch,
                pending,
                handle,
                status: None,
            });
        }

        Ok(())
    }
}

/// Runs a branch step, turning faults and panics into `ServerError`.
async fn run_step(
    step: &dyn Step,
    context: &mut ProcessingContext,
    index: usize,
) -> AssertionStatus {
    match AssertUnwindSafe(step.execute(context)).catch_unwind().await {
        Ok(Ok(status)) => status,
        Ok(Err(err)) => {
            warn!(branch = step.name(), index, error = %err, "Branch step faulted");
            AssertionStatus::ServerError
        }
        Err(panic) => {
            warn!(
                branch = step.name(),
                index,
                panic = %panic_message(panic.as_ref()),
                "Branch step panicked"
            );
            AssertionStatus::ServerError
        }
    }
}
