//! In-order collection and merging of branch results.

use super::BranchExecution;
use crate::cancellation::CancellationToken;
use crate::context::{ContextForker, ProcessingContext};
use crate::core::AssertionStatus;
use crate::errors::BranchflowError;
use tracing::{debug, warn};

/// Waits on branch executions in declaration order and merges their writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultCollector {
    forker: ContextForker,
}

impl ResultCollector {
    /// Creates a collector.
    pub fn new(forker: ContextForker) -> Self {
        Self { forker }
    }

    /// Collects `executions` into `parent` and returns the overall status.
    ///
    /// Each branch's writes are merged as soon as it resolves, in declaration
    /// order, before its status is inspected. The first non-success status is
    /// returned immediately; later branches are neither awaited nor merged.
    /// With no executions the result is `Failed`.
    ///
    /// A fired `interrupt`, a task fault, or a task that never ran aborts with
    /// `ServerError`.
    ///
    /// # Errors
    ///
    /// Returns `BranchflowError::Merge` if a branch's writes cannot be copied.
    pub async fn collect(
        &self,
        parent: &mut ProcessingContext,
        executions: &mut [BranchExecution<'_>],
        interrupt: &CancellationToken,
    ) -> Result<AssertionStatus, BranchflowError> {
        let mut overall = AssertionStatus::Failed;

        for execution in executions.iter_mut() {
            let branch = execution.branch;

            let waited = tokio::select! {
                biased;
                () = interrupt.cancelled() => {
                    warn!(
                        branch = branch.name(),
                        index = execution.index,
                        reason = interrupt.reason().as_deref().unwrap_or("interrupted"),
                        "Branch collection interrupted"
                    );
                    return Ok(AssertionStatus::ServerError);
                }
                result = execution.handle.wait() => result,
            };

            let outcome = match waited {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    warn!(
                        branch = branch.name(),
                        index = execution.index,
                        "Branch task ran without a context"
                    );
                    return Ok(AssertionStatus::ServerError);
                }
                Err(err) => {
                    warn!(
                        branch = branch.name(),
                        index = execution.index,
                        error = %err,
                        "Waiting on branch failed"
                    );
                    return Ok(AssertionStatus::ServerError);
                }
            };

            let merged = self
                .forker
                .merge(&outcome.context, parent, branch.writes())
                .map_err(|err| BranchflowError::merge(branch.name(), err))?;

            execution.status = Some(outcome.status);
            overall = outcome.status;
            debug!(
                branch = branch.name(),
                index = execution.index,
                status = %overall,
                merged,
                "Branch collected"
            );

            // Closes the branch context.
            drop(outcome);

            if !overall.is_success() {
                return Ok(overall);
            }
        }

        Ok(overall)
    }
}
