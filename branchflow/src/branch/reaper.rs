//! Post-invocation cleanup of branch executions.

use super::BranchExecution;
use crate::errors::WaitError;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// What one cleanup pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Forked contexts released by the reaper.
    pub contexts_closed: usize,
    /// Handles the reaper cancelled.
    pub handles_cancelled: usize,
    /// Cancelled tasks that had not settled when the grace period ran out.
    pub unsettled: usize,
}

/// Cancels unfinished branches and releases their forked contexts.
#[derive(Debug, Clone, Copy)]
pub struct ResourceReaper {
    grace: Duration,
}

impl ResourceReaper {
    /// Creates a reaper that waits up to `grace` for a cancelled running
    /// branch to hand its context back.
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Cleans up and empties `executions`. Never fails.
    ///
    /// A branch whose task never started has its context closed directly. A
    /// running branch is cancelled and given the grace period to settle. A
    /// resolved but uncollected branch has its result taken and closed.
    pub async fn cleanup(&self, executions: &mut Vec<BranchExecution<'_>>) -> ReapReport {
        let mut report = ReapReport::default();

        for mut execution in executions.drain(..) {
            if execution.handle.is_consumed() {
                continue;
            }

            let pending = execution.pending.lock().take();
            if let Some(mut context) = pending {
                context.close();
                report.contexts_closed += 1;
                if execution.handle.cancel("branch not needed") {
                    report.handles_cancelled += 1;
                }
                continue;
            }

            if let Some(result) = execution.handle.try_take() {
                if let Ok(Some(mut outcome)) = result {
                    outcome.context.close();
                    report.contexts_closed += 1;
                }
                continue;
            }

            if execution.handle.cancel("branch not needed") {
                report.handles_cancelled += 1;
            }

            match execution.handle.wait_timeout(self.grace).await {
                Ok(Some(mut outcome)) => {
                    outcome.context.close();
                    report.contexts_closed += 1;
                }
                Ok(None) => {}
                Err(WaitError::TimedOut) => {
                    report.unsettled += 1;
                    warn!(
                        branch = execution.branch.name(),
                        index = execution.index,
                        grace_ms = u64::try_from(self.grace.as_millis()).unwrap_or(u64::MAX),
                        "Cancelled branch did not settle within grace period"
                    );
                }
                // The pool dropped the task, and its context with it.
                Err(_) => report.contexts_closed += 1,
            }
        }

        report
    }
}
