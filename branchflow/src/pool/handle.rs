//! Handles to tasks submitted to the worker pool.

use crate::cancellation::CancellationToken;
use crate::errors::{TaskFault, WaitError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// A handle to the eventual result of a pool task.
///
/// The result can be taken exactly once, via `wait`, `wait_timeout`, or
/// `try_take`. Cancellation is best-effort: a task that is already running
/// stops at its next suspension point.
pub struct TaskHandle<T> {
    id: u64,
    rx: Option<oneshot::Receiver<Result<T, TaskFault>>>,
    token: Arc<CancellationToken>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(
        id: u64,
        rx: oneshot::Receiver<Result<T, TaskFault>>,
        token: Arc<CancellationToken>,
    ) -> Self {
        Self {
            id,
            rx: Some(rx),
            token,
        }
    }

    /// Returns the pool-assigned task ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true once the result has been taken.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.rx.is_none()
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Requests cancellation. Returns true if this call performed it.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.token.cancel(reason)
    }

    /// Waits for the task to resolve.
    ///
    /// # Errors
    ///
    /// Returns a `WaitError` if the task was cancelled, abandoned, or
    /// faulted, or if the result was already taken.
    pub async fn wait(&mut self) -> Result<T, WaitError> {
        let rx = self.rx.as_mut().ok_or(WaitError::Consumed)?;
        let received = rx.await;
        self.rx = None;

        match received {
            Ok(result) => Self::unwrap_fault(result),
            Err(_) => Err(self.closed_error()),
        }
    }

    /// Waits for the task to resolve, up to `timeout`.
    ///
    /// On `WaitError::TimedOut` the handle stays usable.
    ///
    /// # Errors
    ///
    /// As for `wait`, plus `WaitError::TimedOut`.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<T, WaitError> {
        let rx = self.rx.as_mut().ok_or(WaitError::Consumed)?;
        let Ok(received) = tokio::time::timeout(timeout, rx).await else {
            return Err(WaitError::TimedOut);
        };
        self.rx = None;

        match received {
            Ok(result) => Self::unwrap_fault(result),
            Err(_) => Err(self.closed_error()),
        }
    }

    /// Takes the result if the task has already resolved, without waiting.
    ///
    /// Returns `None` while the task is still queued or running.
    pub fn try_take(&mut self) -> Option<Result<T, WaitError>> {
        let Some(rx) = self.rx.as_mut() else {
            return Some(Err(WaitError::Consumed));
        };

        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                Some(Self::unwrap_fault(result))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.rx = None;
                Some(Err(self.closed_error()))
            }
        }
    }

    fn unwrap_fault(result: Result<T, TaskFault>) -> Result<T, WaitError> {
        result.map_err(|fault| match fault {
            TaskFault::Panicked(message) => WaitError::Faulted(message),
        })
    }

    fn closed_error(&self) -> WaitError {
        if self.token.is_cancelled() {
            WaitError::Cancelled
        } else {
            WaitError::Abandoned
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("consumed", &self.is_consumed())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
