//! Error types for the branchflow engine.
//!
//! Branch-local faults never surface here: they are converted into
//! [`AssertionStatus::ServerError`](crate::core::AssertionStatus) inside the
//! branch task. Only faults raised on the calling task itself (forking,
//! merging, submitting) propagate as [`BranchflowError`].

use std::collections::HashMap;
use thiserror::Error;

/// The main error type for branchflow operations.
#[derive(Debug, Error)]
pub enum BranchflowError {
    /// Copying a variable into a branch's forked context failed.
    #[error("Failed to fork context for branch '{branch}': {source}")]
    Fork {
        /// The branch whose fork failed.
        branch: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Copying a branch's writes back into the parent context failed.
    #[error("Failed to merge results of branch '{branch}': {source}")]
    Merge {
        /// The branch whose merge failed.
        branch: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The worker pool refused the operation.
    #[error("{0}")]
    Pool(#[from] PoolError),

    /// Invalid configuration.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl BranchflowError {
    /// Creates a fork error.
    #[must_use]
    pub fn fork(branch: impl Into<String>, source: std::io::Error) -> Self {
        Self::Fork {
            branch: branch.into(),
            source,
        }
    }

    /// Creates a merge error.
    #[must_use]
    pub fn merge(branch: impl Into<String>, source: std::io::Error) -> Self {
        Self::Merge {
            branch: branch.into(),
            source,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        match self {
            Self::Fork { branch, .. } => {
                map.insert("type".to_string(), serde_json::json!("ForkError"));
                map.insert("branch".to_string(), serde_json::json!(branch));
            }
            Self::Merge { branch, .. } => {
                map.insert("type".to_string(), serde_json::json!("MergeError"));
                map.insert("branch".to_string(), serde_json::json!(branch));
            }
            Self::Pool(_) => {
                map.insert("type".to_string(), serde_json::json!("PoolError"));
            }
            Self::Config(_) => {
                map.insert("type".to_string(), serde_json::json!("ConfigError"));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Errors raised by the worker pool itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool has been shut down and accepts no more work.
    #[error("Worker pool has been shut down")]
    Shutdown,

    /// The global pool was already constructed when configuration arrived.
    #[error("Worker pool is already initialized; configuration must be supplied before first use")]
    AlreadyInitialized,

    /// The runtime that hosts the pool's workers could not be started.
    #[error("Worker pool runtime failed to start: {0}")]
    Runtime(String),
}

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A property could not be parsed.
    #[error("Invalid value '{value}' for configuration key '{key}'")]
    InvalidValue {
        /// The property key.
        key: String,
        /// The raw value.
        value: String,
    },

    /// The configuration is internally inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Result type for waiting on a pool task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The wait deadline elapsed before the task resolved.
    #[error("Timed out waiting for task")]
    TimedOut,

    /// The task was cancelled before producing a result.
    #[error("Task was cancelled")]
    Cancelled,

    /// The task was dropped by the pool without being cancelled (pool teardown).
    #[error("Task was abandoned by the worker pool")]
    Abandoned,

    /// The task itself failed unexpectedly.
    #[error("Task faulted: {0}")]
    Faulted(String),

    /// The handle's result was already taken.
    #[error("Task result was already consumed")]
    Consumed,
}

/// An unexpected failure inside a submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFault {
    /// The task panicked.
    #[error("Task panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fork_error_display() {
        let err = BranchflowError::fork(
            "audit",
            std::io::Error::new(std::io::ErrorKind::Other, "stream closed"),
        );

        assert!(err.to_string().contains("branch 'audit'"));
        assert!(err.to_string().contains("stream closed"));
    }

    #[test]
    fn test_error_to_dict() {
        let err = BranchflowError::merge(
            "route",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "MergeError");
        assert_eq!(dict.get("branch").unwrap(), "route");
    }

    #[test]
    fn test_pool_error_converts() {
        let err: BranchflowError = PoolError::Shutdown.into();
        assert!(matches!(err, BranchflowError::Pool(PoolError::Shutdown)));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid_value("branchflow.pool.core_threads", "many");
        assert_eq!(
            err.to_string(),
            "Invalid value 'many' for configuration key 'branchflow.pool.core_threads'"
        );
    }
}
