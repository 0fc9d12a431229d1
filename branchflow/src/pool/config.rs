//! Worker pool and engine configuration.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Property key for the number of always-on workers.
pub const CORE_THREADS_KEY: &str = "branchflow.pool.core_threads";
/// Property key for the worker ceiling.
pub const MAX_THREADS_KEY: &str = "branchflow.pool.max_threads";
/// Property key for the bounded queue capacity.
pub const QUEUE_CAPACITY_KEY: &str = "branchflow.pool.queue_capacity";
/// Property key for the idle lifetime of workers above core size.
pub const KEEP_ALIVE_KEY: &str = "branchflow.pool.keep_alive_ms";
/// Property key for the reaper grace period.
pub const CLEANUP_GRACE_KEY: &str = "branchflow.engine.cleanup_grace_ms";

/// Configuration for the shared worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Workers kept alive for the life of the pool.
    #[serde(default = "default_core_threads")]
    pub core_threads: usize,
    /// Upper bound on workers.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// Capacity of the bounded work queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Idle lifetime of workers above core size, in milliseconds.
    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_ms: u64,
}

fn default_core_threads() -> usize {
    32
}

fn default_max_threads() -> usize {
    64
}

fn default_queue_capacity() -> usize {
    512
}

fn default_keep_alive_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_threads: default_core_threads(),
            max_threads: default_max_threads(),
            queue_capacity: default_queue_capacity(),
            keep_alive_ms: default_keep_alive_ms(),
        }
    }
}

impl WorkerPoolConfig {
    /// Creates a new pool configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the core worker count.
    #[must_use]
    pub fn with_core_threads(mut self, core_threads: usize) -> Self {
        self.core_threads = core_threads;
        self
    }

    /// Sets the maximum worker count.
    #[must_use]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the keep-alive for workers above core size.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive_ms = u64::try_from(keep_alive.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Gets keep-alive as Duration.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Reads configuration from gateway properties.
    ///
    /// Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable values and
    /// `ConfigError::Invalid` if the result fails validation.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let config = Self {
            core_threads: property_or(properties, CORE_THREADS_KEY, default_core_threads())?,
            max_threads: property_or(properties, MAX_THREADS_KEY, default_max_threads())?,
            queue_capacity: property_or(properties, QUEUE_CAPACITY_KEY, default_queue_capacity())?,
            keep_alive_ms: property_or(properties, KEEP_ALIVE_KEY, default_keep_alive_ms())?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_threads == 0 {
            return Err(ConfigError::Invalid(
                "core_threads must be at least 1".to_string(),
            ));
        }
        if self.max_threads < self.core_threads {
            return Err(ConfigError::Invalid(format!(
                "max_threads ({}) must not be less than core_threads ({})",
                self.max_threads, self.core_threads
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.keep_alive_ms == 0 {
            return Err(ConfigError::Invalid(
                "keep_alive_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a branch engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long the reaper waits for a cancelled, running branch to stop.
    #[serde(default = "default_cleanup_grace_ms")]
    pub cleanup_grace_ms: u64,
}

fn default_cleanup_grace_ms() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cleanup_grace_ms: default_cleanup_grace_ms(),
        }
    }
}

impl EngineConfig {
    /// Creates a new engine configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cleanup grace period.
    #[must_use]
    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Gets the cleanup grace period as Duration.
    #[must_use]
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    /// Reads configuration from gateway properties.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable values.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            cleanup_grace_ms: property_or(
                properties,
                CLEANUP_GRACE_KEY,
                default_cleanup_grace_ms(),
            )?,
        })
    }
}

fn property_or<T: FromStr>(
    properties: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match properties.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid_value(key, raw)),
        None => Ok(default),
    }
}
