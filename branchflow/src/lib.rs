//! # Branchflow
//!
//! Concurrent branch execution for gateway policy pipelines.
//!
//! A concurrent composite step runs several child sub-pipelines ("branches")
//! at once. Branchflow provides:
//!
//! - **Isolation**: each branch runs on its own fork of the processing
//!   context, holding only the variables it reads
//! - **Deterministic merging**: branch writes are merged back in declaration
//!   order, whatever order the branches finish in
//! - **Backpressure**: branches run on a bounded, process-wide worker pool
//!   whose full queue throttles submitters rather than failing them
//! - **Cleanup**: every fork is closed and every unfinished branch cancelled
//!   before the composite returns
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use branchflow::prelude::*;
//!
//! let engine = ConcurrentBranchEngine::global();
//! let branches = vec![
//!     Branch::new(Arc::new(RateLimitStep::new())),
//!     Branch::new(Arc::new(AuditStep::new())),
//! ];
//!
//! let status = engine.run_branches(&mut ctx, &branches).await?;
//! if !status.is_success() {
//!     // roll back
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod branch;
pub mod cancellation;
pub mod context;
pub mod core;
pub mod errors;
pub mod message;
pub mod observability;
pub mod pool;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::branch::{
        shutdown, Branch, ConcurrentAllStep, ConcurrentBranchEngine, ReapReport, Step,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{
        AuditLevel, ContextForker, ProcessingContext, ServiceBinding, VariableValue,
    };
    pub use crate::core::AssertionStatus;
    pub use crate::errors::{BranchflowError, ConfigError, PoolError, WaitError};
    pub use crate::message::{InMemoryBody, Message, MessageBody};
    pub use crate::pool::{
        configure_global_pool, global_worker_pool, EngineConfig, WorkerPool,
        WorkerPoolConfig,
    };
}
