//! Concurrent branch execution.
//!
//! A concurrent composite step runs each of its enabled branches on an
//! isolated fork of the parent context:
//!
//! 1. [`BranchScheduler`] forks and submits every enabled branch.
//! 2. [`ResultCollector`] waits on them in declaration order, merging each
//!    branch's writes and stopping at the first non-success status.
//! 3. [`ResourceReaper`] cancels whatever is left and closes every fork.
//!
//! [`ConcurrentBranchEngine::run_branches`] ties the three together.

mod collector;
mod composite;
mod descriptor;
mod engine;
mod reaper;
mod scheduler;
mod step;


pub use collector::ResultCollector;
pub use composite::ConcurrentAllStep;
pub use descriptor::Branch;
pub use engine::{shutdown, ConcurrentBranchEngine};
pub use reaper::{ReapReport, ResourceReaper};
pub use scheduler::{BranchExecution, BranchScheduler};
pub use step::Step;
