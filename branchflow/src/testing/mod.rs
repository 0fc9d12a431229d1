//! Test doubles for branchflow.
//!
//! This module provides:
//! - [`ScriptedStep`], a step with fixed behaviour and timing hooks
//! - [`Latch`] for ordering branch completion
//! - [`ResourceTracker`] for detecting unclosed message bodies
//! - [`FailingBody`] for injecting I/O faults

mod resources;
mod steps;
mod sync;

pub use resources::{FailingBody, ResourceTracker, TrackedBody};
pub use steps::{FaultMode, ScriptedStep, SCRATCH_VARIABLE};
pub use sync::Latch;
