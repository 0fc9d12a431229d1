//! Core domain model types for branchflow.
//!
//! This module contains the status vocabulary shared by every step,
//! branch, and composite in a policy pipeline.

mod status;

pub use status::AssertionStatus;
