//! Processing contexts and their fork/merge rules.
//!
//! This module provides:
//! - The mutable `ProcessingContext` owned by one execution unit at a time
//! - Case-insensitive variable bindings
//! - `ContextForker` for isolated per-branch copies and merging back

#[cfg(test)]
mod context_tests;
mod fork;
mod processing;
mod variables;

pub use fork::ContextForker;
pub use processing::{AuditLevel, ProcessingContext, ServiceBinding};
pub use variables::{normalize_name, VariableMap, VariableValue};
