//! Step trait.

use crate::context::ProcessingContext;
use crate::core::AssertionStatus;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A unit of pipeline work that can run as, or inside, a branch.
///
/// Steps describe their variable footprint statically so that branches can
/// fork only what they read and merge only what they write.
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Returns the name of the step.
    fn name(&self) -> &str;

    /// Names of the variables this step reads.
    fn variables_used(&self) -> Vec<String> {
        Vec::new()
    }

    /// Names of the variables this step sets.
    fn variables_set(&self) -> Vec<String> {
        Vec::new()
    }

    /// Nested steps, for composites.
    fn children(&self) -> Vec<Arc<dyn Step>> {
        Vec::new()
    }

    /// Whether the step runs at all.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Runs the step against `ctx`.
    ///
    /// # Errors
    ///
    /// An error is an unexpected fault, distinct from a non-success status.
    async fn execute(&self, ctx: &mut ProcessingContext) -> anyhow::Result<AssertionStatus>;
}
