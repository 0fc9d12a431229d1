//! The concurrent composite step.

use super::{Branch, ConcurrentBranchEngine, Step};
use crate::context::ProcessingContext;
use crate::core::AssertionStatus;
use async_trait::async_trait;
use std::sync::Arc;

/// A step that runs all of its children concurrently.
///
/// Succeeds only if every enabled child does; otherwise returns the first
/// failing status in declaration order.
#[derive(Debug, Clone)]
pub struct ConcurrentAllStep {
    name: String,
    branches: Vec<Branch>,
    engine: ConcurrentBranchEngine,
    enabled: bool,
}

impl ConcurrentAllStep {
    /// Creates a composite over `children`, run on `engine`.
    pub fn new(
        name: impl Into<String>,
        engine: ConcurrentBranchEngine,
        children: impl IntoIterator<Item = Arc<dyn Step>>,
    ) -> Self {
        Self {
            name: name.into(),
            branches: children.into_iter().map(Branch::new).collect(),
            engine,
            enabled: true,
        }
    }

    /// Sets whether the composite runs at all.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the branches.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }
}

#[async_trait]
impl Step for ConcurrentAllStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Vec<Arc<dyn Step>> {
        self.branches
            .iter()
            .filter(|branch| branch.is_enabled())
            .map(|branch| branch.step().clone())
            .collect()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> anyhow::Result<AssertionStatus> {
        Ok(self.engine.run_branches(ctx, &self.branches).await?)
    }
}
