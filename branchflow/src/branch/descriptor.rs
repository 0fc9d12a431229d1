//! Immutable branch descriptors.

use super::Step;
use crate::context::normalize_name;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One child sub-pipeline of a concurrent composite.
///
/// The read and write sets are computed once, transitively over the step and
/// its enabled descendants, and stored normalized.
#[derive(Debug, Clone)]
pub struct Branch {
    step: Arc<dyn Step>,
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
    enabled: bool,
}

impl Branch {
    /// Creates a branch over `step`, enabled if the step is.
    pub fn new(step: Arc<dyn Step>) -> Self {
        let mut reads = BTreeSet::new();
        let mut writes = BTreeSet::new();
        collect_variables(step.as_ref(), &mut reads, &mut writes);

        Self {
            enabled: step.is_enabled(),
            step,
            reads,
            writes,
        }
    }

    /// Overrides the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the branch step.
    pub fn step(&self) -> &Arc<dyn Step> {
        &self.step
    }

    /// Returns the step name.
    pub fn name(&self) -> &str {
        self.step.name()
    }

    /// Variables forked into the branch.
    pub fn reads(&self) -> &BTreeSet<String> {
        &self.reads
    }

    /// Variables merged back from the branch.
    pub fn writes(&self) -> &BTreeSet<String> {
        &self.writes
    }

    /// Returns whether the branch runs.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

fn collect_variables(
    step: &dyn Step,
    reads: &mut BTreeSet<String>,
    writes: &mut BTreeSet<String>,
) {
    reads.extend(step.variables_used().iter().map(|name| normalize_name(name)));
    writes.extend(step.variables_set().iter().map(|name| normalize_name(name)));

    for child in step.children() {
        if child.is_enabled() {
            collect_variables(child.as_ref(), reads, writes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedStep;
    use pretty_assertions::assert_eq;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn test_branch_normalizes_variable_names() {
        let step = ScriptedStep::new("lookup")
            .reads(["Request.Path", "request.path", "Auth.User"])
            .writes(["Route"])
            .build();
        let branch = Branch::new(step);

        assert_eq!(branch.reads(), &set(&["auth.user", "request.path"]));
        assert_eq!(branch.writes(), &set(&["route"]));
        assert!(branch.is_enabled());
        assert_eq!(branch.name(), "lookup");
    }

    #[test]
    fn test_branch_enabled_follows_step() {
        let step = ScriptedStep::new("off").disabled().build();
        assert!(!Branch::new(step.clone()).is_enabled());
        assert!(Branch::new(step).with_enabled(true).is_enabled());
    }

    #[test]
    fn test_branch_sets_are_transitive_over_enabled_children() {
        let inner = ScriptedStep::new("inner").reads(["a"]).writes(["b"]).build();
        let skipped = ScriptedStep::new("skipped")
            .reads(["never_read"])
            .writes(["never_written"])
            .disabled()
            .build();
        let outer = ScriptedStep::new("outer")
            .reads(["x"])
            .child(inner)
            .child(skipped)
            .build();

        let branch = Branch::new(outer);

        assert_eq!(branch.reads(), &set(&["a", "x"]));
        assert_eq!(branch.writes(), &set(&["b"]));
    }
}
