//! Isolated per-branch context copies.

use super::{ProcessingContext, VariableValue};
use crate::message::Message;
use std::collections::BTreeSet;
use std::io;
use tracing::debug;

/// Forks contexts for branches and merges branch writes back.
///
/// Text values are immutable and are shared by reference. Message values are
/// deep-copied. Any other value type is left behind: it is neither forked nor
/// merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextForker;

impl ContextForker {
    /// Creates a new forker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Creates an isolated child context holding only `reads` from `parent`.
    ///
    /// Scalar pipeline attributes are copied unconditionally and the child is
    /// marked as having had policy execution attempted. The child gets fresh,
    /// uninitialized request and response messages.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while reading a message body; the partial
    /// child is closed and discarded.
    pub fn fork(
        &self,
        parent: &ProcessingContext,
        reads: &BTreeSet<String>,
    ) -> io::Result<ProcessingContext> {
        let mut child = ProcessingContext::new(Message::new(), Message::new());
        child.set_was_compressed(parent.was_compressed());
        child.set_service(parent.service().cloned());
        child.set_audit_level(parent.audit_level());
        child.set_policy_executed(true);

        self.copy_variables(parent, &mut child, reads)?;
        Ok(child)
    }

    /// Copies `writes` from a finished branch context into `parent`.
    ///
    /// Names the branch never bound are left untouched in the parent.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while reading a message body.
    pub fn merge(
        &self,
        child: &ProcessingContext,
        parent: &mut ProcessingContext,
        writes: &BTreeSet<String>,
    ) -> io::Result<usize> {
        self.copy_variables(child, parent, writes)
    }

    /// Copies the named variables from `source` into `target`.
    ///
    /// Returns the number of variables copied.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while reading a message body.
    pub fn copy_variables(
        &self,
        source: &ProcessingContext,
        target: &mut ProcessingContext,
        names: &BTreeSet<String>,
    ) -> io::Result<usize> {
        let mut copied = 0;

        for (name, value) in source.variables().matching(names.iter()) {
            let copy = match value {
                VariableValue::Text(text) => VariableValue::Text(text.clone()),
                VariableValue::Message(message) => VariableValue::Message(message.deep_copy()?),
                VariableValue::Other(_) => {
                    debug!(
                        variable = %name,
                        kind = value.kind(),
                        "Variable type is not propagated across branch boundary"
                    );
                    continue;
                }
            };
            target.set_variable(name, copy);
            copied += 1;
        }

        Ok(copied)
    }
}
