//! Scripted steps for exercising the engine.

use super::{Latch, ResourceTracker};
use crate::branch::Step;
use crate::context::{ProcessingContext, VariableValue};
use crate::core::AssertionStatus;
use crate::message::Message;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Name of the variable a step stores its tracked resource under.
pub const SCRATCH_VARIABLE: &str = "scratch";

/// How a scripted step misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultMode {
    /// Runs normally.
    #[default]
    None,
    /// Returns an error.
    Error,
    /// Panics.
    Panic,
}

/// A step whose behaviour is fixed up front.
///
/// When executed it, in order: opens its tracked resource, appends to
/// message variables, sets text variables, opens its `signal` latch, waits
/// on its `wait_for` latch, sleeps, then faults or returns its status.
#[derive(Debug)]
pub struct ScriptedStep {
    name: String,
    status: AssertionStatus,
    reads: Vec<String>,
    writes: Vec<String>,
    texts: Vec<(String, String)>,
    appends: Vec<(String, Vec<u8>)>,
    signal: Option<Latch>,
    wait_for: Option<Latch>,
    delay: Option<Duration>,
    resource: Option<Arc<ResourceTracker>>,
    fault: FaultMode,
    children: Vec<Arc<dyn Step>>,
    enabled: bool,
    executions: AtomicUsize,
    observed: Mutex<HashMap<String, String>>,
    addresses: Mutex<HashMap<String, usize>>,
}

impl ScriptedStep {
    /// Creates a step that succeeds without touching anything.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: AssertionStatus::None,
            reads: Vec::new(),
            writes: Vec::new(),
            texts: Vec::new(),
            appends: Vec::new(),
            signal: None,
            wait_for: None,
            delay: None,
            resource: None,
            fault: FaultMode::None,
            children: Vec::new(),
            enabled: true,
            executions: AtomicUsize::new(0),
            observed: Mutex::new(HashMap::new()),
            addresses: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the returned status.
    #[must_use]
    pub fn status(mut self, status: AssertionStatus) -> Self {
        self.status = status;
        self
    }

    /// Declares variables read.
    #[must_use]
    pub fn reads<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declares variables written.
    #[must_use]
    pub fn writes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets a text variable when run. The variable is declared as written.
    #[must_use]
    pub fn sets_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.writes.push(name.clone());
        self.texts.push((name, value.into()));
        self
    }

    /// Appends to a message variable when run. The variable is declared as
    /// both read and written.
    #[must_use]
    pub fn appends(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        self.reads.push(name.clone());
        self.writes.push(name.clone());
        self.appends.push((name, data.into()));
        self
    }

    /// Opens `latch` once the step's variable updates are done.
    #[must_use]
    pub fn signal(mut self, latch: Latch) -> Self {
        self.signal = Some(latch);
        self
    }

    /// Waits for `latch` before finishing.
    #[must_use]
    pub fn wait_for(mut self, latch: Latch) -> Self {
        self.wait_for = Some(latch);
        self
    }

    /// Sleeps before finishing.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stores a message from `tracker` in the context while running.
    #[must_use]
    pub fn holds_resource(mut self, tracker: &Arc<ResourceTracker>) -> Self {
        self.resource = Some(tracker.clone());
        self
    }

    /// Fails with an error instead of returning a status.
    #[must_use]
    pub fn fails_with_error(mut self) -> Self {
        self.fault = FaultMode::Error;
        self
    }

    /// Panics instead of returning a status.
    #[must_use]
    pub fn panics(mut self) -> Self {
        self.fault = FaultMode::Panic;
        self
    }

    /// Adds a nested step.
    #[must_use]
    pub fn child(mut self, step: Arc<dyn Step>) -> Self {
        self.children.push(step);
        self
    }

    /// Marks the step disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Finishes building.
    #[must_use]
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of times the step has run.
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Text of an appended message variable as this step last saw it.
    pub fn observed(&self, name: &str) -> Option<String> {
        self.observed.lock().get(name).cloned()
    }

    /// Address of the message object this step appended to under `name`.
    pub fn observed_address(&self, name: &str) -> Option<usize> {
        self.addresses.lock().get(name).copied()
    }
}

#[async_trait]
impl Step for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables_used(&self) -> Vec<String> {
        self.reads.clone()
    }

    fn variables_set(&self) -> Vec<String> {
        self.writes.clone()
    }

    fn children(&self) -> Vec<Arc<dyn Step>> {
        self.children.clone()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> anyhow::Result<AssertionStatus> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if let Some(tracker) = &self.resource {
            ctx.set_variable(
                SCRATCH_VARIABLE,
                tracker.message("application/octet-stream", self.name.as_bytes().to_vec()),
            );
        }

        for (name, data) in &self.appends {
            let message = ctx
                .get_variable_mut(name)
                .and_then(VariableValue::as_message_mut)
                .ok_or_else(|| anyhow::anyhow!("message variable '{name}' is not available"))?;
            message.append(data)?;
            let text = message.read_text()?;
            self.observed.lock().insert(name.clone(), text);
            self.addresses
                .lock()
                .insert(name.clone(), std::ptr::from_ref::<Message>(message) as usize);
        }

        for (name, value) in &self.texts {
            ctx.set_variable(name.as_str(), VariableValue::text(value));
        }

        if let Some(latch) = &self.signal {
            latch.open();
        }
        if let Some(latch) = &self.wait_for {
            latch.wait().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.fault {
            FaultMode::None => Ok(self.status),
            FaultMode::Error => Err(anyhow::anyhow!("scripted failure in '{}'", self.name)),
            FaultMode::Panic => panic!("scripted panic in '{}'", self.name),
        }
    }
}
