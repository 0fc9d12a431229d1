//! The mutable request/response/variable state unit.

use super::{VariableMap, VariableValue};
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Audit verbosity for a processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// Informational auditing.
    #[default]
    Info,
    /// Warnings and above.
    Warning,
    /// Severe events only.
    Severe,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Severe => write!(f, "severe"),
        }
    }
}

/// The published service a request was resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
    /// Service identifier.
    pub id: Uuid,
    /// Service name.
    pub name: String,
    /// Routing URI, if any.
    pub routing_uri: Option<String>,
}

impl ServiceBinding {
    /// Creates a new binding with a fresh identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            routing_uri: None,
        }
    }

    /// Sets the routing URI.
    #[must_use]
    pub fn with_routing_uri(mut self, uri: impl Into<String>) -> Self {
        self.routing_uri = Some(uri.into());
        self
    }
}

/// Request, response, and variable state operated on by pipeline steps.
///
/// Exclusively owned by whichever execution unit currently holds it.
/// Dropping a context closes every message it holds.
pub struct ProcessingContext {
    request: Message,
    response: Message,
    variables: VariableMap,
    service: Option<Arc<ServiceBinding>>,
    audit_level: AuditLevel,
    was_compressed: bool,
    policy_executed: bool,
    closed: bool,
}

impl ProcessingContext {
    /// Creates a context over a request and response.
    #[must_use]
    pub fn new(request: Message, response: Message) -> Self {
        Self {
            request,
            response,
            variables: VariableMap::new(),
            service: None,
            audit_level: AuditLevel::default(),
            was_compressed: false,
            policy_executed: false,
            closed: false,
        }
    }

    /// Sets the service binding.
    #[must_use]
    pub fn with_service(mut self, service: Arc<ServiceBinding>) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the audit level.
    #[must_use]
    pub fn with_audit_level(mut self, level: AuditLevel) -> Self {
        self.audit_level = level;
        self
    }

    /// Returns the request message.
    #[must_use]
    pub fn request(&self) -> &Message {
        &self.request
    }

    /// Returns the request message mutably.
    pub fn request_mut(&mut self) -> &mut Message {
        &mut self.request
    }

    /// Returns the response message.
    #[must_use]
    pub fn response(&self) -> &Message {
        &self.response
    }

    /// Returns the response message mutably.
    pub fn response_mut(&mut self) -> &mut Message {
        &mut self.response
    }

    /// Returns the variable bindings.
    #[must_use]
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// Gets a variable.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<&VariableValue> {
        self.variables.get(name)
    }

    /// Gets a variable mutably.
    pub fn get_variable_mut(&mut self, name: &str) -> Option<&mut VariableValue> {
        self.variables.get_mut(name)
    }

    /// Gets a text variable.
    #[must_use]
    pub fn text_variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).and_then(VariableValue::as_text)
    }

    /// Sets a variable, closing any message it replaces.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        if let Some(VariableValue::Message(mut previous)) = self.variables.set(name, value) {
            previous.close();
        }
    }

    /// Removes a variable.
    pub fn remove_variable(&mut self, name: &str) -> Option<VariableValue> {
        self.variables.remove(name)
    }

    /// Returns the service binding.
    #[must_use]
    pub fn service(&self) -> Option<&Arc<ServiceBinding>> {
        self.service.as_ref()
    }

    /// Sets the service binding.
    pub fn set_service(&mut self, service: Option<Arc<ServiceBinding>>) {
        self.service = service;
    }

    /// Returns the audit level.
    #[must_use]
    pub fn audit_level(&self) -> AuditLevel {
        self.audit_level
    }

    /// Sets the audit level.
    pub fn set_audit_level(&mut self, level: AuditLevel) {
        self.audit_level = level;
    }

    /// Returns whether the request arrived compressed.
    #[must_use]
    pub fn was_compressed(&self) -> bool {
        self.was_compressed
    }

    /// Sets the compression flag.
    pub fn set_was_compressed(&mut self, compressed: bool) {
        self.was_compressed = compressed;
    }

    /// Returns whether policy execution was attempted on this context.
    #[must_use]
    pub fn policy_executed(&self) -> bool {
        self.policy_executed
    }

    /// Sets the policy execution flag.
    pub fn set_policy_executed(&mut self, executed: bool) {
        self.policy_executed = executed;
    }

    /// Returns true once the context has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the request, response, and every message variable. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.request.close();
        self.response.close();
        for value in self.variables.values_mut() {
            if let Some(message) = value.as_message_mut() {
                message.close();
            }
        }
    }
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new(Message::new(), Message::new())
    }
}

impl Drop for ProcessingContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ProcessingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingContext")
            .field("variables", &self.variables.len())
            .field("service", &self.service.as_ref().map(|s| s.name.as_str()))
            .field("audit_level", &self.audit_level)
            .field("was_compressed", &self.was_compressed)
            .field("policy_executed", &self.policy_executed)
            .field("closed", &self.closed)
            .finish()
    }
}
