//! Case-insensitive variable bindings.

use crate::message::Message;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A typed variable value.
///
/// Only `Text` and `Message` values cross a fork or merge boundary.
#[derive(Debug)]
pub enum VariableValue {
    /// Immutable text, shared by reference when copied.
    Text(Arc<str>),
    /// A message, deep-copied when copied.
    Message(Message),
    /// Any other value; never propagated between contexts.
    Other(serde_json::Value),
}

impl VariableValue {
    /// Creates a text value.
    #[must_use]
    pub fn text(value: impl AsRef<str>) -> Self {
        Self::Text(Arc::from(value.as_ref()))
    }

    /// Returns the text, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the message, if this is a message value.
    #[must_use]
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the message mutably, if this is a message value.
    pub fn as_message_mut(&mut self) -> Option<&mut Message> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the kind name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Message(_) => "message",
            Self::Other(_) => "other",
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<Message> for VariableValue {
    fn from(value: Message) -> Self {
        Self::Message(value)
    }
}

/// Normalizes a variable name for lookup.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}

/// A variable entry keeping the spelling of its most recent write.
#[derive(Debug)]
struct Entry {
    name: String,
    value: VariableValue,
}

/// Variable bindings keyed case-insensitively.
#[derive(Default)]
pub struct VariableMap {
    entries: HashMap<String, Entry>,
}

impl VariableMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.entries.get(&normalize_name(name)).map(|e| &e.value)
    }

    /// Gets a value mutably by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut VariableValue> {
        self.entries
            .get_mut(&normalize_name(name))
            .map(|e| &mut e.value)
    }

    /// Gets the stored spelling of a name.
    #[must_use]
    pub fn stored_name(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&normalize_name(name))
            .map(|e| e.name.as_str())
    }

    /// Sets a value, returning the previous one.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<VariableValue>,
    ) -> Option<VariableValue> {
        let name = name.into();
        self.entries
            .insert(
                normalize_name(&name),
                Entry {
                    name,
                    value: value.into(),
                },
            )
            .map(|e| e.value)
    }

    /// Removes a value.
    pub fn remove(&mut self, name: &str) -> Option<VariableValue> {
        self.entries.remove(&normalize_name(name)).map(|e| e.value)
    }

    /// Checks if a name is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }

    /// Returns the bound values whose names appear in `names`, keyed by stored spelling.
    #[must_use]
    pub fn matching<'a, I, S>(&self, names: I) -> HashMap<&str, &VariableValue>
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<str> + ?Sized + 'a,
    {
        names
            .into_iter()
            .filter_map(|name| self.entries.get(&normalize_name(name.as_ref())))
            .map(|e| (e.name.as_str(), &e.value))
            .collect()
    }

    /// Iterates over stored names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableValue)> {
        self.entries.values().map(|e| (e.name.as_str(), &e.value))
    }

    /// Iterates mutably over values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut VariableValue> {
        self.entries.values_mut().map(|e| &mut e.value)
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns all stored names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.values().map(|e| e.name.clone()).collect()
    }
}

impl fmt::Debug for VariableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
