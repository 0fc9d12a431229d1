//! Request and response messages.
//!
//! A [`Message`] is an optional content type plus an optional body. Messages
//! are never shared between execution units: crossing a fork or merge
//! boundary always goes through [`Message::deep_copy`].

mod body;

pub use body::{InMemoryBody, MessageBody};

use std::fmt;
use std::io;
use tracing::warn;

/// A request, response, or message-typed variable.
pub struct Message {
    content_type: Option<String>,
    body: Option<Box<dyn MessageBody>>,
    closed: bool,
}

impl Message {
    /// Creates an uninitialized message with no body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            content_type: None,
            body: None,
            closed: false,
        }
    }

    /// Creates a message from a content type and in-memory bytes.
    #[must_use]
    pub fn from_bytes(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::with_body(content_type, Box::new(InMemoryBody::new(data)))
    }

    /// Creates a message over a custom body.
    #[must_use]
    pub fn with_body(content_type: impl Into<String>, body: Box<dyn MessageBody>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            body: Some(body),
            closed: false,
        }
    }

    /// Returns the content type, if initialized.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns true if the message has a body.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.body.is_some()
    }

    /// Returns true once the message has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads the entire body into memory.
    ///
    /// An uninitialized message reads as empty.
    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        if self.closed {
            return Err(closed_error());
        }
        match self.body {
            Some(ref body) => body.read_all(),
            None => Ok(Vec::new()),
        }
    }

    /// Reads the body as UTF-8 text.
    pub fn read_text(&self) -> io::Result<String> {
        let bytes = self.read_all()?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Appends bytes to the body, initializing an empty body if needed.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        self.body
            .get_or_insert_with(|| Box::new(InMemoryBody::default()))
            .append(data)
    }

    /// Builds an independent copy of this message.
    ///
    /// The body is read fully into a fresh buffer, so later mutation of
    /// either message is never visible through the other.
    pub fn deep_copy(&self) -> io::Result<Self> {
        if self.closed {
            return Err(closed_error());
        }
        match (&self.content_type, &self.body) {
            (_, None) => Ok(Self::new()),
            (content_type, Some(body)) => {
                let data = body.read_all()?;
                Ok(Self {
                    content_type: content_type.clone(),
                    body: Some(Box::new(InMemoryBody::new(data))),
                    closed: false,
                })
            }
        }
    }

    /// Releases the body. Idempotent; never panics outward.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mut body) = self.body.take() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                body.close();
            }));
            if let Err(e) = result {
                warn!("Message body close panicked: {:?}", e);
            }
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "message has been closed")
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.as_ref().and_then(|b| b.len()))
            .field("closed", &self.closed)
            .finish()
    }
}
