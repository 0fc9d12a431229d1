//! Pluggable message body storage.

use std::fmt::Debug;
use std::io;

/// Backing storage for a message body.
///
/// Implementations may wrap streams, spooled files, or plain buffers. The
/// engine only ever needs to read a body fully into memory, append to it,
/// and release it.
pub trait MessageBody: Send + Sync + Debug {
    /// Reads the entire body into a fresh buffer.
    fn read_all(&self) -> io::Result<Vec<u8>>;

    /// Appends bytes to the end of the body.
    fn append(&mut self, data: &[u8]) -> io::Result<()>;

    /// Returns the body length, if known without reading.
    fn len(&self) -> Option<usize>;

    /// Returns true if the body is known to be empty.
    fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Releases any resources held by the body. Must be idempotent.
    fn close(&mut self);
}

/// A body held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBody {
    data: Vec<u8>,
}

impl InMemoryBody {
    /// Creates a body over the given bytes.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl MessageBody for InMemoryBody {
    fn read_all(&self) -> io::Result<Vec<u8>> {
        Ok(self.data.clone())
    }

    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn len(&self) -> Option<usize> {
        Some(self.data.len())
    }

    fn close(&mut self) {
        self.data = Vec::new();
    }
}
