//! Message bodies that count or fail, for leak and fault tests.

use crate::message::{InMemoryBody, Message, MessageBody};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts tracked bodies opened and closed.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl ResourceTracker {
    /// Creates a tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a message whose body is tracked.
    pub fn message(self: &Arc<Self>, content_type: &str, data: impl Into<Vec<u8>>) -> Message {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Message::with_body(
            content_type,
            Box::new(TrackedBody {
                inner: InMemoryBody::new(data),
                tracker: self.clone(),
                closed: false,
            }),
        )
    }

    /// Bodies created so far.
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Bodies closed so far.
    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Bodies still open.
    pub fn open_count(&self) -> usize {
        self.opened_count().saturating_sub(self.closed_count())
    }

    /// Panics if any tracked body is still open.
    pub fn assert_no_leaks(&self) {
        let open = self.open_count();
        assert!(
            open == 0,
            "{open} of {} tracked message bodies were never closed",
            self.opened_count()
        );
    }
}

/// An in-memory body that reports its closing to a [`ResourceTracker`].
#[derive(Debug)]
pub struct TrackedBody {
    inner: InMemoryBody,
    tracker: Arc<ResourceTracker>,
    closed: bool,
}

impl MessageBody for TrackedBody {
    fn read_all(&self) -> io::Result<Vec<u8>> {
        self.inner.read_all()
    }

    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.append(data)
    }

    fn len(&self) -> Option<usize> {
        self.inner.len()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inner.close();
        self.tracker.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A body whose every read and write fails.
#[derive(Debug, Default)]
pub struct FailingBody;

impl FailingBody {
    /// Creates a failing body.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MessageBody for FailingBody {
    fn read_all(&self) -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "body stream failed"))
    }

    fn append(&mut self, _data: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "body stream failed"))
    }

    fn len(&self) -> Option<usize> {
        None
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_closes_once() {
        let tracker = ResourceTracker::new();
        let mut message = tracker.message("text/plain", b"hello".to_vec());
        assert_eq!(tracker.open_count(), 1);

        message.close();
        message.close();
        assert_eq!(tracker.closed_count(), 1);
        tracker.assert_no_leaks();
    }

    #[test]
    #[should_panic(expected = "never closed")]
    fn test_tracker_reports_leak() {
        let tracker = ResourceTracker::new();
        let message = tracker.message("text/plain", b"leak".to_vec());
        std::mem::forget(message);
        tracker.assert_no_leaks();
    }

    #[test]
    fn test_failing_body() {
        let message = Message::with_body("text/plain", Box::new(FailingBody::new()));
        assert!(message.read_all().is_err());
    }
}
