//! Coordination primitives for controlling branch timing in tests.

use std::sync::Arc;
use tokio::sync::watch;

/// A one-shot gate. Once opened it stays open.
#[derive(Debug, Clone)]
pub struct Latch {
    state: Arc<watch::Sender<bool>>,
}

impl Latch {
    /// Creates a closed latch.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Opens the latch, releasing all waiters.
    pub fn open(&self) {
        self.state.send_replace(true);
    }

    /// Returns whether the latch is open.
    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits until the latch is open.
    pub async fn wait(&self) {
        let mut state = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state.wait_for(|open| *open).await;
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_latch_releases_waiters() {
        let latch = Latch::new();
        assert!(!latch.is_open());

        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        latch.open();
        waiter.await.unwrap();
        assert!(latch.is_open());

        // Already open: returns immediately.
        latch.wait().await;
    }
}
