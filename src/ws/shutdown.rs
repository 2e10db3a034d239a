//! Cooperative shutdown signal.

use std::sync::Arc;

use tokio::sync::watch;

/// A one-way stop flag shared between the streaming loop and its callers.
///
/// Setting it is synchronous and idempotent, so it can be called from any
/// task or from a signal handler. The loop observes it at its checkpoints
/// and closes the socket, which is what unblocks a pending receive.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request the loop to stop. Later calls are no-ops.
    pub fn request_stop(&self) {
        let was_set = self.tx.send_replace(true);
        if !was_set {
            tracing::info!("Shutdown requested, signalling the websocket to close");
        }
    }

    /// Non-blocking check of the flag.
    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once a stop has been requested.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready};

    #[test]
    fn test_request_stop_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_stop_requested());

        signal.request_stop();
        signal.request_stop();
        assert!(signal.is_stop_requested());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();
        remote.request_stop();
        assert!(signal.is_stop_requested());
    }

    #[test]
    fn test_stopped_wakes_on_request() {
        let signal = ShutdownSignal::new();
        let mut stopped = task::spawn(signal.stopped());
        assert_pending!(stopped.poll());

        signal.request_stop();
        assert!(stopped.is_woken());
        assert_ready!(stopped.poll());
    }

    #[test]
    fn test_stopped_ready_when_already_set() {
        let signal = ShutdownSignal::new();
        signal.request_stop();
        let mut stopped = task::spawn(signal.stopped());
        assert_ready!(stopped.poll());
    }

    #[tokio::test]
    async fn test_stop_from_another_task() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();
        tokio::spawn(async move {
            remote.request_stop();
        });

        tokio::time::timeout(std::time::Duration::from_secs(1), signal.stopped())
            .await
            .unwrap();
    }
}
