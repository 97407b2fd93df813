//! Shutdown coordination for the gateway.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Two phases: `trigger` stops accepting new connections and lets
/// in-flight requests finish; `force` cancels whatever is still running.
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    /// Cancelled when the listener should stop accepting.
    accept: CancellationToken,
    /// Parent of every per-request token.
    requests: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting new connections.
    pub fn trigger(&self) {
        self.accept.cancel();
    }

    /// Cancel every in-flight request. Implies `trigger`.
    pub fn force(&self) {
        self.accept.cancel();
        self.requests.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.accept.is_cancelled()
    }

    /// Token that per-request tokens are derived from.
    pub fn request_token(&self) -> CancellationToken {
        self.requests.clone()
    }

    /// Completes once `trigger` (or `force`) has been called.
    pub async fn triggered(&self) {
        self.accept.cancelled().await
    }
}
