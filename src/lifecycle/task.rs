//! Scoped background tasks.
//!
//! A `BackgroundTask` owns a spawned loop and the token that stops it. The
//! loop is handed a child token and must return once it fires. Stopping is
//! idempotent: only the first `stop` cancels and joins, later calls return
//! `false` immediately. Dropping a task cancels it without joining.

use std::future::Future;
use std::sync::Mutex;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A spawned loop that is stopped exactly once.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    /// Spawn `f` on the current runtime.
    pub fn spawn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(f(token.child_token()));
        tracing::debug!(task = name, "Background task started");

        Self {
            name,
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True until the first `stop` call.
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// Returns `true` if this call performed the stop.
    pub async fn stop(&self) -> bool {
        let handle = match self.handle.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(handle) = handle else {
            return false;
        };

        self.token.cancel();
        if let Err(e) = handle.await {
            if e.is_panic() {
                tracing::error!(task = self.name, "Background task panicked");
            }
        }
        tracing::debug!(task = self.name, "Background task stopped");
        true
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
