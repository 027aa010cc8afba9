//! Timeout enforcement.
//!
//! Wraps a future with a deadline and a cancellation token. Whichever of the
//! three (completion, deadline, cancellation) resolves first wins; the losing
//! timer is dropped with the select.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a bounded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// Run `fut` until it completes, `timeout` elapses, or `token` fires.
pub async fn run_with_deadline<F>(
    token: &CancellationToken,
    timeout: Duration,
    fut: F,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Interrupted::Cancelled),
        res = tokio::time::timeout(timeout, fut) => res.map_err(|_| Interrupted::TimedOut(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline() {
        let token = CancellationToken::new();
        let out = run_with_deadline(&token, Duration::from_secs(1), async { 7 }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let token = CancellationToken::new();
        let out = run_with_deadline(
            &token,
            Duration::from_millis(50),
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await;
        assert_eq!(out, Err(Interrupted::TimedOut(Duration::from_millis(50))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let out = run_with_deadline(
            &token,
            Duration::from_secs(5),
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await;
        assert_eq!(out, Err(Interrupted::Cancelled));
    }
}
