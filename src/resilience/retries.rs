//! Retry execution.
//!
//! # Responsibilities
//! - Run an operation until it succeeds, attempts run out, or the caller cancels
//! - Wait a jittered exponential backoff between attempts
//! - Race every wait against the caller's cancellation token
//!
//! # Design Decisions
//! - Attempts are strictly sequential; attempt N+1 starts only after N resolved
//! - The operation receives a child token so it can observe cancellation itself
//! - Exhaustion wraps the last error so callers can tell it from a plain failure

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::resilience::backoff::RetryPolicy;

/// Failure of a retried operation.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed; carries the last operation error.
    Exhausted { attempts: u32, source: E },
    /// The caller's token fired before the operation succeeded.
    Cancelled { attempts: u32, last_error: Option<E> },
}

impl<E> RetryError<E> {
    /// Number of operation invocations that ran.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The most recent operation error, if any attempt ran and failed.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, source } => {
                write!(f, "{}: retries exhausted after {} attempts", source, attempts)
            }
            RetryError::Cancelled { attempts, .. } => {
                write!(f, "operation cancelled after {} attempts", attempts)
            }
        }
    }
}

impl<E> StdError for RetryError<E>
where
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.last_error().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Runs operations under a shared retry policy.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: Arc<RetryPolicy>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation` until success, exhaustion or cancellation.
    pub async fn execute<F, Fut, T, E>(
        &self,
        token: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.policy.max_attempts();
        let mut backoff = self.policy.backoff();
        let mut last_error: Option<E> = None;

        for attempt in 1..=max_attempts {
            if token.is_cancelled() {
                tracing::debug!(attempt, "Retry cancelled before attempt");
                return Err(RetryError::Cancelled {
                    attempts: attempt - 1,
                    last_error,
                });
            }

            let error = match operation(token.child_token()).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt == max_attempts {
                tracing::warn!(attempts = attempt, error = %error, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = backoff.next_delay(&mut rand::thread_rng());
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, backing off"
            );
            last_error = Some(error);

            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(attempt, "Retry cancelled during backoff");
                    return Err(RetryError::Cancelled {
                        attempts: attempt,
                        last_error,
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        unreachable!("max_attempts is validated to be at least 1")
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
