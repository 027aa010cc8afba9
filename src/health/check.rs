//! Health check capability and built-in checks.
//!
//! # Variants
//! - `HttpCheck`: GET a URL, Up iff the status is 2xx
//! - `FnCheck`: any async closure

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::resilience::timeouts::{run_with_deadline, Interrupted};

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Up,
    Down,
}

/// Why a check reported Down.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("check timed out after {0:?}")]
    Timeout(Duration),

    #[error("check cancelled")]
    Cancelled,

    #[error("check panicked")]
    Panicked,

    #[error("{0}")]
    Failed(String),
}

impl From<Interrupted> for CheckError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::TimedOut(after) => CheckError::Timeout(after),
            Interrupted::Cancelled => CheckError::Cancelled,
        }
    }
}

/// A named, independently executable probe.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Run the probe. `Err` always means Down.
    async fn execute(&self, token: &CancellationToken) -> Result<CheckStatus, CheckError>;
}

/// HTTP reachability probe.
#[derive(Debug, Clone)]
pub struct HttpCheck {
    name: String,
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpCheck {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CheckError::Request(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            url: url.into(),
            timeout,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthCheck for HttpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, token: &CancellationToken) -> Result<CheckStatus, CheckError> {
        let request = self.client.get(&self.url).send();
        let response = run_with_deadline(token, self.timeout, request)
            .await?
            .map_err(|e| {
                if e.is_timeout() {
                    CheckError::Timeout(self.timeout)
                } else {
                    CheckError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(CheckStatus::Up)
        } else {
            Err(CheckError::UnexpectedStatus(status.as_u16()))
        }
    }
}

type CheckFn =
    Box<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<CheckStatus, CheckError>> + Send + Sync>;

/// Probe backed by a user-supplied async function.
pub struct FnCheck {
    name: String,
    f: CheckFn,
}

impl FnCheck {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CheckStatus, CheckError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |token| Box::pin(f(token))),
        }
    }
}

#[async_trait]
impl HealthCheck for FnCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, token: &CancellationToken) -> Result<CheckStatus, CheckError> {
        (self.f)(token.clone()).await
    }
}

impl std::fmt::Debug for FnCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCheck").field("name", &self.name).finish()
    }
}
